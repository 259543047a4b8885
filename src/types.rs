use regex::Regex;
use std::fmt;

pub const PROVIDED_AUTOMATICALLY: &str = "ProvidedAutomatically";

/// Socket compatibility tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// No restriction; any output may connect.
    Any,
    One(String),
    AnyOf(Vec<String>),
}

impl Check {
    pub fn one(label: &str) -> Self {
        Check::One(label.to_string())
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Check::One(label) if label == "Number")
    }

    fn labels(&self) -> &[String] {
        match self {
            Check::Any => &[],
            Check::One(label) => std::slice::from_ref(label),
            Check::AnyOf(labels) => labels,
        }
    }

    /// Whether an output tagged `output` may connect to a socket tagged `self`.
    pub fn accepts(&self, output: &Check) -> bool {
        if matches!(self, Check::Any) || matches!(output, Check::Any) {
            return true;
        }
        let accepted = self.labels();
        output.labels().iter().any(|label| accepted.contains(label))
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Any => write!(f, "any"),
            Check::One(label) => write!(f, "{}", label),
            Check::AnyOf(labels) => write!(f, "{}", labels.join("|")),
        }
    }
}

/// Whether a class type is being resolved for a parameter socket or a return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub check: Check,
    /// Type name used by the compiled target when declaring or coercing.
    pub label: String,
}

pub fn resolve(class_type: &str, position: Position) -> ResolvedType {
    let check = class_type_to_check(class_type, position);
    let label = class_type_to_java_type(class_type, &check, position);
    ResolvedType { check, label }
}

pub fn class_type_to_check(class_type: &str, position: Position) -> Check {
    if class_type.starts_with('[') {
        return Check::one(class_type);
    }
    match class_type {
        "java.lang.Object" => return Check::Any,
        "com.qualcomm.robotcore.eventloop.opmode.LinearOpMode"
        | "com.qualcomm.robotcore.eventloop.opmode.OpMode"
        | "com.qualcomm.robotcore.hardware.HardwareMap"
        | "org.firstinspires.ftc.robotcore.external.Telemetry" => {
            return Check::one(PROVIDED_AUTOMATICALLY)
        }
        "boolean" | "java.lang.Boolean" => return Check::one("Boolean"),
        "char" | "java.lang.Character" | "java.lang.String" => return Check::one("String"),
        "byte" | "java.lang.Byte" | "short" | "java.lang.Short" | "int" | "java.lang.Integer"
        | "long" | "java.lang.Long" | "float" | "java.lang.Float" | "double"
        | "java.lang.Double" | "java.lang.Number" => return Check::one("Number"),
        _ => {}
    }

    let simple = class_type_to_label(class_type, true);
    if known_type_to_class_name(&simple).is_some() {
        if simple == "MatrixF" && position == Position::Input {
            return Check::AnyOf(vec!["MatrixF".to_string(), "OpenGLMatrix".to_string()]);
        }
        return Check::One(simple);
    }
    Check::one(class_type)
}

pub fn class_type_to_java_type(class_type: &str, check: &Check, position: Position) -> String {
    if check.is_number() && JavaNumeric::from_label(class_type).is_some() {
        return class_type.to_string();
    }
    if position == Position::Input {
        if let Check::AnyOf(labels) = check {
            if labels.len() == 2
                && labels.iter().any(|l| l == "MatrixF")
                && labels.iter().any(|l| l == "OpenGLMatrix")
            {
                return "MatrixF".to_string();
            }
        }
    }
    class_type_to_label(class_type, true)
}

/// Display label for a class type. Inner classes use `.` instead of `$`.
pub fn class_type_to_label(class_type: &str, remove_package: bool) -> String {
    if class_type.starts_with('[') {
        return array_type_to_label(class_type, remove_package);
    }
    let label = if remove_package {
        class_type.rsplit('.').next().unwrap_or(class_type)
    } else {
        class_type
    };
    label.replace('$', ".")
}

/// `[I` -> `int[]`, `[[J` -> `long[][]`, `[Ljava.lang.Object;` -> `Object[]`.
pub fn array_type_to_label(array_type: &str, remove_package: bool) -> String {
    let rest = &array_type[1..];
    let element = match rest.chars().next() {
        Some('[') => array_type_to_label(rest, remove_package),
        Some('L') => {
            let name = rest[1..].strip_suffix(';').unwrap_or(&rest[1..]);
            class_type_to_label(name, remove_package)
        }
        Some(code) => primitive_descriptor(code).unwrap_or("Object").to_string(),
        None => "Object".to_string(),
    };
    format!("{}[]", element)
}

fn primitive_descriptor(code: char) -> Option<&'static str> {
    Some(match code {
        'Z' => "boolean",
        'B' => "byte",
        'C' => "char",
        'D' => "double",
        'F' => "float",
        'I' => "int",
        'J' => "long",
        'S' => "short",
        _ => return None,
    })
}

/// The fully qualified class that must be imported to use `class_type`, if any.
pub fn import_target(class_type: &str) -> Option<String> {
    if !class_type.contains('.') {
        return None;
    }
    if class_type.starts_with('[') {
        let array_re = Regex::new(r"^\[+L(?P<class>[^;]+);$").ok()?;
        let caps = array_re.captures(class_type)?;
        return import_target(&caps["class"]);
    }
    let outer = match class_type.find('$') {
        Some(idx) => &class_type[..idx],
        None => class_type,
    };
    Some(outer.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JavaNumeric {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl JavaNumeric {
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "byte" => JavaNumeric::Byte,
            "short" => JavaNumeric::Short,
            "int" => JavaNumeric::Int,
            "long" => JavaNumeric::Long,
            "float" => JavaNumeric::Float,
            "double" => JavaNumeric::Double,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JavaNumeric::Byte => "byte",
            JavaNumeric::Short => "short",
            JavaNumeric::Int => "int",
            JavaNumeric::Long => "long",
            JavaNumeric::Float => "float",
            JavaNumeric::Double => "double",
        }
    }

    pub fn is_integral(self) -> bool {
        self <= JavaNumeric::Long
    }
}

/// Fully qualified class name for the simple type names used by the block families.
pub fn known_type_to_class_name(simple: &str) -> Option<String> {
    let package = match simple {
        "Color" => "android.graphics",
        "SoundPlayer" => "com.qualcomm.ftccommon",
        "BNO055IMU"
        | "BNO055IMU.AccelerationIntegrator"
        | "BNO055IMU.AccelUnit"
        | "BNO055IMU.Parameters"
        | "BNO055IMU.SensorMode"
        | "BNO055IMU.SystemStatus"
        | "JustLoggingAccelerationIntegrator" => "com.qualcomm.hardware.bosch",
        "ModernRoboticsI2cCompassSensor"
        | "ModernRoboticsI2cGyro"
        | "ModernRoboticsI2cGyro.HeadingMode"
        | "ModernRoboticsI2cRangeSensor" => "com.qualcomm.hardware.modernrobotics",
        "RevBlinkinLedDriver" | "RevBlinkinLedDriver.BlinkinPattern" => "com.qualcomm.hardware.rev",
        "Autonomous" | "Disabled" | "LinearOpMode" | "TeleOp" => {
            "com.qualcomm.robotcore.eventloop.opmode"
        }
        "AccelerationSensor" | "AnalogInput" | "AnalogOutput" | "CRServo" | "ColorSensor"
        | "CompassSensor" | "CompassSensor.CompassMode" | "DcMotor" | "DcMotor.RunMode"
        | "DcMotor.ZeroPowerBehavior" | "DcMotorEx" | "DcMotorSimple"
        | "DcMotorSimple.Direction" | "DigitalChannel" | "DigitalChannel.Mode"
        | "DistanceSensor" | "GyroSensor" | "Gyroscope" | "I2cAddr" | "I2cAddrConfig"
        | "I2cAddressableDevice" | "IrSeekerSensor" | "IrSeekerSensor.Mode" | "LED" | "Light"
        | "LightSensor" | "MotorControlAlgorithm" | "NormalizedColorSensor" | "NormalizedRGBA"
        | "OpticalDistanceSensor" | "OrientationSensor" | "PIDCoefficients"
        | "PIDFCoefficients" | "PWMOutput" | "Servo" | "Servo.Direction" | "ServoController"
        | "ServoController.PwmStatus" | "SwitchableLight" | "TouchSensor"
        | "UltrasonicSensor" | "VoltageSensor" => "com.qualcomm.robotcore.hardware",
        "ElapsedTime" | "ElapsedTime.Resolution" | "Range" | "ReadWriteFile" | "RobotLog" => {
            "com.qualcomm.robotcore.util"
        }
        "ArrayList" | "Collections" | "List" => "java.util",
        "ClassFactory" | "JavaUtil" | "Telemetry" => "org.firstinspires.ftc.robotcore.external",
        "AndroidAccelerometer" | "AndroidGyroscope" | "AndroidOrientation"
        | "AndroidSoundPool" | "AndroidTextToSpeech" => {
            "org.firstinspires.ftc.robotcore.external.android"
        }
        "CameraName" | "WebcamName" => "org.firstinspires.ftc.robotcore.external.hardware.camera",
        "MatrixF" | "OpenGLMatrix" | "VectorF" => {
            "org.firstinspires.ftc.robotcore.external.matrices"
        }
        "Acceleration" | "AngleUnit" | "AngularVelocity" | "AxesOrder" | "AxesReference"
        | "Axis" | "CurrentUnit" | "DistanceUnit" | "MagneticFlux" | "Orientation"
        | "Position" | "Quaternion" | "Temperature" | "TempUnit" | "UnnormalizedAngleUnit"
        | "Velocity" | "VuforiaBase" | "VuforiaCurrentGame" | "VuforiaLocalizer"
        | "VuforiaLocalizer.CameraDirection" | "VuforiaLocalizer.Parameters"
        | "VuforiaTrackable" | "VuforiaTrackableDefaultListener" | "VuforiaTrackables" => {
            "org.firstinspires.ftc.robotcore.external.navigation"
        }
        "AppUtil" => "org.firstinspires.ftc.robotcore.internal.system",
        "Recognition" | "TfodBase" | "TfodCurrentGame" => {
            "org.firstinspires.ftc.robotcore.external.tfod"
        }
        _ => return None,
    };
    Some(format!("{}.{}", package, simple))
}
