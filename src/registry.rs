use crate::ast::Block;
use crate::hardware::HardwareKind;
use crate::types::Check;
use anyhow::{anyhow, Result};

/// Whether a getter block declares a typed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typing {
    Untyped,
    Boolean,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscBlock {
    Null,
    IsNull,
    IsNotNull,
    Atan2,
    FormatNumber,
    RoundDecimal,
    AddItemToList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryBlock {
    AddNumericData { typed: bool },
    AddTextData { all: bool },
    Update,
    Speak,
    SpeakWithLanguage,
    SetDisplayFormat,
    TypedEnumDisplayFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpModeCall {
    WaitForStart,
    Idle,
    Sleep { typed: bool },
    OpModeInInit,
    OpModeIsActive,
    IsStarted,
    IsStopRequested,
    GetRuntime { typed: bool },
    ResetRuntime,
    RequestOpModeStop,
    TerminateOpModeNow,
}

impl OpModeCall {
    pub fn method_name(self) -> &'static str {
        match self {
            OpModeCall::WaitForStart => "waitForStart",
            OpModeCall::Idle => "idle",
            OpModeCall::Sleep { .. } => "sleep",
            OpModeCall::OpModeInInit => "opModeInInit",
            OpModeCall::OpModeIsActive => "opModeIsActive",
            OpModeCall::IsStarted => "isStarted",
            OpModeCall::IsStopRequested => "isStopRequested",
            OpModeCall::GetRuntime { .. } => "getRuntime",
            OpModeCall::ResetRuntime => "resetRuntime",
            OpModeCall::RequestOpModeStop => "requestOpModeStop",
            OpModeCall::TerminateOpModeNow => "terminateOpModeNow",
        }
    }
}

/// Every block type the generators understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    MathNumber,
    MathArithmetic,
    MathSingle,
    LogicBoolean,
    LogicCompare,
    LogicOperation,
    LogicNegate,
    LogicNull,
    LogicTernary,
    Text,
    TextJoin,
    ListsCreateWith,
    ListsLength,
    ListsIsEmpty,
    VariablesGet,
    VariablesSet,
    ControlsIf,
    ControlsWhileUntil,
    ControlsRepeatExt,
    ControlsFlowStatements,
    ProcedureDef { returns: bool },
    ProcedureCall { returns: bool },
    Comment,
    Misc(MiscBlock),
    CallJava { returns: bool },
    CallHardware { returns: bool },
    Telemetry(TelemetryBlock),
    LinearOpMode(OpModeCall),
    ColorGetProperty { typed: bool },
    GamepadGetProperty(Typing),
    DeviceSetProperty(HardwareKind),
    DeviceGetProperty(HardwareKind),
}

impl BlockKind {
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        use BlockKind::*;
        Some(match type_name {
            "math_number" => MathNumber,
            "math_arithmetic" => MathArithmetic,
            "math_single" => MathSingle,
            "logic_boolean" => LogicBoolean,
            "logic_compare" => LogicCompare,
            "logic_operation" => LogicOperation,
            "logic_negate" => LogicNegate,
            "logic_null" => LogicNull,
            "logic_ternary" => LogicTernary,
            "text" => Text,
            "text_join" => TextJoin,
            "lists_create_with" => ListsCreateWith,
            "lists_length" => ListsLength,
            "lists_isEmpty" => ListsIsEmpty,
            "variables_get" => VariablesGet,
            "variables_set" => VariablesSet,
            "controls_if" => ControlsIf,
            "controls_whileUntil" => ControlsWhileUntil,
            "controls_repeat_ext" => ControlsRepeatExt,
            "controls_flow_statements" => ControlsFlowStatements,
            "procedures_defnoreturn" => ProcedureDef { returns: false },
            "procedures_defreturn" => ProcedureDef { returns: true },
            "procedures_callnoreturn" => ProcedureCall { returns: false },
            "procedures_callreturn" => ProcedureCall { returns: true },
            "comment" => Comment,
            "misc_null" => Misc(MiscBlock::Null),
            "misc_isNull" => Misc(MiscBlock::IsNull),
            "misc_isNotNull" => Misc(MiscBlock::IsNotNull),
            "misc_atan2" => Misc(MiscBlock::Atan2),
            "misc_formatNumber" => Misc(MiscBlock::FormatNumber),
            "misc_roundDecimal" => Misc(MiscBlock::RoundDecimal),
            "misc_addItemToList" => Misc(MiscBlock::AddItemToList),
            "misc_callJava_return" => CallJava { returns: true },
            "misc_callJava_noReturn" => CallJava { returns: false },
            "misc_callHardware_return" => CallHardware { returns: true },
            "misc_callHardware_noReturn" => CallHardware { returns: false },
            "telemetry_addNumericData" => Telemetry(TelemetryBlock::AddNumericData { typed: false }),
            "telemetry_addNumericData_Number" => {
                Telemetry(TelemetryBlock::AddNumericData { typed: true })
            }
            "telemetry_addTextData" => Telemetry(TelemetryBlock::AddTextData { all: false }),
            "telemetry_addTextData_All" => Telemetry(TelemetryBlock::AddTextData { all: true }),
            "telemetry_update" => Telemetry(TelemetryBlock::Update),
            "telemetry_speak" => Telemetry(TelemetryBlock::Speak),
            "telemetry_speak_withLanguage" => Telemetry(TelemetryBlock::SpeakWithLanguage),
            "telemetry_setDisplayFormat" => Telemetry(TelemetryBlock::SetDisplayFormat),
            "telemetry_typedEnum_displayFormat" => {
                Telemetry(TelemetryBlock::TypedEnumDisplayFormat)
            }
            "linearOpMode_waitForStart" => LinearOpMode(OpModeCall::WaitForStart),
            "linearOpMode_idle" => LinearOpMode(OpModeCall::Idle),
            "linearOpMode_sleep" => LinearOpMode(OpModeCall::Sleep { typed: false }),
            "linearOpMode_sleep_Number" => LinearOpMode(OpModeCall::Sleep { typed: true }),
            "linearOpMode_opModeInInit" => LinearOpMode(OpModeCall::OpModeInInit),
            "linearOpMode_opModeIsActive" => LinearOpMode(OpModeCall::OpModeIsActive),
            "linearOpMode_isStarted" => LinearOpMode(OpModeCall::IsStarted),
            "linearOpMode_isStopRequested" => LinearOpMode(OpModeCall::IsStopRequested),
            "linearOpMode_getRuntime" => LinearOpMode(OpModeCall::GetRuntime { typed: false }),
            "linearOpMode_getRuntime_Number" => {
                LinearOpMode(OpModeCall::GetRuntime { typed: true })
            }
            "linearOpMode_resetRuntime" => LinearOpMode(OpModeCall::ResetRuntime),
            "linearOpMode_requestOpModeStop" => LinearOpMode(OpModeCall::RequestOpModeStop),
            "linearOpMode_terminateOpModeNow" => LinearOpMode(OpModeCall::TerminateOpModeNow),
            "color_getProperty" => ColorGetProperty { typed: false },
            "color_getProperty_Number" => ColorGetProperty { typed: true },
            "gamepad_getProperty" => GamepadGetProperty(Typing::Untyped),
            "gamepad_getProperty_Boolean" => GamepadGetProperty(Typing::Boolean),
            "gamepad_getProperty_Number" => GamepadGetProperty(Typing::Number),
            "dcMotor_setProperty_Number" => DeviceSetProperty(HardwareKind::DcMotor),
            "dcMotor_getProperty_Number" => DeviceGetProperty(HardwareKind::DcMotor),
            "servo_setProperty_Number" => DeviceSetProperty(HardwareKind::Servo),
            "servo_getProperty_Number" => DeviceGetProperty(HardwareKind::Servo),
            "touchSensor_getProperty_Boolean" => DeviceGetProperty(HardwareKind::TouchSensor),
            _ => return None,
        })
    }

    /// Block types whose shape is rebuilt from a `<mutation>` element.
    pub fn takes_mutation(self) -> bool {
        matches!(
            self,
            BlockKind::CallJava { .. }
                | BlockKind::CallHardware { .. }
                | BlockKind::ControlsIf
                | BlockKind::TextJoin
                | BlockKind::ListsCreateWith
                | BlockKind::ProcedureDef { .. }
                | BlockKind::ProcedureCall { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socket {
    pub name: String,
    pub check: Check,
    /// Compiled-target parameter type, when the block declares one.
    pub java_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Statement,
    Value { check: Check, java_type: Option<String> },
}

/// Per-instance shape: the static descriptor, possibly rebuilt by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub sockets: Vec<Socket>,
    pub statements: Vec<String>,
    pub output: Output,
}

impl Shape {
    fn statement(sockets: Vec<Socket>) -> Self {
        Self {
            sockets,
            statements: Vec::new(),
            output: Output::Statement,
        }
    }

    fn value(sockets: Vec<Socket>, check: Check, java_type: Option<&str>) -> Self {
        Self {
            sockets,
            statements: Vec::new(),
            output: Output::Value {
                check,
                java_type: java_type.map(str::to_string),
            },
        }
    }

    fn with_statements(mut self, slots: &[&str]) -> Self {
        self.statements = slots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn socket(&self, name: &str) -> Option<&Socket> {
        self.sockets.iter().find(|s| s.name == name)
    }

    pub fn push_socket(&mut self, name: String, check: Check, java_type: Option<String>) {
        self.sockets.push(Socket {
            name,
            check,
            java_type,
        });
    }

    pub fn is_statement(&self) -> bool {
        matches!(self.output, Output::Statement)
    }

    pub fn output_check(&self) -> Option<&Check> {
        match &self.output {
            Output::Statement => None,
            Output::Value { check, .. } => Some(check),
        }
    }
}

fn socket(name: &str, check: Check) -> Socket {
    Socket {
        name: name.to_string(),
        check,
        java_type: None,
    }
}

fn typed(name: &str, check: Check, java_type: &str) -> Socket {
    Socket {
        name: name.to_string(),
        check,
        java_type: Some(java_type.to_string()),
    }
}

fn number() -> Check {
    Check::one("Number")
}

fn boolean() -> Check {
    Check::one("Boolean")
}

fn string() -> Check {
    Check::one("String")
}

fn array() -> Check {
    Check::one("Array")
}

const DISPLAY_FORMAT: &str = "Telemetry.DisplayFormat";

pub fn shape_for(kind: BlockKind) -> Shape {
    use BlockKind::*;
    match kind {
        MathNumber => Shape::value(vec![], number(), None),
        MathArithmetic => Shape::value(
            vec![socket("A", number()), socket("B", number())],
            number(),
            None,
        ),
        MathSingle => Shape::value(vec![socket("NUM", number())], number(), None),
        LogicBoolean => Shape::value(vec![], boolean(), Some("boolean")),
        LogicCompare => Shape::value(
            vec![socket("A", Check::Any), socket("B", Check::Any)],
            boolean(),
            Some("boolean"),
        ),
        LogicOperation => Shape::value(
            vec![socket("A", boolean()), socket("B", boolean())],
            boolean(),
            Some("boolean"),
        ),
        LogicNegate => Shape::value(vec![socket("BOOL", boolean())], boolean(), Some("boolean")),
        LogicNull => Shape::value(vec![], Check::Any, None),
        LogicTernary => Shape::value(
            vec![
                socket("IF", boolean()),
                socket("THEN", Check::Any),
                socket("ELSE", Check::Any),
            ],
            Check::Any,
            None,
        ),
        Text => Shape::value(vec![], string(), Some("String")),
        TextJoin => Shape::value(vec![], string(), Some("String")),
        ListsCreateWith => Shape::value(vec![], array(), Some("List")),
        ListsLength => Shape::value(vec![socket("VALUE", array())], number(), Some("int")),
        ListsIsEmpty => Shape::value(vec![socket("VALUE", array())], boolean(), Some("boolean")),
        VariablesGet => Shape::value(vec![], Check::Any, None),
        VariablesSet => Shape::statement(vec![socket("VALUE", Check::Any)]),
        ControlsIf => Shape::statement(vec![socket("IF0", boolean())]).with_statements(&["DO0"]),
        ControlsWhileUntil => {
            Shape::statement(vec![socket("BOOL", boolean())]).with_statements(&["DO"])
        }
        ControlsRepeatExt => {
            Shape::statement(vec![socket("TIMES", number())]).with_statements(&["DO"])
        }
        ControlsFlowStatements => Shape::statement(vec![]),
        ProcedureDef { returns } => {
            let sockets = if returns {
                vec![socket("RETURN", Check::Any)]
            } else {
                vec![]
            };
            Shape::statement(sockets).with_statements(&["STACK"])
        }
        ProcedureCall { returns } | CallJava { returns } | CallHardware { returns } => {
            if returns {
                Shape::value(vec![], Check::Any, None)
            } else {
                Shape::statement(vec![])
            }
        }
        Comment => Shape::statement(vec![]),
        Misc(misc) => misc_shape(misc),
        Telemetry(block) => telemetry_shape(block),
        LinearOpMode(call) => op_mode_shape(call),
        ColorGetProperty { typed: false } => {
            Shape::value(vec![socket("COLOR", Check::Any)], Check::Any, None)
        }
        ColorGetProperty { typed: true } => {
            Shape::value(vec![typed("COLOR", number(), "int")], number(), None)
        }
        GamepadGetProperty(Typing::Untyped) => Shape::value(vec![], Check::Any, None),
        GamepadGetProperty(Typing::Boolean) => Shape::value(vec![], boolean(), Some("boolean")),
        GamepadGetProperty(Typing::Number) => Shape::value(vec![], number(), Some("float")),
        DeviceSetProperty(_) => Shape::statement(vec![socket("VALUE", number())]),
        DeviceGetProperty(HardwareKind::TouchSensor) => {
            Shape::value(vec![], boolean(), Some("boolean"))
        }
        DeviceGetProperty(_) => Shape::value(vec![], number(), None),
    }
}

fn misc_shape(block: MiscBlock) -> Shape {
    match block {
        MiscBlock::Null => Shape::value(vec![], Check::Any, None),
        MiscBlock::IsNull | MiscBlock::IsNotNull => {
            Shape::value(vec![socket("VALUE", Check::Any)], boolean(), Some("boolean"))
        }
        MiscBlock::Atan2 => Shape::value(
            vec![typed("Y", number(), "double"), typed("X", number(), "double")],
            number(),
            Some("double"),
        ),
        MiscBlock::FormatNumber => Shape::value(
            vec![
                typed("NUMBER", number(), "double"),
                typed("PRECISION", number(), "int"),
            ],
            string(),
            Some("String"),
        ),
        MiscBlock::RoundDecimal => Shape::value(
            vec![
                typed("NUMBER", number(), "double"),
                typed("PRECISION", number(), "int"),
            ],
            number(),
            Some("double"),
        ),
        MiscBlock::AddItemToList => {
            Shape::statement(vec![socket("ITEM", Check::Any), socket("LIST", array())])
        }
    }
}

fn telemetry_shape(block: TelemetryBlock) -> Shape {
    match block {
        TelemetryBlock::AddNumericData { typed: false } => {
            Shape::statement(vec![socket("KEY", Check::Any), socket("NUMBER", Check::Any)])
        }
        TelemetryBlock::AddNumericData { typed: true } => Shape::statement(vec![
            socket("KEY", string()),
            typed("NUMBER", number(), "double"),
        ]),
        TelemetryBlock::AddTextData { all } => {
            let key = if all { string() } else { Check::Any };
            Shape::statement(vec![socket("KEY", key), socket("TEXT", Check::Any)])
        }
        TelemetryBlock::Update => Shape::statement(vec![]),
        TelemetryBlock::Speak => Shape::statement(vec![socket("TEXT", Check::Any)]),
        TelemetryBlock::SpeakWithLanguage => Shape::statement(vec![
            socket("TEXT", Check::Any),
            socket("LANGUAGE_CODE", string()),
            socket("COUNTRY_CODE", string()),
        ]),
        TelemetryBlock::SetDisplayFormat => {
            Shape::statement(vec![socket("DISPLAY_FORMAT", Check::one(DISPLAY_FORMAT))])
        }
        TelemetryBlock::TypedEnumDisplayFormat => {
            Shape::value(vec![], Check::one(DISPLAY_FORMAT), Some(DISPLAY_FORMAT))
        }
    }
}

fn op_mode_shape(call: OpModeCall) -> Shape {
    match call {
        OpModeCall::Sleep { typed: false } => {
            Shape::statement(vec![socket("MILLISECONDS", Check::Any)])
        }
        OpModeCall::Sleep { typed: true } => {
            Shape::statement(vec![typed("MILLISECONDS", number(), "long")])
        }
        OpModeCall::OpModeInInit
        | OpModeCall::OpModeIsActive
        | OpModeCall::IsStarted
        | OpModeCall::IsStopRequested => Shape::value(vec![], boolean(), Some("boolean")),
        OpModeCall::GetRuntime { typed: false } => Shape::value(vec![], Check::Any, Some("double")),
        OpModeCall::GetRuntime { typed: true } => Shape::value(vec![], number(), Some("double")),
        OpModeCall::WaitForStart
        | OpModeCall::Idle
        | OpModeCall::ResetRuntime
        | OpModeCall::RequestOpModeStop
        | OpModeCall::TerminateOpModeNow => Shape::statement(vec![]),
    }
}

/// Error for a dropdown value the generators do not know.
pub fn unexpected(block: &Block, field: &str, value: &str) -> anyhow::Error {
    anyhow!(
        "Unexpected {} '{}' on block '{}' ({}).",
        field.to_ascii_lowercase(),
        value,
        block.id,
        block.type_name
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorProperty {
    Red,
    Green,
    Blue,
    Alpha,
    Hue,
    Saturation,
    Value,
}

impl ColorProperty {
    pub fn of(block: &Block) -> Result<Self> {
        let prop = block.required_field("PROP")?;
        Ok(match prop {
            "Red" => ColorProperty::Red,
            "Green" => ColorProperty::Green,
            "Blue" => ColorProperty::Blue,
            "Alpha" => ColorProperty::Alpha,
            "Hue" => ColorProperty::Hue,
            "Saturation" => ColorProperty::Saturation,
            "Value" => ColorProperty::Value,
            other => return Err(unexpected(block, "PROP", other)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorProperty::Red => "Red",
            ColorProperty::Green => "Green",
            ColorProperty::Blue => "Blue",
            ColorProperty::Alpha => "Alpha",
            ColorProperty::Hue => "Hue",
            ColorProperty::Saturation => "Saturation",
            ColorProperty::Value => "Value",
        }
    }

    /// Channel components come from `android.graphics.Color`, HSV from `JavaUtil`.
    pub fn is_channel(self) -> bool {
        matches!(
            self,
            ColorProperty::Red | ColorProperty::Green | ColorProperty::Blue | ColorProperty::Alpha
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadProperty {
    pub name: &'static str,
    pub member: &'static str,
    pub analog: bool,
}

const fn button(name: &'static str, member: &'static str) -> GamepadProperty {
    GamepadProperty {
        name,
        member,
        analog: false,
    }
}

const fn axis(name: &'static str, member: &'static str) -> GamepadProperty {
    GamepadProperty {
        name,
        member,
        analog: true,
    }
}

const GAMEPAD_PROPERTIES: &[GamepadProperty] = &[
    button("A", "a"),
    button("AtRest", "atRest()"),
    button("B", "b"),
    button("Back", "back"),
    button("Circle", "circle"),
    button("Cross", "cross"),
    button("DpadDown", "dpad_down"),
    button("DpadLeft", "dpad_left"),
    button("DpadRight", "dpad_right"),
    button("DpadUp", "dpad_up"),
    button("Guide", "guide"),
    button("LeftBumper", "left_bumper"),
    button("LeftStickButton", "left_stick_button"),
    axis("LeftStickX", "left_stick_x"),
    axis("LeftStickY", "left_stick_y"),
    axis("LeftTrigger", "left_trigger"),
    button("Options", "options"),
    button("PS", "ps"),
    button("RightBumper", "right_bumper"),
    button("RightStickButton", "right_stick_button"),
    axis("RightStickX", "right_stick_x"),
    axis("RightStickY", "right_stick_y"),
    axis("RightTrigger", "right_trigger"),
    button("Share", "share"),
    button("Square", "square"),
    button("Start", "start"),
    button("Touchpad", "touchpad"),
    button("Triangle", "triangle"),
    button("X", "x"),
    button("Y", "y"),
];

impl GamepadProperty {
    pub fn of(block: &Block, typing: Typing) -> Result<Self> {
        let prop = block.required_field("PROP")?;
        let property = GAMEPAD_PROPERTIES
            .iter()
            .find(|p| p.name == prop)
            .copied()
            .ok_or_else(|| unexpected(block, "PROP", prop))?;
        match typing {
            Typing::Boolean if property.analog => Err(unexpected(block, "PROP", prop)),
            Typing::Number if !property.analog => Err(unexpected(block, "PROP", prop)),
            _ => Ok(property),
        }
    }

    pub fn java_type(self) -> &'static str {
        if self.analog {
            "float"
        } else {
            "boolean"
        }
    }
}

pub fn gamepad_identifier(block: &Block) -> Result<&str> {
    match block.required_field("IDENTIFIER")? {
        id @ ("gamepad1" | "gamepad2") => Ok(id),
        other => Err(unexpected(block, "IDENTIFIER", other)),
    }
}

pub fn display_format(block: &Block) -> Result<&str> {
    match block.required_field("DISPLAY_FORMAT")? {
        format @ ("CLASSIC" | "HTML" | "MONOSPACE") => Ok(format),
        other => Err(unexpected(block, "DISPLAY_FORMAT", other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProperty {
    pub name: &'static str,
    pub java_type: &'static str,
    pub setter: Option<&'static str>,
    pub getter: &'static str,
}

const fn read_write(
    name: &'static str,
    java_type: &'static str,
    setter: &'static str,
    getter: &'static str,
) -> DeviceProperty {
    DeviceProperty {
        name,
        java_type,
        setter: Some(setter),
        getter,
    }
}

const fn read_only(name: &'static str, java_type: &'static str, getter: &'static str) -> DeviceProperty {
    DeviceProperty {
        name,
        java_type,
        setter: None,
        getter,
    }
}

const DC_MOTOR_PROPERTIES: &[DeviceProperty] = &[
    read_write("Power", "double", "setPower", "getPower"),
    read_write("TargetPosition", "int", "setTargetPosition", "getTargetPosition"),
    read_write("Velocity", "double", "setVelocity", "getVelocity"),
    read_write(
        "TargetPositionTolerance",
        "int",
        "setTargetPositionTolerance",
        "getTargetPositionTolerance",
    ),
    read_only("CurrentPosition", "int", "getCurrentPosition"),
];

const SERVO_PROPERTIES: &[DeviceProperty] =
    &[read_write("Position", "double", "setPosition", "getPosition")];

const TOUCH_SENSOR_PROPERTIES: &[DeviceProperty] = &[read_only("IsPressed", "boolean", "isPressed")];

impl DeviceProperty {
    pub fn of(block: &Block, kind: HardwareKind, setting: bool) -> Result<Self> {
        let table = match kind {
            HardwareKind::DcMotor => DC_MOTOR_PROPERTIES,
            HardwareKind::Servo => SERVO_PROPERTIES,
            HardwareKind::TouchSensor => TOUCH_SENSOR_PROPERTIES,
        };
        let prop = block.required_field("PROP")?;
        table
            .iter()
            .find(|p| p.name == prop && (!setting || p.setter.is_some()))
            .copied()
            .ok_or_else(|| unexpected(block, "PROP", prop))
    }
}

/// Compiled-target type of a socket. Some blocks decide it from a dropdown value.
pub fn java_input_type(block: &Block, socket_name: &str) -> Result<Option<String>> {
    if let BlockKind::DeviceSetProperty(kind) = block.kind {
        if socket_name == "VALUE" {
            let property = DeviceProperty::of(block, kind, true)?;
            return Ok(Some(property.java_type.to_string()));
        }
    }
    Ok(block
        .shape
        .socket(socket_name)
        .and_then(|s| s.java_type.clone()))
}

/// Compiled-target type of a block's value, when the block declares one.
pub fn output_java_type(block: &Block) -> Result<Option<String>> {
    let dynamic = match block.kind {
        BlockKind::ColorGetProperty { .. } => {
            if ColorProperty::of(block)?.is_channel() {
                "int"
            } else {
                "float"
            }
        }
        BlockKind::GamepadGetProperty(typing) => GamepadProperty::of(block, typing)?.java_type(),
        BlockKind::DeviceGetProperty(kind) => DeviceProperty::of(block, kind, false)?.java_type,
        _ => {
            return Ok(match &block.shape.output {
                Output::Value { java_type, .. } => java_type.clone(),
                Output::Statement => None,
            })
        }
    };
    Ok(Some(dynamic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockId;

    fn block_of(type_name: &str, fields: &[(&str, &str)]) -> Block {
        let kind = BlockKind::from_type_name(type_name).unwrap();
        let mut block = Block::new(BlockId::new("b1"), type_name, kind);
        for (name, value) in fields {
            block.fields.insert(name.to_string(), value.to_string());
        }
        block
    }

    #[test]
    fn unknown_type_names_are_not_registered() {
        assert!(BlockKind::from_type_name("dcMotor_setDualPower").is_none());
        assert_eq!(
            BlockKind::from_type_name("linearOpMode_sleep_Number"),
            Some(BlockKind::LinearOpMode(OpModeCall::Sleep { typed: true }))
        );
    }

    #[test]
    fn typed_shapes_declare_java_types() {
        let block = block_of("telemetry_addNumericData_Number", &[]);
        assert_eq!(java_input_type(&block, "NUMBER").unwrap().as_deref(), Some("double"));
        assert_eq!(java_input_type(&block, "KEY").unwrap(), None);
        assert!(block.shape.is_statement());
    }

    #[test]
    fn color_output_type_follows_property() {
        let red = block_of("color_getProperty_Number", &[("PROP", "Red")]);
        assert_eq!(output_java_type(&red).unwrap().as_deref(), Some("int"));
        let hue = block_of("color_getProperty_Number", &[("PROP", "Hue")]);
        assert_eq!(output_java_type(&hue).unwrap().as_deref(), Some("float"));
        let bad = block_of("color_getProperty_Number", &[("PROP", "Brightness")]);
        let err = output_java_type(&bad).unwrap_err();
        assert!(err.to_string().contains("Unexpected prop 'Brightness'"));
    }

    #[test]
    fn gamepad_typing_rejects_mismatched_properties() {
        let stick = block_of(
            "gamepad_getProperty_Number",
            &[("IDENTIFIER", "gamepad1"), ("PROP", "LeftStickY")],
        );
        assert_eq!(output_java_type(&stick).unwrap().as_deref(), Some("float"));
        let button = block_of(
            "gamepad_getProperty_Number",
            &[("IDENTIFIER", "gamepad1"), ("PROP", "A")],
        );
        assert!(output_java_type(&button).is_err());
        let bad_pad = block_of(
            "gamepad_getProperty",
            &[("IDENTIFIER", "gamepad3"), ("PROP", "A")],
        );
        assert!(gamepad_identifier(&bad_pad).is_err());
    }

    #[test]
    fn motor_property_types_depend_on_dropdown() {
        let target = block_of(
            "dcMotor_setProperty_Number",
            &[("IDENTIFIER", "armAsDcMotor"), ("PROP", "TargetPosition")],
        );
        assert_eq!(java_input_type(&target, "VALUE").unwrap().as_deref(), Some("int"));
        let read_only = block_of(
            "dcMotor_setProperty_Number",
            &[("IDENTIFIER", "armAsDcMotor"), ("PROP", "CurrentPosition")],
        );
        assert!(java_input_type(&read_only, "VALUE").is_err());
    }
}
