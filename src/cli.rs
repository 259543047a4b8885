use crate::generator::{Mode, DEFAULT_PACKAGE};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Script for the runtime bridge.
    Js,
    /// Compiled LinearOpMode class.
    Java,
}

impl Target {
    pub fn mode(self) -> Mode {
        match self {
            Target::Js => Mode::JavaScript,
            Target::Java => Mode::Java,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "blkgen",
    about = "Generate OpMode source (JavaScript or Java) from a saved FTC blocks program."
)]
pub struct Args {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Write generated code here instead of stdout.")]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Target::Js)]
    pub target: Target,

    #[arg(long, help = "Hardware configuration JSON listing the robot's devices.")]
    pub hardware: Option<PathBuf>,

    #[arg(long, help = "Java class name. Defaults to the input file stem.")]
    pub class_name: Option<String>,

    #[arg(long, default_value = DEFAULT_PACKAGE, help = "Java package of the generated class.")]
    pub package: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_script_target() {
        let args = Args::parse_from(["blkgen", "drive.blk"]);
        assert_eq!(args.target, Target::Js);
        assert_eq!(args.package, DEFAULT_PACKAGE);
        assert!(args.output.is_none());
    }

    #[test]
    fn parses_java_options() {
        let args = Args::parse_from([
            "blkgen",
            "drive.blk",
            "Drive.java",
            "--target",
            "java",
            "--class-name",
            "Drive",
            "--hardware",
            "robot.json",
        ]);
        assert_eq!(args.target.mode(), Mode::Java);
        assert_eq!(args.class_name.as_deref(), Some("Drive"));
        assert_eq!(args.hardware, Some(PathBuf::from("robot.json")));
    }
}
