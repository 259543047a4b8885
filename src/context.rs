use crate::types::{self, known_type_to_class_name};
use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

const RESERVED_WORDS: &[&str] = &[
    // Java
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "true", "false", "null",
    // JavaScript
    "arguments", "await", "delete", "eval", "export", "function", "in", "let", "typeof",
    "undefined", "var", "with", "yield",
    // Names the generated code relies on
    "hardwareMap", "telemetry", "gamepad1", "gamepad2", "linearOpMode", "misc", "color",
    "runOpMode", "callJava", "callHardware", "listLength", "listIsEmpty",
    "telemetryAddTextData", "telemetrySpeak", "Math", "String", "Double", "Object",
];

/// Keeps `[A-Za-z0-9$_]`; a leading digit gets an underscore prefix.
pub fn make_identifier(name: &str) -> String {
    let mut identifier = String::with_capacity(name.len());
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            continue;
        }
        if identifier.is_empty() && c.is_ascii_digit() {
            identifier.push('_');
        }
        identifier.push(c);
    }
    identifier
}

pub fn is_reserved(identifier: &str) -> bool {
    RESERVED_WORDS.contains(&identifier) || known_type_to_class_name(identifier).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationKey {
    Field(String),
    Assignment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Variable,
    Procedure,
    /// Devices are keyed by their simple class name, which also names the collision suffix.
    Device(String),
}

/// What a finished run hands to program assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub imports: Vec<String>,
    pub fields: Vec<String>,
    pub assignments: Vec<String>,
}

/// Per-run imports, declarations and identifier table. Built fresh for every
/// generation pass and consumed by `flush`.
#[derive(Debug, Default)]
pub struct GenerationContext {
    own_package: Option<String>,
    imports: BTreeSet<String>,
    declarations: Vec<(DeclarationKey, String)>,
    declared: HashSet<DeclarationKey>,
    names: HashMap<(Namespace, String), String>,
    taken: HashSet<String>,
    distinct: HashMap<String, usize>,
}

impl GenerationContext {
    pub fn new(own_package: Option<&str>) -> Self {
        Self {
            own_package: own_package.map(str::to_string),
            ..Self::default()
        }
    }

    /// Returns false when the class is filtered or already registered.
    pub fn register_import(&mut self, class_name: &str) -> bool {
        let Some((package, _)) = class_name.rsplit_once('.') else {
            return false;
        };
        if package == "java.lang" || self.own_package.as_deref() == Some(package) {
            return false;
        }
        let added = self.imports.insert(class_name.to_string());
        if added {
            debug!(import = class_name, "registered import");
        }
        added
    }

    /// Imports whatever a (possibly array or inner) class type needs.
    pub fn import_class_type(&mut self, class_type: &str) {
        if let Some(target) = types::import_target(class_type) {
            self.register_import(&target);
        }
    }

    /// Imports a simple name from the known type table, e.g. `JavaUtil`.
    pub fn import_known(&mut self, simple: &str) -> Result<()> {
        let outer = simple.split('.').next().unwrap_or(simple);
        let class_name = known_type_to_class_name(outer)
            .ok_or_else(|| anyhow!("No known class for type '{}'.", simple))?;
        self.register_import(&class_name);
        Ok(())
    }

    pub fn register_declaration(&mut self, key: DeclarationKey, text: String) -> bool {
        if !self.declared.insert(key.clone()) {
            return false;
        }
        self.declarations.push((key, text));
        true
    }

    /// Stable identifier for a human-readable name, unique across namespaces.
    pub fn identifier_for(&mut self, namespace: Namespace, name: &str) -> String {
        let key = (namespace, name.to_string());
        if let Some(existing) = self.names.get(&key) {
            return existing.clone();
        }
        let mut base = make_identifier(name);
        if base.is_empty() {
            base.push('_');
        }
        if let Namespace::Device(class_name) = &key.0 {
            if is_reserved(&base) || self.taken.contains(&base) {
                base = format!("{}As{}", base, class_name);
            }
        }
        let mut candidate = base.clone();
        let mut counter = 1;
        while is_reserved(&candidate) || self.taken.contains(&candidate) {
            counter += 1;
            candidate = format!("{}{}", base, counter);
        }
        self.taken.insert(candidate.clone());
        self.names.insert(key, candidate.clone());
        candidate
    }

    /// Fresh helper name (`count`, `count2`, ...) that never clashes with user names.
    pub fn distinct_name(&mut self, base: &str) -> String {
        loop {
            let counter = self.distinct.entry(base.to_string()).or_insert(0);
            *counter += 1;
            let candidate = if *counter == 1 {
                base.to_string()
            } else {
                format!("{}{}", base, counter)
            };
            if !self.taken.contains(&candidate) && !is_reserved(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
        }
    }

    pub fn flush(self) -> Collected {
        let mut collected = Collected {
            imports: self.imports.into_iter().collect(),
            ..Collected::default()
        };
        for (key, text) in self.declarations {
            match key {
                DeclarationKey::Field(_) => collected.fields.push(text),
                DeclarationKey::Assignment(_) => collected.assignments.push(text),
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn device(class_name: &str) -> Namespace {
        Namespace::Device(class_name.to_string())
    }

    #[test]
    fn identifiers_keep_only_java_identifier_characters() {
        assert_eq!(make_identifier("left motor"), "leftmotor");
        assert_eq!(make_identifier("2nd-arm"), "_2ndarm");
        assert_eq!(make_identifier("$cash_box"), "$cash_box");
        assert_eq!(make_identifier("  "), "");
    }

    #[test]
    fn imports_are_deduplicated_and_filtered() {
        let mut ctx = GenerationContext::new(Some("org.firstinspires.ftc.teamcode"));
        assert!(ctx.register_import("com.qualcomm.robotcore.hardware.DcMotor"));
        assert!(!ctx.register_import("com.qualcomm.robotcore.hardware.DcMotor"));
        assert!(!ctx.register_import("java.lang.Math"));
        assert!(ctx.register_import("java.lang.reflect.Field"));
        assert!(!ctx.register_import("org.firstinspires.ftc.teamcode.Helpers"));
        assert!(!ctx.register_import("int"));
        ctx.import_known("JavaUtil").unwrap();
        ctx.import_known("Telemetry.DisplayFormat").unwrap();
        assert!(ctx.import_known("NoSuchThing").is_err());
        assert_eq!(
            ctx.flush().imports,
            vec![
                "com.qualcomm.robotcore.hardware.DcMotor",
                "java.lang.reflect.Field",
                "org.firstinspires.ftc.robotcore.external.JavaUtil",
                "org.firstinspires.ftc.robotcore.external.Telemetry",
            ]
        );
    }

    #[test]
    fn declarations_keep_first_registration() {
        let mut ctx = GenerationContext::new(None);
        assert!(ctx.register_declaration(DeclarationKey::Field("arm".into()), "private DcMotor arm;".into()));
        assert!(!ctx.register_declaration(DeclarationKey::Field("arm".into()), "private Servo arm;".into()));
        ctx.register_declaration(
            DeclarationKey::Assignment("arm".into()),
            "arm = hardwareMap.get(DcMotor.class, \"arm\");".into(),
        );
        let collected = ctx.flush();
        assert_eq!(collected.fields, vec!["private DcMotor arm;"]);
        assert_eq!(collected.assignments.len(), 1);
    }

    #[test]
    fn colliding_device_names_get_kind_suffix() {
        let mut ctx = GenerationContext::new(None);
        assert_eq!(ctx.identifier_for(device("DcMotor"), "arm"), "arm");
        assert_eq!(
            ctx.identifier_for(device("TouchSensor"), "arm"),
            "armAsTouchSensor"
        );
        assert_eq!(
            ctx.identifier_for(device("Servo"), "telemetry"),
            "telemetryAsServo"
        );
        assert_eq!(ctx.identifier_for(device("DcMotor"), "arm"), "arm");
        assert_eq!(ctx.identifier_for(Namespace::Variable, "arm"), "arm2");
        assert_eq!(ctx.identifier_for(Namespace::Variable, "for"), "for2");
    }

    #[test]
    fn distinct_names_skip_taken_identifiers() {
        let mut ctx = GenerationContext::new(None);
        ctx.identifier_for(Namespace::Variable, "count");
        assert_eq!(ctx.distinct_name("count"), "count2");
        assert_eq!(ctx.distinct_name("count"), "count3");
    }
}
