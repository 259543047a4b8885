use crate::registry::{BlockKind, Output, Shape};
use crate::types::{self, Check, Position, ResolvedType};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::{BTreeMap, HashMap};
use xmltree::{Element, XMLNode};

const TEAMCODE_PACKAGE: &str = "org.firstinspires.ftc.teamcode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParameter {
    pub class_type: String,
    /// Expression supplied in place of a socket, e.g. `hardwareMap`.
    pub auto: Option<String>,
    pub resolved: ResolvedType,
}

/// Decoded `<mutation>` of the call-method blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttributes {
    pub method_lookup_string: String,
    pub return_type: String,
    pub comment: String,
    pub access_method: String,
    pub convert_return_value: String,
    pub full_class_name: String,
    pub simple_name: String,
    pub parameters: Vec<CallParameter>,
}

impl CallAttributes {
    pub fn decode(attributes: &HashMap<String, String>, fields: &BTreeMap<String, String>) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            attributes
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("mutation is missing attribute '{}'", name))
        };
        let optional = |name: &str, default: &str| -> String {
            attributes
                .get(name)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let method_lookup_string = required("methodLookupString")?;
        let return_type = required("returnType")?;
        let raw_count = required("parameterCount")?;
        let parameter_count: usize = raw_count
            .trim()
            .parse()
            .with_context(|| format!("invalid parameterCount '{}'", raw_count))?;

        let class_name = fields.get("CLASS_NAME").cloned().unwrap_or_default();

        let mut parameters = Vec::with_capacity(parameter_count);
        for i in 0..parameter_count {
            let class_type = required(&format!("argType{}", i))?;
            let auto = optional(&format!("argAuto{}", i), "");
            parameters.push(CallParameter {
                resolved: types::resolve(&class_type, Position::Input),
                class_type,
                auto: if auto.is_empty() { None } else { Some(auto) },
            });
        }

        let mut decoded = Self {
            method_lookup_string,
            return_type,
            comment: optional("comment", ""),
            access_method: optional("accessMethod", ""),
            convert_return_value: optional("convertReturnValue", ""),
            full_class_name: optional(
                "fullClassName",
                &format!("{}.{}", TEAMCODE_PACKAGE, class_name),
            ),
            simple_name: optional("simpleName", &class_name),
            parameters,
        };
        if decoded.access_method.is_empty() {
            decoded.infer_access_method();
        }
        Ok(decoded)
    }

    /// Older saved programs carry no access method; derive it from the return type.
    fn infer_access_method(&mut self) {
        self.access_method = "callJava".to_string();
        self.convert_return_value.clear();
        match self.return_type.as_str() {
            "boolean" | "java.lang.Boolean" => self.access_method.push_str("_boolean"),
            "char" | "java.lang.Character" | "java.lang.String" => {
                self.access_method.push_str("_String")
            }
            "byte" | "java.lang.Byte" | "short" | "java.lang.Short" | "int"
            | "java.lang.Integer" | "long" | "java.lang.Long" | "float" | "java.lang.Float"
            | "double" | "java.lang.Double" => {
                self.access_method.push_str("_String");
                self.convert_return_value = "Number".to_string();
            }
            _ => {}
        }
    }

    pub fn returns_value(&self) -> bool {
        self.return_type != "void"
    }

    pub fn resolved_return(&self) -> Option<ResolvedType> {
        self.returns_value()
            .then(|| types::resolve(&self.return_type, Position::Output))
    }

    /// Classes declared directly in the team code package are never imported.
    pub fn class_needs_import(&self) -> bool {
        match self.full_class_name.rsplit_once('.') {
            Some((package, _)) => package != TEAMCODE_PACKAGE,
            None => false,
        }
    }
}

/// Serialized per-instance shape metadata, decoded once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Call(CallAttributes),
    If { else_if: usize, has_else: bool },
    Items(usize),
    Procedure { name: String, args: Vec<String> },
}

impl Mutation {
    pub fn decode(kind: BlockKind, element: &Element, fields: &BTreeMap<String, String>) -> Result<Self> {
        let attributes = &element.attributes;
        match kind {
            BlockKind::CallJava { .. } | BlockKind::CallHardware { .. } => {
                Ok(Mutation::Call(CallAttributes::decode(attributes, fields)?))
            }
            BlockKind::ControlsIf => Ok(Mutation::If {
                else_if: count_attribute(attributes, "elseif")?,
                has_else: count_attribute(attributes, "else")? > 0,
            }),
            BlockKind::TextJoin | BlockKind::ListsCreateWith => {
                Ok(Mutation::Items(count_attribute(attributes, "items")?))
            }
            BlockKind::ProcedureDef { .. } | BlockKind::ProcedureCall { .. } => {
                let name = attributes
                    .get("name")
                    .cloned()
                    .or_else(|| fields.get("NAME").cloned())
                    .unwrap_or_default();
                let args = element
                    .children
                    .iter()
                    .filter_map(|node| match node {
                        XMLNode::Element(child) if child.name == "arg" => {
                            child.attributes.get("name").cloned()
                        }
                        _ => None,
                    })
                    .collect();
                Ok(Mutation::Procedure { name, args })
            }
            other => bail!("{:?} blocks do not take a mutation", other),
        }
    }

    /// Adds the sockets this mutation describes to a freshly built static shape.
    pub fn apply(&self, shape: &mut Shape) {
        match self {
            Mutation::Call(attributes) => {
                for (i, param) in attributes.parameters.iter().enumerate() {
                    if param.auto.is_some() {
                        continue;
                    }
                    shape.push_socket(
                        format!("ARG{}", i),
                        param.resolved.check.clone(),
                        Some(param.resolved.label.clone()),
                    );
                }
                if let (Output::Value { check, java_type }, Some(resolved)) =
                    (&mut shape.output, attributes.resolved_return())
                {
                    *check = resolved.check;
                    *java_type = Some(resolved.label);
                }
            }
            Mutation::If { else_if, has_else } => {
                for i in 1..=*else_if {
                    shape.push_socket(format!("IF{}", i), Check::one("Boolean"), None);
                    shape.statements.push(format!("DO{}", i));
                }
                if *has_else {
                    shape.statements.push("ELSE".to_string());
                }
            }
            Mutation::Items(count) => {
                for i in 0..*count {
                    shape.push_socket(format!("ADD{}", i), Check::Any, None);
                }
            }
            Mutation::Procedure { args, .. } => {
                // Definitions bind their arguments as variables; only calls take sockets.
                if shape.statements.is_empty() {
                    for i in 0..args.len() {
                        shape.push_socket(format!("ARG{}", i), Check::Any, None);
                    }
                }
            }
        }
    }
}

fn count_attribute(attributes: &HashMap<String, String>, name: &str) -> Result<usize> {
    match attributes.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid mutation attribute {}='{}'", name, raw)),
        None => Ok(0),
    }
}
