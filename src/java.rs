use crate::ast::Block;
use crate::blk::{Flavor, OpModeMeta};
use crate::generator::{
    self, doc_comment, line_comment, procedure_args, procedure_name, quote_with, Generator,
};
use crate::mutation::CallAttributes;
use crate::order::{BinaryOperator, Order};
use crate::registry::{
    self, BlockKind, ColorProperty, DeviceProperty, GamepadProperty, MiscBlock, OpModeCall,
    TelemetryBlock,
};
use crate::context::{is_reserved, make_identifier};
use crate::types::known_type_to_class_name;
use anyhow::{bail, Result};
use tracing::{debug, warn};

const DEFAULT_PROCEDURE_DOC: &str = "Describe this function...";
const RUN_OP_MODE_DOC: &str =
    "This function is executed when this OpMode is selected from the Driver Station.";

pub fn program(gen: &mut Generator, meta: &OpModeMeta) -> Result<String> {
    let class_name = &gen.options.class_name;
    if class_name.is_empty() || make_identifier(class_name) != *class_name || is_reserved(class_name) {
        bail!("Class name '{}' is not a usable Java identifier.", class_name);
    }
    let graph = gen.graph;
    let mut methods = Vec::new();
    let mut run_op_mode = None;
    for top in graph.top_blocks() {
        if top.disabled {
            debug!(block = %top.id, "skipping disabled top block");
            continue;
        }
        match top.kind {
            BlockKind::ProcedureDef { .. } if procedure_name(top)? != "runOpMode" => {
                methods.push(method(gen, top)?)
            }
            BlockKind::ProcedureDef { .. } if run_op_mode.is_some() => {
                warn!(block = %top.id, "ignoring second runOpMode definition")
            }
            BlockKind::ProcedureDef { .. } => run_op_mode = Some(top),
            _ => warn!(
                block = %top.id,
                kind = %top.type_name,
                "block outside any function is not part of the compiled OpMode"
            ),
        }
    }
    let (run_body, run_doc) = match run_op_mode {
        Some(block) => (gen.statement_to_code(block, "STACK")?, block.comment.clone()),
        None => {
            warn!("program has no runOpMode function");
            (String::new(), None)
        }
    };

    gen.ctx.import_known("LinearOpMode")?;
    let annotation = annotation(gen, meta)?;
    let mut variable_fields = Vec::new();
    for variable in graph.variables() {
        let identifier = gen.variable_identifier(variable);
        let java_type = gen.variable_type(variable).to_string();
        import_if_known(gen, &java_type)?;
        variable_fields.push(format!("private {} {};", java_type, identifier));
    }

    let collected = std::mem::take(&mut gen.ctx).flush();
    let mut members = Vec::new();
    let fields: Vec<String> = collected.fields.into_iter().chain(variable_fields).collect();
    if !fields.is_empty() {
        members.push(fields.iter().map(|f| format!("{}\n", f)).collect::<String>());
    }
    members.extend(methods);

    let mut body = collected
        .assignments
        .iter()
        .map(|a| format!("{}{}\n", generator::INDENT, a))
        .collect::<String>();
    if !body.is_empty() && !run_body.is_empty() {
        body.push('\n');
    }
    body.push_str(&run_body);
    members.push(format!(
        "{}@Override\npublic void runOpMode() {{\n{}}}\n",
        doc_comment(run_doc.as_deref().unwrap_or(RUN_OP_MODE_DOC)),
        body
    ));

    let mut code = format!("package {};\n\n", gen.options.package);
    for import in &collected.imports {
        code.push_str(&format!("import {};\n", import));
    }
    if !collected.imports.is_empty() {
        code.push('\n');
    }
    code.push_str(&annotation);
    code.push_str(&format!(
        "public class {} extends LinearOpMode {{\n\n",
        gen.options.class_name
    ));
    let members: Vec<String> = members.iter().map(|m| generator::indent(m)).collect();
    code.push_str(&members.join("\n"));
    code.push_str("}\n");
    Ok(code)
}

fn annotation(gen: &mut Generator, meta: &OpModeMeta) -> Result<String> {
    let name = match meta.flavor {
        Flavor::TeleOp => "TeleOp",
        Flavor::Autonomous => "Autonomous",
    };
    gen.ctx.import_known(name)?;
    let mut attributes = vec![format!("name = {}", quote_with(&gen.options.class_name, '"'))];
    if !meta.group.is_empty() {
        attributes.push(format!("group = {}", quote_with(&meta.group, '"')));
    }
    if meta.flavor == Flavor::Autonomous && !meta.auto_transition.is_empty() {
        attributes.push(format!(
            "preselectTeleOp = {}",
            quote_with(&meta.auto_transition, '"')
        ));
    }
    let mut code = format!("@{}({})\n", name, attributes.join(", "));
    if !meta.enabled {
        gen.ctx.import_known("Disabled")?;
        code.push_str("@Disabled\n");
    }
    Ok(code)
}

fn import_if_known(gen: &mut Generator, java_type: &str) -> Result<()> {
    let outer = java_type.split(['.', '[']).next().unwrap_or(java_type);
    if known_type_to_class_name(outer).is_some() {
        gen.ctx.import_known(outer)?;
    }
    Ok(())
}

fn method(gen: &mut Generator, block: &Block) -> Result<String> {
    let name = procedure_name(block)?;
    let identifier = gen.procedure_identifier(&name);
    let mut params = Vec::new();
    for arg in procedure_args(block) {
        let java_type = gen.variable_type(arg).to_string();
        import_if_known(gen, &java_type)?;
        params.push(format!("{} {}", java_type, gen.variable_identifier(arg)));
    }
    let mut body = gen.statement_to_code(block, "STACK")?;
    let return_type = if block.kind == (BlockKind::ProcedureDef { returns: true }) {
        let value = gen.value_to_code(block, "RETURN", Order::None)?;
        body.push_str(&generator::indent(&format!("return {};\n", value)));
        let return_type = gen.procedure_return_type(&name).to_string();
        import_if_known(gen, &return_type)?;
        return_type
    } else {
        "void".to_string()
    };
    let doc = block
        .comment
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_PROCEDURE_DOC);
    Ok(format!(
        "{}private {} {}({}) {{\n{}}}\n",
        doc_comment(doc),
        return_type,
        identifier,
        params.join(", "),
        body
    ))
}

pub fn value(gen: &mut Generator, block: &Block) -> Result<(String, Order)> {
    Ok(match block.kind {
        BlockKind::Misc(MiscBlock::Null) => ("null".to_string(), Order::Atomic),
        BlockKind::Misc(MiscBlock::IsNull) | BlockKind::Misc(MiscBlock::IsNotNull) => {
            let symbol = if block.kind == BlockKind::Misc(MiscBlock::IsNull) {
                "=="
            } else {
                "!="
            };
            let operator = BinaryOperator::new(symbol, Order::Equality);
            let value = gen.value_to_code(block, "VALUE", operator.left_context())?;
            (format!("{} {} null", value, symbol), operator.order)
        }
        BlockKind::Misc(MiscBlock::Atan2) => {
            let y = gen.value_to_code(block, "Y", Order::Comma)?;
            let x = gen.value_to_code(block, "X", Order::Comma)?;
            (
                format!("Math.atan2({}, {}) / Math.PI * 180", y, x),
                Order::Multiplicative,
            )
        }
        BlockKind::Misc(MiscBlock::FormatNumber) => {
            (format!("JavaUtil.formatNumber({})", number_and_precision(gen, block)?), Order::Postfix)
        }
        BlockKind::Misc(MiscBlock::RoundDecimal) => (
            format!(
                "Double.parseDouble(JavaUtil.formatNumber({}))",
                number_and_precision(gen, block)?
            ),
            Order::Postfix,
        ),
        BlockKind::CallJava { returns: true } => (call_java(gen, block)?, Order::Postfix),
        BlockKind::CallHardware { returns: true } => (call_hardware(gen, block)?, Order::Postfix),
        BlockKind::Telemetry(TelemetryBlock::TypedEnumDisplayFormat) => {
            let format = registry::display_format(block)?;
            gen.ctx.import_known("Telemetry")?;
            (format!("Telemetry.DisplayFormat.{}", format), Order::Postfix)
        }
        BlockKind::LinearOpMode(op) => (format!("{}()", op.method_name()), Order::Postfix),
        BlockKind::ColorGetProperty { .. } => {
            let property = ColorProperty::of(block)?;
            let color = gen.value_to_code(block, "COLOR", Order::None)?;
            let code = if property.is_channel() {
                gen.ctx.import_known("Color")?;
                format!("Color.{}({})", property.name().to_ascii_lowercase(), color)
            } else {
                gen.ctx.import_known("JavaUtil")?;
                format!("JavaUtil.colorTo{}({})", property.name(), color)
            };
            (code, Order::Postfix)
        }
        BlockKind::GamepadGetProperty(typing) => {
            let property = GamepadProperty::of(block, typing)?;
            let gamepad = registry::gamepad_identifier(block)?;
            (format!("{}.{}", gamepad, property.member), Order::Postfix)
        }
        BlockKind::DeviceGetProperty(kind) => {
            let property = DeviceProperty::of(block, kind, false)?;
            let device = gen.resolve_device(block, kind)?;
            let identifier = gen.declare_hardware_device(&device)?;
            (format!("{}.{}()", identifier, property.getter), Order::Postfix)
        }
        BlockKind::ListsLength => {
            let list = gen.value_to_code(block, "VALUE", Order::Postfix)?;
            (format!("{}.size()", list), Order::Postfix)
        }
        BlockKind::ListsIsEmpty => {
            let list = gen.value_to_code(block, "VALUE", Order::Postfix)?;
            (format!("{}.isEmpty()", list), Order::Postfix)
        }
        _ => return gen.core_value(block),
    })
}

fn number_and_precision(gen: &mut Generator, block: &Block) -> Result<String> {
    gen.ctx.import_known("JavaUtil")?;
    let number = gen.value_to_code(block, "NUMBER", Order::Comma)?;
    let precision = gen.value_to_code(block, "PRECISION", Order::Comma)?;
    Ok(format!("{}, {}", number, precision))
}

pub fn statement(gen: &mut Generator, block: &Block) -> Result<String> {
    Ok(match block.kind {
        BlockKind::Comment => line_comment(block.field("COMMENT").unwrap_or("")),
        BlockKind::Misc(MiscBlock::AddItemToList) => {
            let list = gen.value_to_code(block, "LIST", Order::Postfix)?;
            let item = gen.value_to_code(block, "ITEM", Order::None)?;
            format!("{}.add({});\n", list, item)
        }
        BlockKind::CallJava { returns: false } => format!("{};\n", call_java(gen, block)?),
        BlockKind::CallHardware { returns: false } => format!("{};\n", call_hardware(gen, block)?),
        BlockKind::Telemetry(telemetry) => telemetry_statement(gen, block, telemetry)?,
        BlockKind::LinearOpMode(OpModeCall::Sleep { .. }) => {
            let millis = gen.value_to_code(block, "MILLISECONDS", Order::None)?;
            format!("sleep({});\n", millis)
        }
        BlockKind::LinearOpMode(op) => format!("{}();\n", op.method_name()),
        BlockKind::DeviceSetProperty(kind) => {
            let property = DeviceProperty::of(block, kind, true)?;
            let device = gen.resolve_device(block, kind)?;
            let identifier = gen.declare_hardware_device(&device)?;
            let value = gen.value_to_code(block, "VALUE", Order::None)?;
            let setter = property.setter.unwrap_or(property.getter);
            format!("{}.{}({});\n", identifier, setter, value)
        }
        _ => return gen.core_statement(block),
    })
}

fn telemetry_statement(gen: &mut Generator, block: &Block, telemetry: TelemetryBlock) -> Result<String> {
    Ok(match telemetry {
        TelemetryBlock::AddNumericData { .. } => {
            let key = gen.value_to_code(block, "KEY", Order::Comma)?;
            let number = gen.value_to_code(block, "NUMBER", Order::Comma)?;
            format!("telemetry.addData({}, {});\n", key, number)
        }
        TelemetryBlock::AddTextData { .. } => {
            let key = gen.value_to_code(block, "KEY", Order::Comma)?;
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            format!("telemetry.addData({}, {});\n", key, text)
        }
        TelemetryBlock::Update => "telemetry.update();\n".to_string(),
        TelemetryBlock::Speak => {
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            format!("telemetry.speak({}, null, null);\n", text)
        }
        TelemetryBlock::SpeakWithLanguage => {
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            let language = gen.value_to_code(block, "LANGUAGE_CODE", Order::Comma)?;
            let country = gen.value_to_code(block, "COUNTRY_CODE", Order::Comma)?;
            format!("telemetry.speak({}, {}, {});\n", text, language, country)
        }
        TelemetryBlock::SetDisplayFormat => {
            let format = gen.value_to_code(block, "DISPLAY_FORMAT", Order::None)?;
            format!("telemetry.setDisplayFormat({});\n", format)
        }
        TelemetryBlock::TypedEnumDisplayFormat => return gen.core_statement(block),
    })
}

fn import_signature(gen: &mut Generator, attributes: &CallAttributes) {
    gen.ctx.import_class_type(&attributes.return_type);
    for parameter in &attributes.parameters {
        gen.ctx.import_class_type(&parameter.class_type);
    }
}

fn call_arguments(gen: &mut Generator, block: &Block, attributes: &CallAttributes) -> Result<String> {
    let order = if attributes.parameters.len() == 1 {
        Order::None
    } else {
        Order::Comma
    };
    let mut args = Vec::with_capacity(attributes.parameters.len());
    for (index, parameter) in attributes.parameters.iter().enumerate() {
        match &parameter.auto {
            Some(auto) => args.push(auto.clone()),
            None => args.push(gen.value_to_code_or(block, &format!("ARG{}", index), order, "null")?),
        }
    }
    Ok(args.join(", "))
}

fn call_java(gen: &mut Generator, block: &Block) -> Result<String> {
    let attributes = generator::required_call_attributes(block)?;
    import_signature(gen, attributes);
    if attributes.class_needs_import() {
        gen.ctx.import_class_type(&attributes.full_class_name);
    }
    let method = block.required_field("METHOD_NAME")?;
    let args = call_arguments(gen, block, attributes)?;
    Ok(format!("{}.{}({})", attributes.simple_name, method, args))
}

/// Instance call on a device field declared for the block's device name.
fn call_hardware(gen: &mut Generator, block: &Block) -> Result<String> {
    let attributes = generator::required_call_attributes(block)?;
    import_signature(gen, attributes);
    let device_name = block.required_field("DEVICE_NAME")?;
    let identifier = gen.declare_device(
        &attributes.simple_name,
        &attributes.full_class_name,
        device_name,
    );
    let method = block.required_field("METHOD_NAME")?;
    let args = call_arguments(gen, block, attributes)?;
    Ok(format!("{}.{}({})", identifier, method, args))
}
