use crate::ast::Block;
use crate::generator::{self, doc_comment, procedure_args, procedure_name, quote_with, Generator};
use crate::mutation::CallAttributes;
use crate::order::Order;
use crate::registry::{
    self, BlockKind, ColorProperty, DeviceProperty, GamepadProperty, MiscBlock, OpModeCall,
    TelemetryBlock,
};
use anyhow::Result;
use tracing::debug;

pub fn program(gen: &mut Generator) -> Result<String> {
    let graph = gen.graph;
    let mut sections = Vec::new();
    for top in graph.top_blocks() {
        if top.disabled {
            debug!(block = %top.id, "skipping disabled top block");
            continue;
        }
        let section = match top.kind {
            BlockKind::ProcedureDef { .. } => procedure(gen, top)?,
            _ if top.shape.is_statement() => gen.chain_to_code(&top.id)?,
            _ => format!("{};\n", gen.render_value(top)?.0),
        };
        sections.push(section);
    }

    let mut code = String::new();
    for variable in graph.variables() {
        let identifier = gen.variable_identifier(variable);
        code.push_str(&format!("var {};\n", identifier));
    }
    if !code.is_empty() && !sections.is_empty() {
        code.push('\n');
    }
    code.push_str(&sections.join("\n"));
    Ok(code)
}

fn procedure(gen: &mut Generator, block: &Block) -> Result<String> {
    let name = procedure_name(block)?;
    let identifier = gen.procedure_identifier(&name);
    let params: Vec<String> = procedure_args(block)
        .iter()
        .map(|arg| gen.variable_identifier(arg))
        .collect();
    let mut body = gen.statement_to_code(block, "STACK")?;
    if block.kind == (BlockKind::ProcedureDef { returns: true }) {
        let value = gen.value_to_code(block, "RETURN", Order::None)?;
        body.push_str(&generator::indent(&format!("return {};\n", value)));
    }

    let mut code = String::new();
    if let Some(comment) = block.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        code.push_str(&doc_comment(comment));
    }
    code.push_str(&format!(
        "function {}({}) {{\n{}}}\n",
        identifier,
        params.join(", "),
        body
    ));
    Ok(code)
}

pub fn value(gen: &mut Generator, block: &Block) -> Result<(String, Order)> {
    Ok(match block.kind {
        BlockKind::Misc(MiscBlock::Null) => ("misc.getNull()".to_string(), Order::Postfix),
        BlockKind::Misc(MiscBlock::IsNull) => {
            let value = gen.value_to_code(block, "VALUE", Order::None)?;
            (format!("misc.isNull({})", value), Order::Postfix)
        }
        BlockKind::Misc(MiscBlock::IsNotNull) => {
            let value = gen.value_to_code(block, "VALUE", Order::None)?;
            (format!("misc.isNotNull({})", value), Order::Postfix)
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
            let number = gen.value_to_code(block, "NUMBER", Order::Comma)?;
            let precision = gen.value_to_code(block, "PRECISION", Order::Comma)?;
            (
                format!("misc.formatNumber({}, {})", number, precision),
                Order::Postfix,
            )
        }
        BlockKind::Misc(MiscBlock::RoundDecimal) => {
            let number = gen.value_to_code(block, "NUMBER", Order::Comma)?;
            let precision = gen.value_to_code(block, "PRECISION", Order::Comma)?;
            (
                format!("misc.roundDecimal({}, {})", number, precision),
                Order::Postfix,
            )
        }
        BlockKind::CallJava { returns: true } | BlockKind::CallHardware { returns: true } => {
            (call(gen, block)?, Order::Postfix)
        }
        BlockKind::Telemetry(TelemetryBlock::TypedEnumDisplayFormat) => {
            let format = registry::display_format(block)?;
            (quote_with(format, '"'), Order::Atomic)
        }
        BlockKind::LinearOpMode(op) => {
            (format!("linearOpMode.{}()", op.method_name()), Order::Postfix)
        }
        BlockKind::ColorGetProperty { .. } => {
            let property = ColorProperty::of(block)?;
            let color = gen.value_to_code(block, "COLOR", Order::None)?;
            (
                format!("color.get{}({})", property.name(), color),
                Order::Postfix,
            )
        }
        BlockKind::GamepadGetProperty(typing) => {
            let property = GamepadProperty::of(block, typing)?;
            let gamepad = registry::gamepad_identifier(block)?;
            (format!("{}.get{}()", gamepad, property.name), Order::Postfix)
        }
        BlockKind::DeviceGetProperty(kind) => {
            let property = DeviceProperty::of(block, kind, false)?;
            gen.resolve_device(block, kind)?;
            let identifier = block.required_field("IDENTIFIER")?;
            (
                format!("{}.get{}()", identifier, property.name),
                Order::Postfix,
            )
        }
        BlockKind::ListsLength => {
            let list = gen.value_to_code(block, "VALUE", Order::Comma)?;
            (format!("listLength(misc, {})", list), Order::Postfix)
        }
        BlockKind::ListsIsEmpty => {
            let list = gen.value_to_code(block, "VALUE", Order::Comma)?;
            (format!("listIsEmpty(misc, {})", list), Order::Postfix)
        }
        _ => return gen.core_value(block),
    })
}

pub fn statement(gen: &mut Generator, block: &Block) -> Result<String> {
    Ok(match block.kind {
        BlockKind::Comment => String::new(),
        BlockKind::Misc(MiscBlock::AddItemToList) => {
            let list = gen.value_to_code(block, "LIST", Order::Postfix)?;
            let item = gen.value_to_code(block, "ITEM", Order::None)?;
            format!("{}.push({});\n", list, item)
        }
        BlockKind::CallJava { returns: false } | BlockKind::CallHardware { returns: false } => {
            format!("{};\n", call(gen, block)?)
        }
        BlockKind::Telemetry(telemetry) => telemetry_statement(gen, block, telemetry)?,
        BlockKind::LinearOpMode(OpModeCall::Sleep { .. }) => {
            let millis = gen.value_to_code(block, "MILLISECONDS", Order::None)?;
            format!("linearOpMode.sleep({});\n", millis)
        }
        BlockKind::LinearOpMode(op) => format!("linearOpMode.{}();\n", op.method_name()),
        BlockKind::DeviceSetProperty(kind) => {
            let property = DeviceProperty::of(block, kind, true)?;
            gen.resolve_device(block, kind)?;
            let identifier = block.required_field("IDENTIFIER")?;
            let value = gen.value_to_code(block, "VALUE", Order::None)?;
            format!("{}.set{}({});\n", identifier, property.name, value)
        }
        _ => return gen.core_statement(block),
    })
}

fn telemetry_statement(gen: &mut Generator, block: &Block, telemetry: TelemetryBlock) -> Result<String> {
    Ok(match telemetry {
        TelemetryBlock::AddNumericData { .. } => {
            let key = gen.value_to_code(block, "KEY", Order::Comma)?;
            let number = gen.value_to_code(block, "NUMBER", Order::Comma)?;
            format!("telemetry.addNumericData({}, {});\n", key, number)
        }
        TelemetryBlock::AddTextData { .. } => {
            let key = gen.value_to_code(block, "KEY", Order::Comma)?;
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            format!("telemetryAddTextData({}, {});\n", key, text)
        }
        TelemetryBlock::Update => "telemetry.update();\n".to_string(),
        TelemetryBlock::Speak => {
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            format!("telemetrySpeak({}, '', '');\n", text)
        }
        TelemetryBlock::SpeakWithLanguage => {
            let text = gen.value_to_code(block, "TEXT", Order::Comma)?;
            let language = gen.value_to_code(block, "LANGUAGE_CODE", Order::Comma)?;
            let country = gen.value_to_code(block, "COUNTRY_CODE", Order::Comma)?;
            format!("telemetrySpeak({}, {}, {});\n", text, language, country)
        }
        TelemetryBlock::SetDisplayFormat => {
            let format = gen.value_to_code(block, "DISPLAY_FORMAT", Order::None)?;
            format!("telemetry.setDisplayFormat({});\n", format)
        }
        TelemetryBlock::TypedEnumDisplayFormat => return gen.core_statement(block),
    })
}

// The bridge resolves the method from its lookup string.
fn call(gen: &mut Generator, block: &Block) -> Result<String> {
    let attributes = generator::required_call_attributes(block)?;
    let hardware = matches!(block.kind, BlockKind::CallHardware { .. });
    let mut args = header(attributes);
    if hardware {
        args.insert(4, quote_with(block.required_field("DEVICE_NAME")?, '"'));
    }
    for (index, parameter) in attributes.parameters.iter().enumerate() {
        if parameter.auto.is_some() {
            args.push("null".to_string());
        } else {
            args.push(gen.value_to_code_or(block, &format!("ARG{}", index), Order::Comma, "null")?);
        }
    }
    let function = if hardware { "callHardware" } else { "callJava" };
    Ok(format!("{}({})", function, args.join(", ")))
}

fn header(attributes: &CallAttributes) -> Vec<String> {
    vec![
        "misc".to_string(),
        quote_with(&attributes.return_type, '"'),
        quote_with(&attributes.access_method, '"'),
        quote_with(&attributes.convert_return_value, '"'),
        quote_with(&attributes.method_lookup_string, '"'),
    ]
}

#[cfg(test)]
mod tests {
    use crate::blk::parse_blk;
    use crate::generator::{generate, JavaOptions, Mode};
    use crate::hardware::HardwareConfig;
    use pretty_assertions::assert_eq;

    fn render(blocks: &str) -> String {
        let file = parse_blk(&format!("<xml>{}</xml>", blocks)).unwrap();
        generate(
            &file,
            Mode::JavaScript,
            &HardwareConfig::default(),
            &JavaOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn procedures_become_functions() {
        let code = render(
            r#"<variables><variable>n</variable></variables>
            <block type="procedures_defnoreturn" id="main">
              <field name="NAME">runOpMode</field>
              <comment>Entry point.</comment>
              <statement name="STACK">
                <block type="linearOpMode_waitForStart" id="w">
                  <next><block type="linearOpMode_sleep" id="s">
                    <value name="MILLISECONDS"><block type="math_number" id="ms"><field name="NUM">500</field></block></value>
                  </block></next>
                </block>
              </statement>
            </block>"#,
        );
        assert_eq!(
            code,
            "var n;\n\n/**\n * Entry point.\n */\nfunction runOpMode() {\n  linearOpMode.waitForStart();\n  linearOpMode.sleep(500);\n}\n"
        );
    }

    #[test]
    fn device_properties_use_bridge_accessors() {
        let code = render(
            r#"<block type="dcMotor_setProperty_Number" id="p">
              <field name="IDENTIFIER">armAsDcMotor</field><field name="PROP">Power</field>
              <value name="VALUE"><block type="gamepad_getProperty_Number" id="g">
                <field name="IDENTIFIER">gamepad1</field><field name="PROP">LeftStickY</field>
              </block></value>
            </block>"#,
        );
        assert_eq!(code, "armAsDcMotor.setPower(gamepad1.getLeftStickY());\n");
    }

    #[test]
    fn call_java_passes_auto_arguments_as_null() {
        let code = render(
            r#"<block type="misc_callJava_noReturn" id="c">
              <mutation methodLookupString="org.example.Arm.lift(HardwareMap,double)" returnType="void"
                parameterCount="2" argType0="com.qualcomm.robotcore.hardware.HardwareMap" argAuto0="hardwareMap"
                argType1="double" accessMethod="callJava_void" convertReturnValue="" fullClassName="org.example.Arm" simpleName="Arm"/>
              <field name="CLASS_NAME">Arm</field><field name="METHOD_NAME">lift</field>
              <value name="ARG1"><block type="math_number" id="n"><field name="NUM">0.5</field></block></value>
            </block>"#,
        );
        assert_eq!(
            code,
            "callJava(misc, \"void\", \"callJava_void\", \"\", \"org.example.Arm.lift(HardwareMap,double)\", null, 0.5);\n"
        );
    }

    #[test]
    fn comment_block_renders_nothing() {
        let code = render(
            r#"<block type="comment" id="c"><field name="COMMENT">hello</field>
              <next><block type="telemetry_update" id="u"/></next></block>"#,
        );
        assert_eq!(code, "telemetry.update();\n");
    }

    #[test]
    fn disabled_blocks_are_skipped_in_chains() {
        let code = render(
            r#"<block type="telemetry_update" id="a">
              <next><block type="linearOpMode_idle" id="b" disabled="true">
                <next><block type="linearOpMode_waitForStart" id="c"/></next>
              </block></next>
            </block>"#,
        );
        assert_eq!(code, "telemetry.update();\nlinearOpMode.waitForStart();\n");
    }
}
