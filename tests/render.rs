use blkgen_core::generator::JavaOptions;
use blkgen_core::hardware::{Device, HardwareConfig, HardwareKind};
use blkgen_core::{cli, parse_blk, render_java, render_javascript, run_cli};
use clap::Parser;
use pretty_assertions::assert_eq;
use std::fs;

fn program(body: &str) -> String {
    format!(
        r#"<xml xmlns="https://developers.google.com/blockly/xml">
<block type="procedures_defnoreturn" id="main" x="0" y="0">
  <field name="NAME">runOpMode</field>
  <statement name="STACK">{}</statement>
</block>
</xml>"#,
        body
    )
}

const TELEMETRY: &str = r#"
<block type="telemetry_addNumericData_Number" id="t1">
  <value name="KEY"><shadow type="text" id="k"><field name="TEXT">x</field></shadow></value>
  <value name="NUMBER"><shadow type="math_number" id="n"><field name="NUM">5</field></shadow></value>
  <next><block type="telemetry_update" id="t2"/></next>
</block>"#;

const CALL_JAVA: &str = r#"
<block type="telemetry_addNumericData_Number" id="t1">
  <value name="KEY"><block type="text" id="k"><field name="TEXT">scaled</field></block></value>
  <value name="NUMBER">
    <block type="misc_callJava_return" id="c">
      <mutation methodLookupString="com.example.Helpers.scale(double)" returnType="int" parameterCount="1"
        argType0="double" argLabel0="value" fullClassName="com.example.Helpers" simpleName="Helpers"
        accessMethod="callJava_String" convertReturnValue="Number"/>
      <field name="CLASS_NAME">Helpers</field>
      <field name="METHOD_NAME">scale</field>
      <value name="ARG0"><block type="math_number" id="n"><field name="NUM">2</field></block></value>
    </block>
  </value>
</block>"#;

#[test]
fn telemetry_chain_renders_two_lines() {
    let js = render_javascript(&program(TELEMETRY), &HardwareConfig::default()).unwrap();
    assert_eq!(
        js,
        "function runOpMode() {\n  telemetry.addNumericData('x', 5);\n  telemetry.update();\n}\n"
    );

    let java = render_java(&program(TELEMETRY), &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(java.contains("    telemetry.addData(\"x\", 5);\n    telemetry.update();\n"));
}

#[test]
fn call_java_imports_the_class_and_calls_it_statically() {
    let java = render_java(&program(CALL_JAVA), &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(java.contains("import com.example.Helpers;\n"));
    assert!(java.contains("telemetry.addData(\"scaled\", Helpers.scale(2));"));

    let js = render_javascript(&program(CALL_JAVA), &HardwareConfig::default()).unwrap();
    assert!(js.contains(
        "callJava(misc, \"int\", \"callJava_String\", \"Number\", \"com.example.Helpers.scale(double)\", 2)"
    ));
}

#[test]
fn call_java_with_teamcode_class_needs_no_import() {
    let source = program(&CALL_JAVA.replace(
        "com.example.Helpers\" simpleName",
        "org.firstinspires.ftc.teamcode.Helpers\" simpleName",
    ));
    let java = render_java(&source, &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(!java.contains("import org.firstinspires.ftc.teamcode.Helpers;"));
    assert!(java.contains("Helpers.scale(2)"));
}

#[test]
fn reapplying_a_mutation_keeps_the_shape() {
    let file = parse_blk(&program(CALL_JAVA)).unwrap();
    let mut graph = file.graph.clone();
    let id = blkgen_core::ast::BlockId::new("c");
    let before = graph.block(&id).unwrap().shape.clone();
    let block = graph.get_mut(&id).unwrap();
    block.apply_mutation();
    block.apply_mutation();
    assert_eq!(block.shape, before);
    assert_eq!(block.shape.sockets.len(), 1);
}

#[test]
fn output_is_deterministic() {
    let hardware = HardwareConfig::new(vec![Device {
        name: "left drive".to_string(),
        kind: HardwareKind::DcMotor,
    }]);
    let source = program(
        r#"<block type="dcMotor_setProperty_Number" id="p">
             <field name="IDENTIFIER">leftdriveAsDcMotor</field><field name="PROP">Power</field>
             <value name="VALUE"><block type="math_number" id="v"><field name="NUM">1</field></block></value>
             <next><block type="misc_callHardware_noReturn" id="h">
               <mutation methodLookupString="com.example.Lift.raise()" returnType="void" parameterCount="0"
                 fullClassName="com.example.Lift" simpleName="Lift"/>
               <field name="DEVICE_NAME">lift</field><field name="METHOD_NAME">raise</field>
             </block></next>
           </block>"#,
    );
    let first = render_java(&source, &hardware, &JavaOptions::default()).unwrap();
    let second = render_java(&source, &hardware, &JavaOptions::default()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("  private DcMotor leftdrive;\n  private Lift lift;\n"));
    assert!(first.contains("    leftdrive = hardwareMap.get(DcMotor.class, \"left drive\");\n    lift = hardwareMap.get(Lift.class, \"lift\");\n"));
    assert!(first.contains("    leftdrive.setPower(1);\n    lift.raise();\n"));
}

#[test]
fn disconnected_sockets_render_placeholders() {
    let source = program(
        r#"<block type="misc_callJava_noReturn" id="c">
             <mutation methodLookupString="com.example.Helpers.log(java.lang.String)" returnType="void"
               parameterCount="1" argType0="java.lang.String" fullClassName="com.example.Helpers" simpleName="Helpers"/>
             <field name="CLASS_NAME">Helpers</field><field name="METHOD_NAME">log</field>
             <next><block type="telemetry_speak" id="s"/></next>
           </block>"#,
    );
    let java = render_java(&source, &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(java.contains("    Helpers.log(null);\n    telemetry.speak(null, null, null);\n"));
}

#[test]
fn addition_inside_multiplication_is_parenthesised() {
    let source = program(
        r#"<block type="variables_set" id="s"><field name="VAR">y</field>
             <value name="VALUE"><block type="math_arithmetic" id="m"><field name="OP">MULTIPLY</field>
               <value name="A"><block type="math_arithmetic" id="a"><field name="OP">ADD</field>
                 <value name="A"><block type="variables_get" id="g1"><field name="VAR">a</field></block></value>
                 <value name="B"><block type="variables_get" id="g2"><field name="VAR">b</field></block></value>
               </block></value>
               <value name="B"><block type="variables_get" id="g3"><field name="VAR">c</field></block></value>
             </block></value>
           </block>"#,
    );
    let js = render_javascript(&source, &HardwareConfig::default()).unwrap();
    assert!(js.starts_with("var y;\nvar a;\nvar b;\nvar c;\n\n"));
    assert!(js.contains("  y = (a + b) * c;\n"));
}

fn get(id: &str, var: &str) -> String {
    format!(r#"<block type="variables_get" id="{}"><field name="VAR">{}</field></block>"#, id, var)
}

fn assign(id: &str, var: &str, value: &str, next: &str) -> String {
    format!(
        r#"<block type="variables_set" id="{}"><field name="VAR">{}</field><value name="VALUE">{}</value>{}</block>"#,
        id,
        var,
        value,
        if next.is_empty() { String::new() } else { format!("<next>{}</next>", next) }
    )
}

fn binary(kind: &str, id: &str, op: &str, a: &str, b: &str) -> String {
    format!(
        r#"<block type="{}" id="{}"><field name="OP">{}</field><value name="A">{}</value><value name="B">{}</value></block>"#,
        kind, id, op, a, b
    )
}

#[test]
fn nested_operators_get_minimal_parentheses() {
    let or = binary("logic_operation", "or", "OR", &get("g2", "b"), &get("g3", "c"));
    let r1 = binary("logic_operation", "and1", "AND", &get("g1", "a"), &or);
    let and = binary("logic_operation", "and2", "AND", &get("g4", "a"), &get("g5", "b"));
    let r2 = format!(r#"<block type="logic_negate" id="not"><value name="BOOL">{}</value></block>"#, and);
    let sum = binary("math_arithmetic", "sum1", "ADD", &get("g6", "x"), &get("g7", "y"));
    let r3 = format!(
        r#"<block type="math_single" id="neg"><field name="OP">NEG</field><value name="NUM">{}</value></block>"#,
        sum
    );
    let ternary = format!(
        r#"<block type="logic_ternary" id="pick"><value name="IF">{}</value><value name="THEN">{}</value><value name="ELSE">{}</value></block>"#,
        get("g8", "p"),
        get("g9", "x"),
        get("g10", "y")
    );
    let sum = binary("math_arithmetic", "sum2", "ADD", &get("g11", "x"), &get("g12", "y"));
    let r4 = binary("logic_compare", "lt1", "LT", &ternary, &sum);
    let less = binary("logic_compare", "lt2", "LT", &get("g13", "x"), &get("g14", "y"));
    let r5 = binary("logic_compare", "eq", "EQ", &less, &get("g15", "q"));

    let chain = assign(
        "s1",
        "r1",
        &r1,
        &assign(
            "s2",
            "r2",
            &r2,
            &assign("s3", "r3", &r3, &assign("s4", "r4", &r4, &assign("s5", "r5", &r5, ""))),
        ),
    );
    let source = program(&chain);
    let expected = [
        "r1 = a && (b || c);\n",
        "r2 = !(a && b);\n",
        "r3 = -(x + y);\n",
        "r4 = (p ? x : y) < x + y;\n",
        "r5 = x < y == q;\n",
    ];

    let js = render_javascript(&source, &HardwareConfig::default()).unwrap();
    let java = render_java(&source, &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    for line in expected {
        assert!(js.contains(&format!("\n  {}", line)), "script is missing {:?}:\n{}", line, js);
        assert!(java.contains(&format!("\n    {}", line)), "class is missing {:?}:\n{}", line, java);
    }
}

#[test]
fn literals_past_int_range_stay_valid_java() {
    let number = |id: &str, value: &str| {
        format!(r#"<block type="math_number" id="{}"><field name="NUM">{}</field></block>"#, id, value)
    };
    let source = program(&format!(
        r#"<block type="telemetry_addNumericData_Number" id="t">
             <value name="KEY"><block type="text" id="k"><field name="TEXT">x</field></block></value>
             <value name="NUMBER">{}</value>
             <next>{}</next>
           </block>"#,
        number("n1", "3000000000"),
        assign(
            "s",
            "v",
            &number("n2", "5000000000"),
            &format!(
                r#"<block type="linearOpMode_sleep_Number" id="z">
                     <value name="MILLISECONDS">{}</value>
                     <next><block type="dcMotor_setProperty_Number" id="p">
                       <field name="IDENTIFIER">armAsDcMotor</field><field name="PROP">TargetPosition</field>
                       <value name="VALUE">{}</value>
                     </block></next>
                   </block>"#,
                number("n3", "1e16"),
                number("n4", "3000000000")
            ),
        )
    ));

    let java = render_java(&source, &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(java.contains("  private double v;\n"));
    assert!(java.contains("    telemetry.addData(\"x\", 3000000000.0);\n"));
    assert!(java.contains("    v = 5000000000.0;\n"));
    assert!(java.contains("    sleep(10000000000000000L);\n"));
    assert!(java.contains("    arm.setTargetPosition((int) 3000000000.0);\n"));

    let js = render_javascript(&source, &HardwareConfig::default()).unwrap();
    assert!(js.contains("  telemetry.addNumericData('x', 3000000000);\n"));
    assert!(js.contains("  v = 5000000000;\n"));
}

#[test]
fn division_of_integers_agrees_across_targets() {
    let source = program(&format!(
        r#"<block type="telemetry_addNumericData_Number" id="t">
             <value name="KEY"><block type="text" id="k"><field name="TEXT">x</field></block></value>
             <value name="NUMBER">{}</value>
           </block>"#,
        binary(
            "math_arithmetic",
            "q",
            "DIVIDE",
            r#"<block type="math_number" id="a"><field name="NUM">1</field></block>"#,
            r#"<block type="math_number" id="b"><field name="NUM">2</field></block>"#,
        )
    ));
    let js = render_javascript(&source, &HardwareConfig::default()).unwrap();
    assert!(js.contains("  telemetry.addNumericData('x', 1 / 2);\n"));
    let java = render_java(&source, &HardwareConfig::default(), &JavaOptions::default()).unwrap();
    assert!(java.contains("    telemetry.addData(\"x\", (double) 1 / 2);\n"));
}

#[test]
fn unknown_block_types_are_fatal() {
    let err = render_javascript(
        &program(r#"<block type="vuforia_activate" id="v"/>"#),
        &HardwareConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown block type 'vuforia_activate'"));
}

#[test]
fn cli_writes_java_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Teleop Drive.blk");
    let output = dir.path().join("out.java");
    let hardware = dir.path().join("robot.json");
    fs::write(&input, program(TELEMETRY)).unwrap();
    fs::write(&hardware, r#"{"devices":[{"name":"arm","kind":"DcMotor"}]}"#).unwrap();

    let args = cli::Args::parse_from([
        "blkgen".as_ref(),
        input.as_os_str(),
        output.as_os_str(),
        "--target".as_ref(),
        "java".as_ref(),
        "--hardware".as_ref(),
        hardware.as_os_str(),
    ]);
    run_cli(&args).unwrap();

    let java = fs::read_to_string(&output).unwrap();
    assert!(java.starts_with("package org.firstinspires.ftc.teamcode;\n"));
    assert!(java.contains("@TeleOp(name = \"TeleopDrive\")\n"));
    assert!(java.contains("public class TeleopDrive extends LinearOpMode {\n"));
}

#[test]
fn cli_reports_missing_input() {
    let args = cli::Args::parse_from(["blkgen", "/definitely/not/here.blk"]);
    let err = run_cli(&args).unwrap_err();
    assert!(err.to_string().contains("Input file not found"));
}
