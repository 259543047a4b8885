use crate::ast::{Block, BlockGraph, BlockId};
use crate::blk::BlkFile;
use crate::context::{DeclarationKey, GenerationContext, Namespace};
use crate::hardware::{HardwareConfig, HardwareKind, ResolvedDevice};
use crate::mutation::{CallAttributes, Mutation};
use crate::order::{wrap, BinaryOperator, Order};
use crate::registry::{self, BlockKind};
use crate::types::{known_type_to_class_name, Check, JavaNumeric};
use crate::{java, javascript};
use anyhow::{anyhow, bail, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const INDENT: &str = "  ";
pub const DEFAULT_PACKAGE: &str = "org.firstinspires.ftc.teamcode";
pub const DEFAULT_CLASS_NAME: &str = "BlocksOpMode";
/// 2^63; integral doubles below it convert to `long` exactly.
const LONG_LIMIT: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    JavaScript,
    Java,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaOptions {
    pub class_name: String,
    pub package: String,
}

impl Default for JavaOptions {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_CLASS_NAME.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

pub fn generate(
    file: &BlkFile,
    mode: Mode,
    hardware: &HardwareConfig,
    options: &JavaOptions,
) -> Result<String> {
    debug!(?mode, blocks = file.graph.len(), "generating source");
    let mut generator = Generator::new(&file.graph, mode, hardware, options);
    match mode {
        Mode::JavaScript => javascript::program(&mut generator),
        Mode::Java => {
            generator.infer_java_types()?;
            java::program(&mut generator, &file.meta)
        }
    }
}

pub struct Generator<'a> {
    pub graph: &'a BlockGraph,
    pub hardware: &'a HardwareConfig,
    pub options: &'a JavaOptions,
    pub mode: Mode,
    pub ctx: GenerationContext,
    variable_types: HashMap<String, String>,
    procedure_returns: HashMap<String, String>,
    procedure_params: HashMap<String, Vec<String>>,
}

impl<'a> Generator<'a> {
    pub fn new(
        graph: &'a BlockGraph,
        mode: Mode,
        hardware: &'a HardwareConfig,
        options: &'a JavaOptions,
    ) -> Self {
        let own_package = match mode {
            Mode::Java => Some(options.package.as_str()),
            Mode::JavaScript => None,
        };
        let mut generator = Self {
            graph,
            hardware,
            options,
            mode,
            ctx: GenerationContext::new(own_package),
            variable_types: HashMap::new(),
            procedure_returns: HashMap::new(),
            procedure_params: HashMap::new(),
        };

        // Configured devices claim their names first, in configuration order.
        if mode == Mode::Java {
            for device in hardware.devices() {
                generator
                    .ctx
                    .identifier_for(Namespace::Device(device.kind.class_name().to_string()), &device.name);
            }
        }
        for variable in graph.variables() {
            generator.variable_identifier(variable);
        }
        let mut definitions: Vec<&Block> = graph
            .blocks()
            .filter(|b| matches!(b.kind, BlockKind::ProcedureDef { .. }))
            .collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        for definition in definitions {
            if let Ok(name) = procedure_name(definition) {
                generator
                    .procedure_params
                    .entry(name)
                    .or_insert_with(|| procedure_args(definition).to_vec());
            }
        }
        generator
    }

    pub fn variable_identifier(&mut self, name: &str) -> String {
        self.ctx.identifier_for(Namespace::Variable, name)
    }

    pub fn procedure_identifier(&mut self, name: &str) -> String {
        if name == "runOpMode" {
            return name.to_string();
        }
        self.ctx.identifier_for(Namespace::Procedure, name)
    }

    pub fn variable_type(&self, name: &str) -> &str {
        self.variable_types
            .get(name)
            .map(String::as_str)
            .unwrap_or("Object")
    }

    pub fn procedure_return_type(&self, name: &str) -> &str {
        self.procedure_returns
            .get(name)
            .map(String::as_str)
            .unwrap_or("Object")
    }

    pub fn chain_to_code(&mut self, start: &BlockId) -> Result<String> {
        let graph = self.graph;
        let mut code = String::new();
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                bail!("Statement chain loops back to block '{}'.", id);
            }
            let block = graph.block(id)?;
            if block.disabled {
                debug!(block = %block.id, "skipping disabled block");
            } else {
                if let Some(comment) = statement_comment(block) {
                    code.push_str(&line_comment(comment));
                }
                code.push_str(&self.render_statement(block)?);
            }
            current = block.next.as_ref();
        }
        Ok(code)
    }

    pub fn statement_to_code(&mut self, block: &Block, slot: &str) -> Result<String> {
        match block.statements.get(slot) {
            Some(first) => Ok(indent(&self.chain_to_code(first)?)),
            None => Ok(String::new()),
        }
    }

    fn render_statement(&mut self, block: &Block) -> Result<String> {
        if !block.shape.is_statement() {
            bail!(
                "Value block '{}' ({}) is used as a statement.",
                block.id,
                block.type_name
            );
        }
        match self.mode {
            Mode::JavaScript => javascript::statement(self, block),
            Mode::Java => java::statement(self, block),
        }
    }

    pub fn core_statement(&mut self, block: &Block) -> Result<String> {
        Ok(match block.kind {
            BlockKind::VariablesSet => {
                let name = self.variable_identifier(block.required_field("VAR")?);
                let value = self.value_to_code(block, "VALUE", Order::Assignment)?;
                format!("{} = {};\n", name, value)
            }
            BlockKind::ControlsIf => self.if_statement(block)?,
            BlockKind::ControlsWhileUntil => {
                let condition = match block.field("MODE").unwrap_or("WHILE") {
                    "WHILE" => self.value_to_code(block, "BOOL", Order::None)?,
                    "UNTIL" => format!("!{}", self.value_to_code(block, "BOOL", Order::Unary)?),
                    other => return Err(registry::unexpected(block, "MODE", other)),
                };
                let body = self.statement_to_code(block, "DO")?;
                format!("while ({}) {{\n{}}}\n", condition, body)
            }
            BlockKind::ControlsRepeatExt => {
                let times = self.value_to_code(block, "TIMES", Order::Relational.tighter())?;
                let counter = self.ctx.distinct_name("count");
                let keyword = match self.mode {
                    Mode::JavaScript => "var",
                    Mode::Java => "int",
                };
                let body = self.statement_to_code(block, "DO")?;
                format!(
                    "for ({} {c} = 0; {c} < {}; {c}++) {{\n{}}}\n",
                    keyword,
                    times,
                    body,
                    c = counter
                )
            }
            BlockKind::ControlsFlowStatements => match block.required_field("FLOW")? {
                "BREAK" => "break;\n".to_string(),
                "CONTINUE" => "continue;\n".to_string(),
                other => return Err(registry::unexpected(block, "FLOW", other)),
            },
            BlockKind::ProcedureCall { returns: false } => {
                format!("{};\n", self.procedure_call(block)?)
            }
            _ => bail!(
                "Block '{}' ({}) has no statement rendering.",
                block.id,
                block.type_name
            ),
        })
    }

    fn if_statement(&mut self, block: &Block) -> Result<String> {
        let mut code = String::new();
        let mut branch = 0;
        while block.shape.socket(&format!("IF{}", branch)).is_some() {
            let condition = self.value_to_code(block, &format!("IF{}", branch), Order::None)?;
            let body = self.statement_to_code(block, &format!("DO{}", branch))?;
            let keyword = if branch == 0 { "if" } else { "} else if" };
            code.push_str(&format!("{} ({}) {{\n{}", keyword, condition, body));
            branch += 1;
        }
        if block.shape.statements.iter().any(|s| s == "ELSE") {
            code.push_str("} else {\n");
            code.push_str(&self.statement_to_code(block, "ELSE")?);
        }
        code.push_str("}\n");
        Ok(code)
    }

    pub fn procedure_call(&mut self, block: &Block) -> Result<String> {
        let name = procedure_name(block)?;
        let identifier = self.procedure_identifier(&name);
        let count = procedure_args(block).len();
        let order = if count == 1 { Order::None } else { Order::Comma };
        let mut args = Vec::with_capacity(count);
        for index in 0..count {
            args.push(self.value_to_code(block, &format!("ARG{}", index), order)?);
        }
        Ok(format!("{}({})", identifier, args.join(", ")))
    }

    /// Missing or disabled children render a placeholder of the socket's type.
    pub fn value_to_code(&mut self, block: &Block, socket: &str, order: Order) -> Result<String> {
        let placeholder = self.placeholder(block, socket);
        self.value_to_code_or(block, socket, order, &placeholder)
    }

    pub fn value_to_code_or(
        &mut self,
        block: &Block,
        socket: &str,
        order: Order,
        fallback: &str,
    ) -> Result<String> {
        let graph = self.graph;
        let child = match block.values.get(socket) {
            Some(id) => graph.block(id)?,
            None => return Ok(fallback.to_string()),
        };
        if child.disabled {
            return Ok(fallback.to_string());
        }
        let Some(output) = child.shape.output_check() else {
            bail!(
                "Statement block '{}' ({}) is plugged into value socket '{}' of block '{}'.",
                child.id,
                child.type_name,
                socket,
                block.id
            );
        };
        if let Some(expected) = block.shape.socket(socket) {
            if !expected.check.accepts(output) {
                warn!(
                    block = %block.id,
                    socket,
                    expected = %expected.check,
                    found = %output,
                    "value type does not match socket"
                );
            }
        }
        let (code, inner) = self.render_value(child)?;
        let (code, inner) = match self.mode {
            Mode::Java => self.coerce(block, socket, child, code, inner)?,
            Mode::JavaScript => (code, inner),
        };
        Ok(wrap(code, inner, order))
    }

    pub fn render_value(&mut self, block: &Block) -> Result<(String, Order)> {
        match self.mode {
            Mode::JavaScript => javascript::value(self, block),
            Mode::Java => java::value(self, block),
        }
    }

    fn placeholder(&self, block: &Block, socket: &str) -> String {
        let label = match block.shape.socket(socket).map(|s| &s.check) {
            Some(Check::One(label)) => label.as_str(),
            _ => "",
        };
        match (label, self.mode) {
            ("Boolean", _) => "false".to_string(),
            ("Number", _) => "0".to_string(),
            ("String", _) => self.quote(""),
            ("Array", Mode::JavaScript) => "[]".to_string(),
            _ => "null".to_string(),
        }
    }

    pub fn core_value(&mut self, block: &Block) -> Result<(String, Order)> {
        Ok(match block.kind {
            BlockKind::MathNumber => self.number_literal(block)?,
            BlockKind::MathArithmetic => self.arithmetic(block)?,
            BlockKind::MathSingle => self.math_single(block)?,
            BlockKind::LogicBoolean => match block.required_field("BOOL")? {
                "TRUE" => ("true".to_string(), Order::Atomic),
                "FALSE" => ("false".to_string(), Order::Atomic),
                other => return Err(registry::unexpected(block, "BOOL", other)),
            },
            BlockKind::LogicCompare => {
                let operator = match block.required_field("OP")? {
                    "EQ" => BinaryOperator::new("==", Order::Equality),
                    "NEQ" => BinaryOperator::new("!=", Order::Equality),
                    "LT" => BinaryOperator::non_chaining("<", Order::Relational),
                    "LTE" => BinaryOperator::non_chaining("<=", Order::Relational),
                    "GT" => BinaryOperator::non_chaining(">", Order::Relational),
                    "GTE" => BinaryOperator::non_chaining(">=", Order::Relational),
                    other => return Err(registry::unexpected(block, "OP", other)),
                };
                self.binary(block, operator)?
            }
            BlockKind::LogicOperation => {
                let operator = match block.required_field("OP")? {
                    "AND" => BinaryOperator::new("&&", Order::LogicalAnd),
                    "OR" => BinaryOperator::new("||", Order::LogicalOr),
                    other => return Err(registry::unexpected(block, "OP", other)),
                };
                self.binary(block, operator)?
            }
            BlockKind::LogicNegate => {
                let operand = self.value_to_code(block, "BOOL", Order::Unary)?;
                (format!("!{}", operand), Order::Unary)
            }
            BlockKind::LogicNull => ("null".to_string(), Order::Atomic),
            BlockKind::LogicTernary => {
                let test = self.value_to_code(block, "IF", Order::Conditional.tighter())?;
                let then = self.value_to_code(block, "THEN", Order::Conditional)?;
                let otherwise = self.value_to_code(block, "ELSE", Order::Conditional)?;
                (
                    format!("{} ? {} : {}", test, then, otherwise),
                    Order::Conditional,
                )
            }
            BlockKind::Text => (self.quote(block.field("TEXT").unwrap_or("")), Order::Atomic),
            BlockKind::TextJoin => self.text_join(block)?,
            BlockKind::ListsCreateWith => {
                let items = self.items(block, Order::Comma)?;
                match self.mode {
                    Mode::JavaScript => (format!("[{}]", items.join(", ")), Order::Atomic),
                    Mode::Java => {
                        self.ctx.import_known("JavaUtil")?;
                        (
                            format!("JavaUtil.createListWith({})", items.join(", ")),
                            Order::Postfix,
                        )
                    }
                }
            }
            BlockKind::VariablesGet => {
                let name = self.variable_identifier(block.required_field("VAR")?);
                (name, Order::Atomic)
            }
            BlockKind::ProcedureCall { returns: true } => {
                (self.procedure_call(block)?, Order::Postfix)
            }
            _ => bail!(
                "Block '{}' ({}) has no value rendering.",
                block.id,
                block.type_name
            ),
        })
    }

    fn binary(&mut self, block: &Block, operator: BinaryOperator) -> Result<(String, Order)> {
        let left = self.value_to_code(block, "A", operator.left_context())?;
        let right = self.value_to_code(block, "B", operator.right_context())?;
        Ok((
            format!("{} {} {}", left, operator.symbol, right),
            operator.order,
        ))
    }

    fn number_literal(&self, block: &Block) -> Result<(String, Order)> {
        let value = literal_value(block)?;
        let code = if value.is_nan() {
            match self.mode {
                Mode::JavaScript => "NaN".to_string(),
                Mode::Java => "Double.NaN".to_string(),
            }
        } else if value.is_infinite() {
            let sign = if value < 0.0 { "-" } else { "" };
            match self.mode {
                Mode::JavaScript => format!("{}Infinity", sign),
                Mode::Java if value < 0.0 => "Double.NEGATIVE_INFINITY".to_string(),
                Mode::Java => "Double.POSITIVE_INFINITY".to_string(),
            }
        } else if self.mode == Mode::Java {
            java_number(value)
        } else {
            format_number(value)
        };
        let order = if code.starts_with('-') {
            Order::Unary
        } else {
            Order::Atomic
        };
        Ok((code, order))
    }

    fn arithmetic(&mut self, block: &Block) -> Result<(String, Order)> {
        let operator = match block.required_field("OP")? {
            "ADD" => BinaryOperator::new("+", Order::Additive),
            "MINUS" => BinaryOperator::new("-", Order::Additive),
            "MULTIPLY" => BinaryOperator::new("*", Order::Multiplicative),
            "DIVIDE" if self.mode == Mode::Java && self.integral_operands(block)? => {
                let dividend = self.value_to_code(block, "A", Order::Unary)?;
                let divisor = self.value_to_code(block, "B", Order::Multiplicative.tighter())?;
                return Ok((
                    format!("(double) {} / {}", dividend, divisor),
                    Order::Multiplicative,
                ));
            }
            "DIVIDE" => BinaryOperator::new("/", Order::Multiplicative),
            "POWER" => {
                let base = self.value_to_code(block, "A", Order::Comma)?;
                let exponent = self.value_to_code(block, "B", Order::Comma)?;
                return Ok((format!("Math.pow({}, {})", base, exponent), Order::Postfix));
            }
            other => return Err(registry::unexpected(block, "OP", other)),
        };
        self.binary(block, operator)
    }

    fn integral_operands(&self, block: &Block) -> Result<bool> {
        for socket in ["A", "B"] {
            let operand = self
                .child_java_type(block, socket)?
                .and_then(|t| JavaNumeric::from_label(&t));
            if !operand.is_some_and(JavaNumeric::is_integral) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn math_single(&mut self, block: &Block) -> Result<(String, Order)> {
        let op = block.required_field("OP")?;
        if op == "NEG" {
            let operand = self.value_to_code(block, "NUM", Order::Unary)?;
            let operand = if operand.starts_with('-') {
                format!("({})", operand)
            } else {
                operand
            };
            return Ok((format!("-{}", operand), Order::Unary));
        }
        if op == "POW10" {
            let exponent = self.value_to_code(block, "NUM", Order::Comma)?;
            return Ok((format!("Math.pow(10, {})", exponent), Order::Postfix));
        }
        if op == "LOG10" && self.mode == Mode::JavaScript {
            let operand = self.value_to_code(block, "NUM", Order::None)?;
            return Ok((
                format!("Math.log({}) / Math.log(10)", operand),
                Order::Multiplicative,
            ));
        }
        let function = match op {
            "ROOT" => "Math.sqrt",
            "ABS" => "Math.abs",
            "LN" => "Math.log",
            "LOG10" => "Math.log10",
            "EXP" => "Math.exp",
            other => return Err(registry::unexpected(block, "OP", other)),
        };
        let operand = self.value_to_code(block, "NUM", Order::None)?;
        Ok((format!("{}({})", function, operand), Order::Postfix))
    }

    fn text_join(&mut self, block: &Block) -> Result<(String, Order)> {
        let count = item_count(block);
        match (self.mode, count) {
            (_, 0) => Ok((self.quote(""), Order::Atomic)),
            (Mode::JavaScript, 1) => {
                let item = self.value_to_code(block, "ADD0", Order::None)?;
                Ok((format!("String({})", item), Order::Postfix))
            }
            (Mode::JavaScript, 2) => {
                let first = self.value_to_code(block, "ADD0", Order::None)?;
                let second = self.value_to_code(block, "ADD1", Order::None)?;
                Ok((
                    format!("String({}) + String({})", first, second),
                    Order::Additive,
                ))
            }
            (Mode::JavaScript, _) => {
                let items = self.items(block, Order::Comma)?;
                Ok((format!("[{}].join('')", items.join(", ")), Order::Postfix))
            }
            (Mode::Java, 1) => {
                let item = self.value_to_code(block, "ADD0", Order::None)?;
                Ok((format!("String.valueOf({})", item), Order::Postfix))
            }
            (Mode::Java, _) => {
                let items = self.items(block, Order::Multiplicative)?;
                let first_is_text = block
                    .values
                    .get("ADD0")
                    .and_then(|id| self.graph.get(id))
                    .is_some_and(|b| b.kind == BlockKind::Text && !b.disabled);
                let joined = items.join(" + ");
                if first_is_text {
                    Ok((joined, Order::Additive))
                } else {
                    Ok((format!("\"\" + {}", joined), Order::Additive))
                }
            }
        }
    }

    fn items(&mut self, block: &Block, order: Order) -> Result<Vec<String>> {
        let count = item_count(block);
        let mut items = Vec::with_capacity(count);
        for index in 0..count {
            items.push(self.value_to_code(block, &format!("ADD{}", index), order)?);
        }
        Ok(items)
    }

    pub fn quote(&self, text: &str) -> String {
        match self.mode {
            Mode::JavaScript => quote_with(text, '\''),
            Mode::Java => quote_with(text, '"'),
        }
    }

    fn coerce(
        &self,
        block: &Block,
        socket: &str,
        child: &Block,
        code: String,
        inner: Order,
    ) -> Result<(String, Order)> {
        let Some(target) = self
            .socket_java_type(block, socket)?
            .and_then(|t| JavaNumeric::from_label(&t))
        else {
            return Ok((code, inner));
        };
        if child.kind == BlockKind::MathNumber {
            let value = literal_value(child)?;
            if !value.is_finite() || (fits_int(value) && target >= JavaNumeric::Int) {
                return Ok((code, inner));
            }
            return Ok(match target {
                JavaNumeric::Double => (code, inner),
                JavaNumeric::Float if value.abs() <= f64::from(f32::MAX) => (format!("{}F", code), inner),
                JavaNumeric::Long if value.fract() == 0.0 && value.abs() < LONG_LIMIT => {
                    (format!("{}L", value as i64), inner)
                }
                _ => (
                    format!("({}) {}", target.as_str(), wrap(code, inner, Order::Unary)),
                    Order::Unary,
                ),
            });
        }
        let source = self
            .java_type_of(child)?
            .and_then(|t| JavaNumeric::from_label(&t));
        match source {
            Some(source) if source > target => Ok((
                format!("({}) {}", target.as_str(), wrap(code, inner, Order::Unary)),
                Order::Unary,
            )),
            _ => Ok((code, inner)),
        }
    }

    pub fn socket_java_type(&self, block: &Block, socket: &str) -> Result<Option<String>> {
        match block.kind {
            BlockKind::VariablesSet if socket == "VALUE" => {
                let name = block.required_field("VAR")?;
                Ok(Some(self.variable_type(name).to_string()))
            }
            BlockKind::ProcedureCall { .. } => {
                let name = procedure_name(block)?;
                let param = socket
                    .strip_prefix("ARG")
                    .and_then(|i| i.parse::<usize>().ok())
                    .and_then(|i| self.procedure_params.get(&name)?.get(i).cloned());
                Ok(param.map(|p| self.variable_type(&p).to_string()))
            }
            _ => registry::java_input_type(block, socket),
        }
    }

    pub fn java_type_of(&self, block: &Block) -> Result<Option<String>> {
        match block.kind {
            BlockKind::MathNumber => {
                let value = literal_value(block)?;
                let label = if fits_int(value) { "int" } else { "double" };
                return Ok(Some(label.to_string()));
            }
            BlockKind::MathArithmetic => {
                if matches!(block.field("OP"), Some("POWER" | "DIVIDE")) {
                    return Ok(Some("double".to_string()));
                }
                let mut widest: Option<JavaNumeric> = None;
                for socket in ["A", "B"] {
                    let operand = self
                        .child_java_type(block, socket)?
                        .and_then(|t| JavaNumeric::from_label(&t));
                    widest = widest.max(operand);
                }
                let label = widest.map(JavaNumeric::as_str).unwrap_or("double");
                return Ok(Some(label.to_string()));
            }
            BlockKind::MathSingle => {
                if block.field("OP") == Some("NEG") || block.field("OP") == Some("ABS") {
                    if let Some(operand) = self.child_java_type(block, "NUM")? {
                        return Ok(Some(operand));
                    }
                }
                return Ok(Some("double".to_string()));
            }
            BlockKind::VariablesGet => {
                let name = block.required_field("VAR")?;
                return Ok(self.variable_types.get(name).cloned());
            }
            BlockKind::ProcedureCall { returns: true } => {
                let name = procedure_name(block)?;
                return Ok(self.procedure_returns.get(&name).cloned());
            }
            BlockKind::LogicTernary => {
                let then = self.child_java_type(block, "THEN")?;
                let otherwise = self.child_java_type(block, "ELSE")?;
                return Ok(match (then, otherwise) {
                    (Some(a), Some(b)) => Some(merge_types(&a, &b)),
                    (one, other) => one.or(other),
                });
            }
            _ => {}
        }
        if let Some(declared) = registry::output_java_type(block)? {
            return Ok(Some(declared));
        }
        if let Some(attributes) = call_attributes(block) {
            return Ok(attributes.resolved_return().map(|r| r.label));
        }
        Ok(match block.shape.output_check() {
            Some(Check::One(label)) if label == "Number" => Some("double".to_string()),
            Some(Check::One(label)) if label == "Boolean" => Some("boolean".to_string()),
            Some(Check::One(label)) if label == "String" => Some("String".to_string()),
            _ => None,
        })
    }

    fn child_java_type(&self, block: &Block, socket: &str) -> Result<Option<String>> {
        match block.values.get(socket) {
            Some(id) => {
                let child = self.graph.block(id)?;
                if child.disabled {
                    Ok(None)
                } else {
                    self.java_type_of(child)
                }
            }
            None => Ok(None),
        }
    }

    /// Numeric types widen; anything else that disagrees becomes `Object`.
    pub fn infer_java_types(&mut self) -> Result<()> {
        let graph = self.graph;
        let mut blocks: Vec<&Block> = graph.blocks().filter(|b| !b.disabled).collect();
        blocks.sort_by(|a, b| a.id.cmp(&b.id));

        for block in &blocks {
            match block.kind {
                BlockKind::VariablesSet => {
                    let name = block.required_field("VAR")?;
                    let assigned = self.child_java_type(block, "VALUE")?;
                    self.merge_variable(name, assigned);
                }
                BlockKind::ProcedureCall { .. } => {
                    let name = procedure_name(block)?;
                    let params = self.procedure_params.get(&name).cloned().unwrap_or_default();
                    for (index, param) in params.iter().enumerate() {
                        let passed = self.child_java_type(block, &format!("ARG{}", index))?;
                        self.merge_variable(param, passed);
                    }
                }
                _ => {}
            }
        }
        for variable in graph.variables() {
            self.variable_types
                .entry(variable.clone())
                .or_insert_with(|| "Object".to_string());
        }
        for block in &blocks {
            if block.kind == (BlockKind::ProcedureDef { returns: true }) {
                let name = procedure_name(block)?;
                let returned = self
                    .child_java_type(block, "RETURN")?
                    .unwrap_or_else(|| "Object".to_string());
                self.procedure_returns.insert(name, returned);
            }
        }
        debug!(variables = self.variable_types.len(), "inferred variable types");
        Ok(())
    }

    fn merge_variable(&mut self, name: &str, assigned: Option<String>) {
        let Some(assigned) = assigned else {
            return;
        };
        let merged = match self.variable_types.get(name) {
            Some(existing) => merge_types(existing, &assigned),
            None => assigned,
        };
        self.variable_types.insert(name.to_string(), merged);
    }

    pub fn resolve_device(&self, block: &Block, kind: HardwareKind) -> Result<ResolvedDevice> {
        let identifier = block.required_field("IDENTIFIER")?;
        let device = self.hardware.resolve_identifier(identifier, kind);
        if !device.configured {
            warn!(
                block = %block.id,
                device = %device.name,
                kind = kind.class_name(),
                "device is not in the hardware configuration"
            );
        }
        Ok(device)
    }

    pub fn declare_device(&mut self, simple_name: &str, class_name: &str, device_name: &str) -> String {
        let identifier = self
            .ctx
            .identifier_for(Namespace::Device(simple_name.to_string()), device_name);
        self.ctx.import_class_type(class_name);
        self.ctx.register_declaration(
            DeclarationKey::Field(identifier.clone()),
            format!("private {} {};", simple_name, identifier),
        );
        self.ctx.register_declaration(
            DeclarationKey::Assignment(identifier.clone()),
            format!(
                "{} = hardwareMap.get({}.class, {});",
                identifier,
                simple_name,
                quote_with(device_name, '"')
            ),
        );
        identifier
    }

    pub fn declare_hardware_device(&mut self, device: &ResolvedDevice) -> Result<String> {
        let simple_name = device.kind.class_name();
        let class_name = known_type_to_class_name(simple_name)
            .ok_or_else(|| anyhow!("No known class for device kind '{}'.", simple_name))?;
        Ok(self.declare_device(simple_name, &class_name, &device.name))
    }
}

pub fn procedure_name(block: &Block) -> Result<String> {
    if let Some(Mutation::Procedure { name, .. }) = &block.mutation {
        if !name.is_empty() {
            return Ok(name.clone());
        }
    }
    Ok(block.required_field("NAME")?.to_string())
}

pub fn procedure_args(block: &Block) -> &[String] {
    match &block.mutation {
        Some(Mutation::Procedure { args, .. }) => args,
        _ => &[],
    }
}

pub fn call_attributes(block: &Block) -> Option<&CallAttributes> {
    match &block.mutation {
        Some(Mutation::Call(attributes)) => Some(attributes),
        _ => None,
    }
}

pub fn required_call_attributes(block: &Block) -> Result<&CallAttributes> {
    call_attributes(block).ok_or_else(|| {
        anyhow!(
            "Block '{}' ({}) has no call mutation.",
            block.id,
            block.type_name
        )
    })
}

fn statement_comment(block: &Block) -> Option<&str> {
    if matches!(block.kind, BlockKind::Comment | BlockKind::ProcedureDef { .. }) {
        return None;
    }
    let comment = block
        .comment
        .as_deref()
        .or_else(|| call_attributes(block).map(|a| a.comment.as_str()))?;
    (!comment.trim().is_empty()).then_some(comment)
}

fn item_count(block: &Block) -> usize {
    match &block.mutation {
        Some(Mutation::Items(count)) => *count,
        _ => 0,
    }
}

fn literal_value(block: &Block) -> Result<f64> {
    let text = block.required_field("NUM")?;
    text.trim().parse::<f64>().map_err(|_| {
        anyhow!(
            "Block '{}' ({}) has malformed number '{}'.",
            block.id,
            block.type_name,
            text
        )
    })
}

fn fits_int(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() <= f64::from(i32::MAX)
}

pub fn merge_types(a: &str, b: &str) -> String {
    if a == b {
        return a.to_string();
    }
    match (JavaNumeric::from_label(a), JavaNumeric::from_label(b)) {
        (Some(x), Some(y)) => x.max(y).as_str().to_string(),
        _ => "Object".to_string(),
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:?}", value)
    }
}

/// Integral values past `int` range become `double` literals.
pub fn java_number(value: f64) -> String {
    let code = format_number(value);
    if !fits_int(value) && value.fract() == 0.0 && !code.contains(['.', 'e']) {
        format!("{}.0", code)
    } else {
        code
    }
}

pub fn quote_with(text: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(quote);
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}

pub fn indent(code: &str) -> String {
    code.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("{}{}\n", INDENT, line)
            }
        })
        .collect()
}

pub fn line_comment(text: &str) -> String {
    text.lines().map(|line| format!("// {}\n", line)).collect()
}

pub fn doc_comment(text: &str) -> String {
    let mut doc = String::from("/**\n");
    for line in text.lines() {
        let line = line.replace("*/", "*&#47;");
        doc.push_str(&format!(" * {}\n", line).replace(" * \n", " *\n"));
    }
    doc.push_str(" */\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blk::parse_blk;
    use pretty_assertions::assert_eq;

    fn graph_of(blocks: &str) -> BlkFile {
        parse_blk(&format!("<xml>{}</xml>", blocks)).unwrap()
    }

    fn render(file: &BlkFile, mode: Mode, id: &str) -> String {
        let hardware = HardwareConfig::default();
        let options = JavaOptions::default();
        let mut generator = Generator::new(&file.graph, mode, &hardware, &options);
        if mode == Mode::Java {
            generator.infer_java_types().unwrap();
        }
        let block = file.graph.block(&BlockId::new(id)).unwrap();
        generator.render_value(block).unwrap().0
    }

    fn number(id: &str, value: &str) -> String {
        format!(
            r#"<block type="math_number" id="{}"><field name="NUM">{}</field></block>"#,
            id, value
        )
    }

    fn arithmetic(id: &str, op: &str, a: &str, b: &str) -> String {
        format!(
            r#"<block type="math_arithmetic" id="{}"><field name="OP">{}</field><value name="A">{}</value><value name="B">{}</value></block>"#,
            id, op, a, b
        )
    }

    #[test]
    fn looser_children_are_parenthesised() {
        let sum = arithmetic("sum", "ADD", &number("a", "1"), &number("b", "2"));
        let file = graph_of(&arithmetic("product", "MULTIPLY", &sum, &number("c", "3")));
        assert_eq!(render(&file, Mode::JavaScript, "product"), "(1 + 2) * 3");
        assert_eq!(render(&file, Mode::Java, "product"), "(1 + 2) * 3");
    }

    #[test]
    fn right_operand_of_same_order_is_parenthesised() {
        let difference = arithmetic("diff", "MINUS", &number("b", "2"), &number("c", "3"));
        let file = graph_of(&arithmetic("outer", "MINUS", &number("a", "1"), &difference));
        assert_eq!(render(&file, Mode::JavaScript, "outer"), "1 - (2 - 3)");

        let difference = arithmetic("diff", "MINUS", &number("a", "1"), &number("b", "2"));
        let file = graph_of(&arithmetic("outer", "MINUS", &difference, &number("c", "3")));
        assert_eq!(render(&file, Mode::JavaScript, "outer"), "1 - 2 - 3");
    }

    #[test]
    fn negation_never_touches_another_minus() {
        let file = graph_of(&format!(
            r#"<block type="math_single" id="neg"><field name="OP">NEG</field><value name="NUM">{}</value></block>"#,
            number("n", "-4")
        ));
        assert_eq!(render(&file, Mode::JavaScript, "neg"), "-(-4)");
    }

    #[test]
    fn missing_inputs_render_typed_placeholders() {
        let file = graph_of(
            r#"<block type="math_arithmetic" id="sum"><field name="OP">ADD</field></block>
               <block type="logic_negate" id="not" y="10"/>
               <block type="logic_ternary" id="pick" y="20"/>"#,
        );
        assert_eq!(render(&file, Mode::JavaScript, "sum"), "0 + 0");
        assert_eq!(render(&file, Mode::Java, "not"), "!false");
        assert_eq!(render(&file, Mode::Java, "pick"), "false ? null : null");
    }

    #[test]
    fn literals_follow_target_quoting() {
        let file = graph_of(r#"<block type="text" id="t"><field name="TEXT">it's "x"</field></block>"#);
        assert_eq!(render(&file, Mode::JavaScript, "t"), r#"'it\'s "x"'"#);
        assert_eq!(render(&file, Mode::Java, "t"), r#""it's \"x\"""#);
    }

    #[test]
    fn numbers_print_compactly() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(1e20), "1e20");
    }

    #[test]
    fn compiled_literals_past_int_range_are_doubles() {
        assert_eq!(java_number(7.0), "7");
        assert_eq!(java_number(3e9), "3000000000.0");
        assert_eq!(java_number(-3e9), "-3000000000.0");
        assert_eq!(java_number(1e16), "1e16");
        assert_eq!(java_number(2.5), "2.5");
    }

    #[test]
    fn integral_division_keeps_the_fraction() {
        let file = graph_of(&arithmetic("q", "DIVIDE", &number("a", "1"), &number("b", "2")));
        assert_eq!(render(&file, Mode::JavaScript, "q"), "1 / 2");
        assert_eq!(render(&file, Mode::Java, "q"), "(double) 1 / 2");

        let file = graph_of(&arithmetic("q", "DIVIDE", &number("a", "1.5"), &number("b", "2")));
        assert_eq!(render(&file, Mode::Java, "q"), "1.5 / 2");

        let sum = arithmetic("sum", "ADD", &number("a", "1"), &number("b", "2"));
        let file = graph_of(&arithmetic("q", "DIVIDE", &sum, &number("c", "4")));
        assert_eq!(render(&file, Mode::Java, "q"), "(double) (1 + 2) / 4");
    }

    #[test]
    fn numeric_types_widen_and_conflicts_fall_back_to_object() {
        assert_eq!(merge_types("int", "double"), "double");
        assert_eq!(merge_types("float", "long"), "float");
        assert_eq!(merge_types("String", "String"), "String");
        assert_eq!(merge_types("String", "int"), "Object");
    }

    #[test]
    fn variables_take_the_widest_assigned_type() {
        let file = graph_of(&format!(
            r#"<block type="variables_set" id="s1"><field name="VAR">speed</field><value name="VALUE">{}</value>
                 <next><block type="variables_set" id="s2"><field name="VAR">speed</field><value name="VALUE">{}</value>
                   <next><block type="variables_set" id="s3"><field name="VAR">name</field><value name="VALUE"><block type="text" id="t"><field name="TEXT">a</field></block></value></block></next>
                 </block></next>
               </block>
               <block type="variables_get" id="g" y="50"><field name="VAR">unused</field></block>"#,
            number("a", "1"),
            number("b", "0.5")
        ));
        let hardware = HardwareConfig::default();
        let options = JavaOptions::default();
        let mut generator = Generator::new(&file.graph, Mode::Java, &hardware, &options);
        generator.infer_java_types().unwrap();
        assert_eq!(generator.variable_type("speed"), "double");
        assert_eq!(generator.variable_type("name"), "String");
        assert_eq!(generator.variable_type("unused"), "Object");
    }

    #[test]
    fn statement_blocks_in_value_sockets_are_fatal() {
        let file = graph_of(
            r#"<block type="logic_negate" id="not"><value name="BOOL"><block type="telemetry_update" id="u"/></value></block>"#,
        );
        let hardware = HardwareConfig::default();
        let options = JavaOptions::default();
        let mut generator = Generator::new(&file.graph, Mode::JavaScript, &hardware, &options);
        let block = file.graph.block(&BlockId::new("not")).unwrap();
        let err = generator.render_value(block).unwrap_err();
        assert!(err.to_string().contains("plugged into value socket 'BOOL'"));
    }

    #[test]
    fn doc_comments_cannot_close_early() {
        assert_eq!(
            doc_comment("Drives */ forward\n\nfast"),
            "/**\n * Drives *&#47; forward\n *\n * fast\n */\n"
        );
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a;\n\nb;\n"), "  a;\n\n  b;\n");
    }
}
