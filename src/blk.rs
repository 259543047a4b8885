use crate::ast::{Block, BlockGraph, BlockId};
use crate::mutation::Mutation;
use crate::registry::BlockKind;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use xmltree::{Element, XMLNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    TeleOp,
    Autonomous,
}

/// OpMode registration data saved after the block XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpModeMeta {
    pub flavor: Flavor,
    pub group: String,
    pub auto_transition: String,
    pub enabled: bool,
}

impl Default for OpModeMeta {
    fn default() -> Self {
        Self {
            flavor: Flavor::TeleOp,
            group: String::new(),
            auto_transition: String::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlkFile {
    pub graph: BlockGraph,
    pub meta: OpModeMeta,
}

pub fn load_blk_file(path: &Path) -> Result<BlkFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'.", path.display()))?;
    parse_blk(&text).with_context(|| format!("Invalid blocks file '{}'.", path.display()))
}

pub fn parse_blk(text: &str) -> Result<BlkFile> {
    let (blocks_xml, extra_xml) = split_extra(text);
    let root = Element::parse(blocks_xml.as_bytes()).context("Malformed block XML.")?;
    if root.name != "xml" {
        bail!("Expected <xml> root element, found <{}>.", root.name);
    }
    let meta = match extra_xml {
        Some(extra) => parse_extra(extra)?,
        None => OpModeMeta::default(),
    };

    let mut loader = Loader::default();
    for child in elements(&root) {
        match child.name.as_str() {
            "block" | "shadow" => {
                loader.load_block(child)?;
            }
            "variables" => {
                for variable in elements(child).filter(|e| e.name == "variable") {
                    let name = text_of(variable);
                    if !name.is_empty() {
                        loader.graph.declare_variable(&name);
                    }
                }
            }
            other => debug!(element = other, "ignoring workspace element"),
        }
    }
    loader.graph.validate()?;
    debug!(blocks = loader.graph.len(), "loaded block graph");
    Ok(BlkFile {
        graph: loader.graph,
        meta,
    })
}

/// Splits the block XML from the trailing metadata document, if any.
fn split_extra(text: &str) -> (&str, Option<&str>) {
    const CLOSE: &str = "</xml>";
    match text.find(CLOSE) {
        Some(idx) => {
            let end = idx + CLOSE.len();
            let rest = text[end..].trim();
            (&text[..end], (!rest.is_empty()).then_some(rest))
        }
        None => (text, None),
    }
}

fn parse_extra(xml: &str) -> Result<OpModeMeta> {
    let root = Element::parse(xml.as_bytes()).context("Malformed OpMode metadata XML.")?;
    let mut meta = OpModeMeta::default();
    for child in elements(&root) {
        match child.name.as_str() {
            "OpModeMeta" => {
                if let Some(flavor) = child.attributes.get("flavor") {
                    meta.flavor = match flavor.as_str() {
                        "TELEOP" => Flavor::TeleOp,
                        "AUTONOMOUS" => Flavor::Autonomous,
                        other => bail!("Unknown OpMode flavor '{}'.", other),
                    };
                }
                if let Some(group) = child.attributes.get("group") {
                    meta.group = group.clone();
                }
                if let Some(transition) = child.attributes.get("autoTransition") {
                    meta.auto_transition = transition.clone();
                }
            }
            "Enabled" => {
                meta.enabled = child
                    .attributes
                    .get("value")
                    .map(|v| v != "false")
                    .unwrap_or(true);
            }
            _ => {}
        }
    }
    Ok(meta)
}

fn elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(|node| match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    })
}

fn text_of(element: &Element) -> String {
    element
        .get_text()
        .map(|t| t.into_owned())
        .unwrap_or_default()
}

fn coordinate(element: &Element, name: &str) -> i64 {
    element
        .attributes
        .get(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|v| v as i64)
        .unwrap_or(0)
}

/// The connected block of a `<value>`/`<statement>`/`<next>`; a real block wins over its shadow.
fn connected_block(holder: &Element) -> Option<&Element> {
    elements(holder)
        .find(|e| e.name == "block")
        .or_else(|| elements(holder).find(|e| e.name == "shadow"))
}

#[derive(Default)]
struct Loader {
    graph: BlockGraph,
    generated: usize,
}

impl Loader {
    fn load_block(&mut self, element: &Element) -> Result<BlockId> {
        let id = match element.attributes.get("id") {
            Some(id) if !id.is_empty() => BlockId::new(id.clone()),
            _ => {
                self.generated += 1;
                BlockId::new(format!("gen-{}", self.generated))
            }
        };
        let type_name = element
            .attributes
            .get("type")
            .ok_or_else(|| anyhow!("Block '{}' has no type.", id))?;
        let kind = BlockKind::from_type_name(type_name)
            .ok_or_else(|| anyhow!("Unknown block type '{}' (block '{}').", type_name, id))?;

        let mut block = Block::new(id.clone(), type_name, kind);
        block.x = coordinate(element, "x");
        block.y = coordinate(element, "y");
        block.disabled = element
            .attributes
            .get("disabled")
            .is_some_and(|v| v == "true");

        let mut mutation_element = None;
        let mut values = Vec::new();
        let mut statements = Vec::new();
        let mut next = None;
        for child in elements(element) {
            let name = child.attributes.get("name").cloned().unwrap_or_default();
            match child.name.as_str() {
                "field" => {
                    block.fields.insert(name, text_of(child));
                }
                "comment" => block.comment = Some(text_of(child)),
                "mutation" => mutation_element = Some(child),
                "value" => values.extend(connected_block(child).map(|b| (name, b))),
                "statement" => statements.extend(connected_block(child).map(|b| (name, b))),
                "next" => next = connected_block(child),
                other => debug!(block = %id, element = other, "ignoring block element"),
            }
        }

        if let Some(mutation) = mutation_element {
            if !kind.takes_mutation() {
                debug!(block = %id, "ignoring mutation on fixed-shape block");
            } else {
                let decoded = Mutation::decode(kind, mutation, &block.fields)
                    .with_context(|| format!("Bad mutation on block '{}' ({}).", id, type_name))?;
                block.mutation = Some(decoded);
            }
        } else if matches!(kind, BlockKind::CallJava { .. } | BlockKind::CallHardware { .. }) {
            bail!("Block '{}' ({}) is missing its <mutation>.", id, type_name);
        }
        block.apply_mutation();

        if matches!(kind, BlockKind::VariablesGet | BlockKind::VariablesSet) {
            let variable = block.required_field("VAR")?.to_string();
            self.graph.declare_variable(&variable);
        }
        self.graph.insert(block)?;

        for (socket, child) in values {
            let child_id = self.load_block(child)?;
            let known = self
                .graph
                .block(&id)?
                .shape
                .socket(&socket)
                .is_some();
            if !known {
                warn!(block = %id, socket = %socket, "value connected to a socket the block does not declare");
            }
            self.graph.connect_value(&id, &socket, &child_id)?;
        }
        for (slot, child) in statements {
            let child_id = self.load_block(child)?;
            self.graph.connect_statement(&id, &slot, &child_id)?;
        }
        if let Some(child) = next {
            let child_id = self.load_block(child)?;
            self.graph.connect_next(&id, &child_id)?;
        }
        Ok(id)
    }
}
