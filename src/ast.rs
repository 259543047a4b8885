use crate::mutation::Mutation;
use crate::registry::{self, BlockKind, Shape};
use anyhow::{anyhow, bail, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a block hangs off its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Value { parent: BlockId, socket: String },
    Statement { parent: BlockId, slot: String },
    /// The parent is the previous block in a statement chain.
    Next { previous: BlockId },
}

impl Link {
    pub fn parent(&self) -> &BlockId {
        match self {
            Link::Value { parent, .. } | Link::Statement { parent, .. } => parent,
            Link::Next { previous } => previous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub type_name: String,
    pub kind: BlockKind,
    pub fields: BTreeMap<String, String>,
    pub values: BTreeMap<String, BlockId>,
    pub statements: BTreeMap<String, BlockId>,
    pub next: Option<BlockId>,
    pub parent: Option<Link>,
    pub mutation: Option<Mutation>,
    pub shape: Shape,
    pub comment: Option<String>,
    pub disabled: bool,
    pub x: i64,
    pub y: i64,
}

impl Block {
    pub fn new(id: BlockId, type_name: &str, kind: BlockKind) -> Self {
        Self {
            id,
            type_name: type_name.to_string(),
            kind,
            fields: BTreeMap::new(),
            values: BTreeMap::new(),
            statements: BTreeMap::new(),
            next: None,
            parent: None,
            mutation: None,
            shape: registry::shape_for(kind),
            comment: None,
            disabled: false,
            x: 0,
            y: 0,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field that the block type always carries; its absence means corrupt input.
    pub fn required_field(&self, name: &str) -> Result<&str> {
        self.field(name).ok_or_else(|| {
            anyhow!(
                "Block '{}' ({}) is missing field '{}'.",
                self.id,
                self.type_name,
                name
            )
        })
    }

    /// Rebuilds the shape from the static descriptor plus the mutation.
    /// Starting from the static shape each time keeps reapplication idempotent.
    pub fn apply_mutation(&mut self) {
        let mut shape = registry::shape_for(self.kind);
        if let Some(mutation) = &self.mutation {
            mutation.apply(&mut shape);
        }
        self.shape = shape;
    }
}

/// Arena of block instances. Children are referenced by id, never duplicated.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: HashMap<BlockId, Block>,
    variables: Vec<String>,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block) -> Result<()> {
        if self.blocks.contains_key(&block.id) {
            bail!("Duplicate block id '{}'.", block.id);
        }
        self.blocks.insert(block.id.clone(), block);
        Ok(())
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn block(&self, id: &BlockId) -> Result<&Block> {
        self.get(id)
            .ok_or_else(|| anyhow!("Reference to unknown block '{}'.", id))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn declare_variable(&mut self, name: &str) {
        if !self.variables.iter().any(|v| v == name) {
            self.variables.push(name.to_string());
        }
    }

    pub fn connect_value(&mut self, parent: &BlockId, socket: &str, child: &BlockId) -> Result<()> {
        self.adopt(
            child,
            Link::Value {
                parent: parent.clone(),
                socket: socket.to_string(),
            },
        )?;
        self.parent_mut(parent)?
            .values
            .insert(socket.to_string(), child.clone());
        Ok(())
    }

    pub fn connect_statement(&mut self, parent: &BlockId, slot: &str, child: &BlockId) -> Result<()> {
        self.adopt(
            child,
            Link::Statement {
                parent: parent.clone(),
                slot: slot.to_string(),
            },
        )?;
        self.parent_mut(parent)?
            .statements
            .insert(slot.to_string(), child.clone());
        Ok(())
    }

    pub fn connect_next(&mut self, previous: &BlockId, child: &BlockId) -> Result<()> {
        self.adopt(
            child,
            Link::Next {
                previous: previous.clone(),
            },
        )?;
        let block = self.parent_mut(previous)?;
        if block.next.is_some() {
            bail!("Block '{}' already has a next block.", previous);
        }
        block.next = Some(child.clone());
        Ok(())
    }

    fn adopt(&mut self, child: &BlockId, link: Link) -> Result<()> {
        let block = self
            .blocks
            .get_mut(child)
            .ok_or_else(|| anyhow!("Reference to unknown block '{}'.", child))?;
        if let Some(existing) = &block.parent {
            bail!(
                "Block '{}' is linked from both '{}' and '{}'.",
                child,
                existing.parent(),
                link.parent()
            );
        }
        block.parent = Some(link);
        Ok(())
    }

    fn parent_mut(&mut self, id: &BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(id)
            .ok_or_else(|| anyhow!("Reference to unknown block '{}'.", id))
    }

    /// Root blocks in workspace order: top to bottom, then left to right.
    pub fn top_blocks(&self) -> Vec<&Block> {
        let mut roots: Vec<&Block> = self.blocks.values().filter(|b| b.parent.is_none()).collect();
        roots.sort_by(|a, b| (a.y, a.x, &a.id).cmp(&(b.y, b.x, &b.id)));
        roots
    }

    /// Every block must be reachable from exactly one root through child links.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for root in self.top_blocks() {
            let mut stack = vec![&root.id];
            while let Some(id) = stack.pop() {
                if !seen.insert(id.clone()) {
                    bail!("Block '{}' is reachable twice (cycle in block links).", id);
                }
                let block = self.block(id)?;
                stack.extend(block.values.values());
                stack.extend(block.statements.values());
                stack.extend(block.next.iter());
            }
        }
        if seen.len() != self.blocks.len() {
            let mut stranded: Vec<&str> = self
                .blocks
                .keys()
                .filter(|id| !seen.contains(*id))
                .map(BlockId::as_str)
                .collect();
            stranded.sort_unstable();
            bail!("Blocks form a cycle: {}.", stranded.join(", "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, kind: BlockKind) -> Block {
        Block::new(BlockId::new(id), "test", kind)
    }

    #[test]
    fn rejects_second_parent() {
        let mut graph = BlockGraph::new();
        graph.insert(block("a", BlockKind::TextJoin)).unwrap();
        graph.insert(block("b", BlockKind::TextJoin)).unwrap();
        graph.insert(block("c", BlockKind::Text)).unwrap();
        let (a, b, c) = (BlockId::new("a"), BlockId::new("b"), BlockId::new("c"));
        graph.connect_value(&a, "ADD0", &c).unwrap();
        let err = graph.connect_value(&b, "ADD0", &c).unwrap_err();
        assert!(err.to_string().contains("linked from both"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut graph = BlockGraph::new();
        graph.insert(block("a", BlockKind::Text)).unwrap();
        assert!(graph.insert(block("a", BlockKind::Text)).is_err());
    }

    #[test]
    fn detects_cycles_through_next_links() {
        let mut graph = BlockGraph::new();
        graph.insert(block("a", BlockKind::Comment)).unwrap();
        graph.insert(block("b", BlockKind::Comment)).unwrap();
        let (a, b) = (BlockId::new("a"), BlockId::new("b"));
        graph.connect_next(&a, &b).unwrap();
        graph.connect_next(&b, &a).unwrap();
        assert!(graph.validate().is_err());
    }

    #[test]
    fn top_blocks_are_ordered_by_position() {
        let mut graph = BlockGraph::new();
        let mut low = block("low", BlockKind::Comment);
        low.y = 200;
        let mut high = block("high", BlockKind::Comment);
        high.y = 10;
        graph.insert(low).unwrap();
        graph.insert(high).unwrap();
        let order: Vec<&str> = graph.top_blocks().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(order, vec!["high", "low"]);
        graph.validate().unwrap();
    }
}
