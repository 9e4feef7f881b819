//! Intermediate representation for the pass pipeline.
//!
//! A program is an ordered sequence of operation nodes:
//! - **Nodes** (`IrNode`) live in an arena owned by `IrGraph` and are addressed
//!   by a stable `IrNodeId`.
//! - **Edges** are ordered `IrNodeId` lists on each node (inputs and outputs).
//!   Neighbour queries read these lists directly.
//! - **Program order** is a separate list of ids. Passes replace it wholesale;
//!   nodes that fall out of it stay in the arena, so references to them remain
//!   valid.
//!
//! Node identity is the `IrNodeId`, never the name. Two nodes may share a name.

use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fmt;

/// Type alias for IR node identifiers (backed by petgraph NodeIndex).
pub type IrNodeId = NodeIndex;

// ──────────────────────────────── OpKind ─────────────────────────────────

/// Operation kind of a node. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    MatMul,
    Add,
    Mul,
    Load,
    Store,
    Alloc,
    Loop,
    Block,
}

impl OpKind {
    /// Opcode mnemonic used in textual dumps.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpKind::MatMul => "matmul",
            OpKind::Add => "add",
            OpKind::Mul => "mul",
            OpKind::Load => "load",
            OpKind::Store => "store",
            OpKind::Alloc => "alloc",
            OpKind::Loop => "loop",
            OpKind::Block => "block",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ──────────────────────────── AttributeValue ─────────────────────────────

/// Attribute value attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    String(String),
    Ints(Vec<i64>),
}

/// The stored kind of an [`AttributeValue`], used for typed lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Int,
    Float,
    String,
    Ints,
}

impl AttributeValue {
    /// Get the kind of this value.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Ints(_) => AttributeKind::Ints,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Int => "int",
            AttributeKind::Float => "float",
            AttributeKind::String => "string",
            AttributeKind::Ints => "int[]",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
            AttributeValue::Ints(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Vec<i32>> for AttributeValue {
    fn from(values: Vec<i32>) -> Self {
        AttributeValue::Ints(values.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(values: Vec<i64>) -> Self {
        AttributeValue::Ints(values)
    }
}

impl From<&[i64]> for AttributeValue {
    fn from(values: &[i64]) -> Self {
        AttributeValue::Ints(values.to_vec())
    }
}

// ──────────────────────────── SourceLocation ─────────────────────────────

/// Position in the producer's source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub file: String,
}

impl SourceLocation {
    /// Create a location without a file name.
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            file: String::new(),
        }
    }

    /// Attach a file name.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }
}

// ──────────────────────────────── IrNode ─────────────────────────────────

/// A single operation in the program.
///
/// `Clone` is a shallow copy: attributes and location are duplicated, while
/// the input/output id lists keep pointing at the same nodes as the original.
#[derive(Debug, Clone)]
pub struct IrNode {
    /// Operation kind.
    pub kind: OpKind,

    /// Display label (not unique).
    pub name: String,

    /// Input node ids, in operand order.
    pub inputs: Vec<IrNodeId>,

    /// Output node ids.
    pub outputs: Vec<IrNodeId>,

    /// Attributes. Storage is unordered; rendering sorts keys.
    pub attributes: HashMap<String, AttributeValue>,

    /// Source position, if the producer supplied one.
    pub location: Option<SourceLocation>,
}

impl IrNode {
    /// Create a node with no edges or attributes.
    pub fn new(kind: OpKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: HashMap::new(),
            location: None,
        }
    }

    /// Get the operation kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Get the node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get input node ids.
    pub fn inputs(&self) -> &[IrNodeId] {
        &self.inputs
    }

    /// Get output node ids.
    pub fn outputs(&self) -> &[IrNodeId] {
        &self.outputs
    }

    /// Append an input edge. No cycle detection is performed.
    pub fn add_input(&mut self, input: IrNodeId) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Append an output edge. No cycle detection is performed.
    pub fn add_output(&mut self, output: IrNodeId) -> &mut Self {
        self.outputs.push(output);
        self
    }

    /// Insert or overwrite an attribute.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the source position, keeping any file already recorded.
    pub fn set_location(&mut self, line: u32, column: u32) -> &mut Self {
        let file = self
            .location
            .take()
            .map(|loc| loc.file)
            .unwrap_or_default();
        self.location = Some(SourceLocation { line, column, file });
        self
    }

    /// Check whether an attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Get an attribute without checking its kind.
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Get an attribute that must be present and of the expected kind.
    ///
    /// # Errors
    ///
    /// Returns `AttributeNotFound` if the key is absent and
    /// `AttributeTypeMismatch` if the stored kind differs from `expected`.
    pub fn attribute(&self, key: &str, expected: AttributeKind) -> Result<&AttributeValue> {
        let value = self
            .attributes
            .get(key)
            .ok_or_else(|| Error::AttributeNotFound {
                node: self.name.clone(),
                key: key.to_string(),
            })?;

        if value.kind() != expected {
            return Err(Error::AttributeTypeMismatch {
                node: self.name.clone(),
                key: key.to_string(),
                expected,
                found: value.kind(),
            });
        }

        Ok(value)
    }

    /// Get an integer attribute.
    pub fn int_attribute(&self, key: &str) -> Result<i64> {
        match self.attribute(key, AttributeKind::Int)? {
            AttributeValue::Int(v) => Ok(*v),
            other => Err(self.mismatch(key, AttributeKind::Int, other)),
        }
    }

    /// Get a float attribute.
    pub fn float_attribute(&self, key: &str) -> Result<f64> {
        match self.attribute(key, AttributeKind::Float)? {
            AttributeValue::Float(v) => Ok(*v),
            other => Err(self.mismatch(key, AttributeKind::Float, other)),
        }
    }

    /// Get a string attribute.
    pub fn string_attribute(&self, key: &str) -> Result<&str> {
        match self.attribute(key, AttributeKind::String)? {
            AttributeValue::String(v) => Ok(v),
            other => Err(self.mismatch(key, AttributeKind::String, other)),
        }
    }

    /// Get an integer-sequence attribute.
    pub fn ints_attribute(&self, key: &str) -> Result<&[i64]> {
        match self.attribute(key, AttributeKind::Ints)? {
            AttributeValue::Ints(v) => Ok(v),
            other => Err(self.mismatch(key, AttributeKind::Ints, other)),
        }
    }

    fn mismatch(&self, key: &str, expected: AttributeKind, found: &AttributeValue) -> Error {
        Error::AttributeTypeMismatch {
            node: self.name.clone(),
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

// ──────────────────────────────── IrGraph ────────────────────────────────

/// Program representation: a node arena plus the current program order.
pub struct IrGraph {
    /// Node arena. Dataflow lives in each node's input/output lists.
    arena: StableGraph<IrNode, ()>,

    /// Program order. Doubles as adjacency for pattern matching.
    order: Vec<IrNodeId>,
}

impl IrGraph {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self {
            arena: StableGraph::new(),
            order: Vec::new(),
        }
    }

    // ── Node access ──

    /// Get an immutable reference to a node.
    pub fn node(&self, id: IrNodeId) -> Result<&IrNode> {
        self.arena
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: IrNodeId) -> Result<&mut IrNode> {
        self.arena
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Check whether an id refers to a node in the arena.
    pub fn contains(&self, id: IrNodeId) -> bool {
        self.arena.contains_node(id)
    }

    /// Program order.
    pub fn order(&self) -> &[IrNodeId] {
        &self.order
    }

    /// Iterate over nodes in program order.
    pub fn nodes(&self) -> impl Iterator<Item = (IrNodeId, &IrNode)> {
        self.order
            .iter()
            .filter_map(|&id| self.arena.node_weight(id).map(|node| (id, node)))
    }

    /// Number of nodes in program order.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check whether the program is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of nodes held by the arena, including nodes no longer in
    /// program order.
    pub fn arena_len(&self) -> usize {
        self.arena.node_count()
    }

    /// Position of a node in program order.
    pub fn position(&self, id: IrNodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == id)
    }

    /// Find the first node in program order with the given name.
    pub fn find_node_by_name(&self, name: &str) -> Option<IrNodeId> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// Nodes that consume this node's value or that it writes to.
    ///
    /// Read from the nodes' own edge lists, so edges added through
    /// `node_mut` are seen as well.
    pub fn successors(&self, id: IrNodeId) -> Vec<IrNodeId> {
        let own = self.arena.node_weight(id).map(|n| n.outputs.as_slice());
        self.neighbours(own.unwrap_or_default(), |other| other.inputs.contains(&id))
    }

    /// Nodes this node reads from or that write to it.
    pub fn predecessors(&self, id: IrNodeId) -> Vec<IrNodeId> {
        let own = self.arena.node_weight(id).map(|n| n.inputs.as_slice());
        self.neighbours(own.unwrap_or_default(), |other| other.outputs.contains(&id))
    }

    /// `direct` followed by every arena node matching `refers_back`, without
    /// duplicates.
    fn neighbours(
        &self,
        direct: &[IrNodeId],
        refers_back: impl Fn(&IrNode) -> bool,
    ) -> Vec<IrNodeId> {
        let mut found: Vec<IrNodeId> = Vec::new();
        let referrers = self
            .arena
            .node_indices()
            .filter(|&other| refers_back(&self.arena[other]));
        for candidate in direct.iter().copied().chain(referrers) {
            if !found.contains(&candidate) {
                found.push(candidate);
            }
        }
        found
    }

    // ── Graph mutation ──

    /// Add a node to the arena and append it to program order.
    ///
    /// # Errors
    ///
    /// Returns an error if the node references an id not in the arena.
    pub fn add_node(&mut self, node: IrNode) -> Result<IrNodeId> {
        let id = self.add_detached(node)?;
        self.order.push(id);
        Ok(id)
    }

    /// Add a node to the arena without placing it in program order.
    ///
    /// Passes use this to synthesize nodes for a replacement order.
    pub fn add_detached(&mut self, node: IrNode) -> Result<IrNodeId> {
        for &referenced in node.inputs.iter().chain(node.outputs.iter()) {
            if !self.arena.contains_node(referenced) {
                return Err(Error::InvalidGraph(format!(
                    "Node '{}' references unknown node {:?}",
                    node.name, referenced
                )));
            }
        }

        Ok(self.arena.add_node(node))
    }

    /// Append an input edge to an existing node.
    pub fn add_input(&mut self, id: IrNodeId, input: IrNodeId) -> Result<()> {
        self.node(input)?;
        self.node_mut(id)?.add_input(input);
        Ok(())
    }

    /// Append an output edge to an existing node.
    pub fn add_output(&mut self, id: IrNodeId, output: IrNodeId) -> Result<()> {
        self.node(output)?;
        self.node_mut(id)?.add_output(output);
        Ok(())
    }

    /// Insert or overwrite an attribute on an existing node.
    pub fn set_attribute(
        &mut self,
        id: IrNodeId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        self.node_mut(id)?.set_attribute(key, value);
        Ok(())
    }

    /// Shallow-copy a node into the arena (detached from program order).
    ///
    /// The copy shares the original's input/output references. A deep copy
    /// requires the caller to clone the referenced nodes and remap the edges.
    pub fn clone_node(&mut self, id: IrNodeId) -> Result<IrNodeId> {
        let copy = self.node(id)?.clone();
        self.add_detached(copy)
    }

    /// Replace program order wholesale and return the previous order.
    ///
    /// # Errors
    ///
    /// Returns an error if any id is not in the arena; the order is left
    /// unchanged in that case.
    pub fn replace_order(&mut self, order: Vec<IrNodeId>) -> Result<Vec<IrNodeId>> {
        if let Some(missing) = order.iter().find(|&&id| !self.arena.contains_node(id)) {
            return Err(Error::InvalidGraph(format!(
                "Program order references unknown node {:?}",
                missing
            )));
        }
        Ok(std::mem::replace(&mut self.order, order))
    }

    // ── Rendering ──

    /// Render one node as `%name = opcode(%in, ...) {k = v, ...} !loc(l:c)`.
    pub fn render_node(&self, id: IrNodeId, indent: usize) -> Result<String> {
        let node = self.node(id)?;
        let mut out = " ".repeat(indent * 2);

        out.push('%');
        out.push_str(&node.name);
        out.push_str(" = ");
        out.push_str(node.kind.mnemonic());

        if !node.inputs.is_empty() {
            let operands: Vec<String> = node
                .inputs
                .iter()
                .map(|&input| match self.arena.node_weight(input) {
                    Some(n) => format!("%{}", n.name),
                    None => format!("%<{}>", input.index()),
                })
                .collect();
            out.push('(');
            out.push_str(&operands.join(", "));
            out.push(')');
        }

        if !node.attributes.is_empty() {
            let mut keys: Vec<&String> = node.attributes.keys().collect();
            keys.sort();
            let rendered: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{} = {}", key, node.attributes[key]))
                .collect();
            out.push_str(" {");
            out.push_str(&rendered.join(", "));
            out.push('}');
        }

        if let Some(loc) = &node.location {
            out.push_str(&format!(" !loc({}:{})", loc.line, loc.column));
        }

        Ok(out)
    }

    /// Render the whole program, one node per line, in program order.
    pub fn dump(&self) -> String {
        let mut text = String::new();
        for &id in &self.order {
            if let Ok(line) = self.render_node(id, 0) {
                text.push_str(&line);
                text.push('\n');
            }
        }
        text
    }
}

impl Default for IrGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IrGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}
