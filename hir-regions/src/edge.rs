use crate::{BlockId, FxHashMap, LoopId};

/// A directed CFG edge, identified by its endpoints.
///
/// Synthetic `break`/`continue` instructions are attached to edges rather
/// than inlined into a block's instruction list, since a block can have
/// more than one outgoing edge and only one of them may need the synthetic
/// instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
}

impl Edge {
    pub fn new(from: BlockId, to: BlockId) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdgeInsnKind {
    Break,
    Continue,
}

/// Attached to a synthesized `break` when the loop it exits needs to be
/// named explicitly, i.e. the break's source block sits inside more than
/// one loop and a plain `break` would be ambiguous about which one it exits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoopLabelAttr(pub LoopId);

/// The table of edge instructions synthesized by the builder.
///
/// Conceptually part of the CFG's mutable state: populated as a side-effect
/// of building regions, consulted later by the component that emits source
/// code for an edge.
#[derive(Debug, Default)]
pub struct EdgeInsnTable {
    insns: FxHashMap<Edge, (EdgeInsnKind, Option<LoopLabelAttr>)>,
}

impl EdgeInsnTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge_insn(&mut self, edge: Edge, kind: EdgeInsnKind, label: Option<LoopLabelAttr>) {
        self.insns.insert(edge, (kind, label));
    }

    pub fn get(&self, edge: Edge) -> Option<(EdgeInsnKind, Option<LoopLabelAttr>)> {
        self.insns.get(&edge).copied()
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.insns.contains_key(&edge)
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Edge, &(EdgeInsnKind, Option<LoopLabelAttr>))> {
        self.insns.iter()
    }
}
