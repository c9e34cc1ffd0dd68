//! Read-only access to the CFG, plus the small set of mutable per-block
//! operations (flags, loop-attribute attach/detach) the builder needs as
//! observable side effects.
//!
//! None of this is computed here — dominance, natural loops, and exception
//! handler metadata are all produced by earlier passes and simply exposed
//! through [`CfgView`]/[`LoopView`]. A minimal reference implementation used
//! by this crate's own test suite lives in [`sample`].

#[cfg(test)]
pub mod sample;

use alloc::vec::Vec;

use bitvec::vec::BitVec;
use cranelift_entity::{EntityRef, entity_impl};
use smallvec::SmallVec;

use crate::{
    BlockFlags,
    edge::{Edge, EdgeInsnKind, LoopLabelAttr},
    region::CaseKey,
};

/// Dense integer id of a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// Dense integer id of a detected natural loop.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u32);
entity_impl!(LoopId, "loop");

/// Dense integer id of an exception handler.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExcHandlerId(u32);
entity_impl!(ExcHandlerId, "exc");

/// Identifies the lock argument a `monitor-enter`/`monitor-exit` pair
/// operates on ("arg0 equality").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MonitorArg(pub u32);

/// The branch kind of a block's last instruction, consulted by the
/// dispatcher to decide which recognizer to try.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TermKind {
    If,
    Switch,
    MonitorEnter,
    MonitorExit,
    Return,
    Break,
    Continue,
    Plain,
}

/// A detected exception handler, scoped to one or more try-blocks.
#[derive(Debug, Clone)]
pub struct ExcHandler {
    pub id: ExcHandlerId,
    pub handler_block: BlockId,
    pub try_blocks: SmallVec<[BlockId; 4]>,
    /// `finally` handlers are dominated by their splitter rather than by
    /// the handler block itself.
    pub is_finally: bool,
}

/// A dense, resizable set of [`BlockId`]s.
///
/// Used for dominance-frontier sets, loop exit-node sets, the builder's
/// `processed_blocks` bitset, and [`crate::stack::RegionStack`] exit sets.
#[derive(Debug, Clone, Default)]
pub struct BlockSet(BitVec);

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self(BitVec::repeat(false, n))
    }

    fn ensure(&mut self, idx: usize) {
        if idx >= self.0.len() {
            self.0.resize(idx + 1, false);
        }
    }

    pub fn insert(&mut self, block: BlockId) {
        let idx = block.index();
        self.ensure(idx);
        self.0.set(idx, true);
    }

    pub fn remove(&mut self, block: BlockId) {
        let idx = block.index();
        if idx < self.0.len() {
            self.0.set(idx, false);
        }
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.0.get(block.index()).map(|bit| *bit).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        let len = self.0.len();
        self.0 = BitVec::repeat(false, len);
    }

    pub fn is_empty(&self) -> bool {
        !self.0.any()
    }

    pub fn len(&self) -> usize {
        self.0.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.0.iter_ones().map(BlockId::new)
    }

    pub fn union_with(&mut self, other: &BlockSet) {
        if !other.0.is_empty() {
            self.ensure(other.0.len() - 1);
        }
        for idx in other.0.iter_ones() {
            self.0.set(idx, true);
        }
    }

    pub fn from_blocks(iter: impl IntoIterator<Item = BlockId>) -> Self {
        let mut set = Self::default();
        for block in iter {
            set.insert(block);
        }
        set
    }
}

/// Component A: read-only access to a method's CFG, plus the small number
/// of mutations the builder performs as its observable side effects.
///
/// Implementors own the actual block storage; this crate never constructs
/// blocks, only refers to them by [`BlockId`].
pub trait CfgView {
    /// All blocks of the method, in source/declaration order.
    fn blocks(&self) -> &[BlockId];

    fn blocks_count(&self) -> usize {
        self.blocks().len()
    }

    fn entry_block(&self) -> BlockId;

    fn predecessors(&self, block: BlockId) -> &[BlockId];

    fn successors(&self, block: BlockId) -> &[BlockId];

    /// Successors with synthetic back-edges filtered out.
    fn clean_successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]>;

    fn dom_frontier(&self, block: BlockId) -> &BlockSet;

    /// Does `dominator` dominate `other`?
    fn is_dominator(&self, dominator: BlockId, other: BlockId) -> bool;

    fn term_kind(&self, block: BlockId) -> TermKind;

    /// A `SWITCH` block's `(case key, target block)` pairs in source order,
    /// distinct from [`Self::successors`] which also includes the default
    /// edge; see [`Self::switch_default`].
    fn switch_cases(&self, block: BlockId) -> &[(CaseKey, BlockId)];

    /// A `SWITCH` block's default target.
    fn switch_default(&self, block: BlockId) -> BlockId;

    /// The lock argument of a `monitor-enter`/`monitor-exit` block, if any.
    fn monitor_arg(&self, block: BlockId) -> Option<MonitorArg>;

    fn contains_flag(&self, block: BlockId, flag: BlockFlags) -> bool;

    fn add_flag(&self, block: BlockId, flag: BlockFlags);

    fn remove_flag(&self, block: BlockId, flag: BlockFlags);

    fn exception_handlers(&self) -> &[ExcHandler];

    /// `method.addWarn` — logged by the builder, never fatal.
    fn add_warn(&self, message: &str);

    /// Sets a method-level flag, e.g. `INCONSISTENT_CODE`.
    fn add_method_flag(&self, flag: BlockFlags);

    fn loop_for_block(&self, block: BlockId) -> Option<LoopId>;

    fn all_loops_for_block(&self, block: BlockId) -> SmallVec<[LoopId; 2]>;

    /// Temporarily detaches the `Loop` attribute from `block`; the builder
    /// reinstates it with [`Self::restore_loop_attr`] before returning.
    fn take_loop_attr(&self, block: BlockId) -> Option<LoopId>;

    fn restore_loop_attr(&self, block: BlockId, loop_id: LoopId);

    /// The block that follows `block` in the method's declared block order,
    /// if any (`getNextBlock`).
    fn next_block(&self, block: BlockId) -> Option<BlockId>;

    /// Follows `block`'s single clean successor through any synthetic
    /// trampoline blocks (`skipSyntheticSuccessor`).
    fn skip_synthetic_successor(&self, block: BlockId) -> BlockId;

    fn is_path_exists(&self, from: BlockId, to: BlockId) -> bool;

    /// Point where the forward paths from `a` and `b` first rejoin, if any
    /// (`getPathCross`).
    fn get_path_cross(&self, a: BlockId, b: BlockId) -> Option<BlockId>;

    /// True if every simple path from `from` to `to` passes through no
    /// blocks with real instructions.
    fn is_empty_simple_path(&self, from: BlockId, to: BlockId) -> bool;

    /// The blocks strictly between `from` and `to` along the single-
    /// successor chain `is_empty_simple_path` walks, in traversal order.
    /// Empty when `from == to` or `from` is a direct predecessor of `to`;
    /// only meaningful to call when `is_empty_simple_path(from, to)` holds.
    fn simple_path_blocks(&self, from: BlockId, to: BlockId) -> Vec<BlockId>;

    /// `EdgeInsnAttr.addEdgeInsn` — attaches a synthesized `break`/`continue`
    /// to an edge rather than inlining it into a block.
    fn add_edge_insn(&self, edge: Edge, kind: EdgeInsnKind, label: Option<LoopLabelAttr>);

    fn has_edge_insn(&self, edge: Edge) -> bool;
}

/// Component, read-only: the natural-loop metadata produced by an earlier
/// loop-detection pass.
pub trait LoopView {
    fn header(&self, loop_id: LoopId) -> BlockId;

    /// The back-edge tail ("end") of the loop.
    fn end(&self, loop_id: LoopId) -> BlockId;

    fn contains_block(&self, loop_id: LoopId, block: BlockId) -> bool;

    /// Edges whose source is inside the loop and target is outside it.
    fn exit_edges(&self, loop_id: LoopId) -> &[Edge];

    /// The (deduplicated) targets of `exit_edges`.
    fn exit_nodes(&self, loop_id: LoopId) -> &[BlockId];

    fn parent_loop(&self, loop_id: LoopId) -> Option<LoopId>;
}

/// `InsnRemover.unbindInsn` — unbinds a matched instruction from SSA
/// use-def bookkeeping the region builder itself knows nothing about.
pub trait InsnRemover<C: CfgView> {
    fn unbind_insn(&self, cfg: &C, block: BlockId, kind: TermKind);
}

/// An [`InsnRemover`] that does nothing; useful for callers whose CFG has no
/// SSA use-def chains to unbind (or for tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInsnRemover;

impl<C: CfgView> InsnRemover<C> for NullInsnRemover {
    fn unbind_insn(&self, _cfg: &C, _block: BlockId, _kind: TermKind) {}
}
