//! Condition construction and merging.
//!
//! `IfMakerHelper`-style condition-expression construction and short-circuit
//! `&&`/`||` merging is treated as a pure external collaborator. This module
//! defines the trait boundary ([`ConditionMerger`]) plus a minimal default
//! implementation that handles the single-condition case — sufficient for
//! callers with no short-circuit merging of their own, and for this crate's
//! test fixtures.

use smallvec::SmallVec;

use crate::cfg::{BlockId, CfgView};

/// An abstract condition recognized at an `IF` block: the block bearing it,
/// the (possibly merged) set of header blocks that contribute to a
/// short-circuited condition tree, and the then/else/out blocks.
#[derive(Debug, Clone)]
pub struct IfInfo {
    pub if_block: BlockId,
    /// Header blocks merged into this condition by short-circuit merging.
    /// Always contains at least `if_block`.
    pub merged_headers: SmallVec<[BlockId; 2]>,
    pub then_block: BlockId,
    pub else_block: BlockId,
}

impl IfInfo {
    pub fn new(if_block: BlockId, then_block: BlockId, else_block: BlockId) -> Self {
        Self {
            if_block,
            merged_headers: SmallVec::from_slice(&[if_block]),
            then_block,
            else_block,
        }
    }

    /// Swaps the then/else branches — the "invert" a compiler's common
    /// convention of emitting the negated condition first requires.
    pub fn invert(&self) -> Self {
        Self {
            if_block: self.if_block,
            merged_headers: self.merged_headers.clone(),
            then_block: self.else_block,
            else_block: self.then_block,
        }
    }
}

/// The result of [`ConditionMerger::restructure_if`]: validated then/else
/// blocks and the chosen merge (out) block, if a real merge point exists.
#[derive(Debug, Clone)]
pub struct RestructuredIf {
    pub then_block: BlockId,
    pub else_block: BlockId,
    pub out_block: Option<BlockId>,
}

/// Component C, external collaborator: builds and merges `IfInfo` values.
pub trait ConditionMerger<C: CfgView> {
    /// Builds the simple (unmerged) `IfInfo` at `block`, an `IF`-terminated
    /// block. Returns `None` if `block` is not a valid condition header.
    fn make_if_info(&self, cfg: &C, block: BlockId) -> Option<IfInfo>;

    /// Attempts to merge nested short-circuited conditions into `info`,
    /// mutating it in place. Returns `true` if any merging occurred.
    fn merge_nested_if_nodes(&self, cfg: &C, info: &mut IfInfo) -> bool;

    /// Marks every header block consumed by `info`'s merge as
    /// `ADDED_TO_REGION`, confirming the merge is final.
    fn confirm_merge(&self, cfg: &C, info: &IfInfo) {
        for header in info.merged_headers.iter().copied() {
            cfg.add_flag(header, crate::BlockFlags::ADDED_TO_REGION);
        }
    }

    /// Chooses/validates the then, else, and out blocks for `info`. Returns
    /// `None` if the condition cannot be restructured into a valid if/else.
    fn restructure_if(&self, cfg: &C, block: BlockId, info: &IfInfo) -> Option<RestructuredIf>;
}

/// A [`ConditionMerger`] with no short-circuit merging: every `IF` block is
/// treated as a single, unmerged condition. `restructure_if` picks the out
/// block as the nearest common dominance-frontier entry of the then/else
/// blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleConditionMerger;

impl<C: CfgView> ConditionMerger<C> for SimpleConditionMerger {
    fn make_if_info(&self, cfg: &C, block: BlockId) -> Option<IfInfo> {
        let succs = cfg.successors(block);
        if succs.len() != 2 {
            return None;
        }
        Some(IfInfo::new(block, succs[0], succs[1]))
    }

    fn merge_nested_if_nodes(&self, _cfg: &C, _info: &mut IfInfo) -> bool {
        false
    }

    fn restructure_if(&self, cfg: &C, _block: BlockId, info: &IfInfo) -> Option<RestructuredIf> {
        if info.then_block == info.else_block {
            return None;
        }

        // The common case a compiler emits: the else branch is itself the
        // merge point, i.e. there is no real else region.
        if cfg.dom_frontier(info.then_block).contains(info.else_block) {
            return Some(RestructuredIf {
                then_block: info.then_block,
                else_block: info.else_block,
                out_block: Some(info.else_block),
            });
        }
        if cfg.dom_frontier(info.else_block).contains(info.then_block) {
            return Some(RestructuredIf {
                then_block: info.then_block,
                else_block: info.else_block,
                out_block: Some(info.then_block),
            });
        }

        let out_block = cfg
            .dom_frontier(info.then_block)
            .iter()
            .find(|candidate| cfg.dom_frontier(info.else_block).contains(*candidate));

        Some(RestructuredIf {
            then_block: info.then_block,
            else_block: info.else_block,
            out_block,
        })
    }
}
