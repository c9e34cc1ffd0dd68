//! Switch recognition.

use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::{
    BlockFlags, BlockId, CaseKey, CfgView, ConditionMerger, Edge, EdgeInsnKind, InsnRemover,
    LoopView, Region, RegionBuildError,
    region::{SwitchCase, SwitchRegion},
};

use super::RegionBuilder;

/// One target block and the (possibly multiple) case keys that branch to it,
/// in first-seen order; `is_default` marks the switch's default target.
struct TargetGroup {
    target: BlockId,
    keys: SmallVec<[CaseKey; 2]>,
    is_default: bool,
}

pub(super) fn build_switch<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
) -> Result<(Region, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let mut groups = group_targets_by_key(b, header);

    let out = compute_out_block(b, header, &groups);
    reorder_for_fallthrough(b, header, &mut groups);

    let in_loop = b.cfg().loop_for_block(header);
    if let Some(out) = out {
        b.stack_mut().push();
        b.stack_mut().add_exit(out);
    } else {
        b.stack_mut().push();
    }

    if let (Some(loop_id), Some(out)) = (in_loop, out) {
        insert_switch_continue(b, loop_id, header, out);
    }

    let default_group = groups.iter().position(|g| g.is_default);
    let default_target = default_group.map(|idx| groups[idx].target);
    let default = if let Some(idx) = default_group {
        let group = groups.remove(idx);
        if out != Some(group.target) {
            let region = b.build(group.target)?;
            (!region.is_empty()).then_some(region.boxed())
        } else {
            None
        }
    } else {
        None
    };

    let mut cases = Vec::with_capacity(groups.len());
    for (idx, group) in groups.iter().enumerate() {
        // A case only falls through when its sole clean successor is the
        // *next* case in iteration order (or, for the last case, the
        // default target) — list adjacency alone doesn't imply a real edge.
        let candidate_next = groups.get(idx + 1).map(|next| next.target).or_else(|| {
            (idx + 1 == groups.len())
                .then_some(default_target)
                .flatten()
        });
        let fallthrough_next = candidate_next.filter(|next| {
            let clean = b.cfg().clean_successors(group.target);
            clean.len() == 1 && clean[0] == *next
        });
        let case_region = build_case(b, out, group.target, fallthrough_next)?;
        cases.push(SwitchCase {
            keys: group.keys.clone(),
            fall_through: fallthrough_next.is_some() && case_has_fallthrough_flag(b, group.target),
            region: case_region,
        });
    }

    b.stack_mut().pop();

    let region = Region::Switch(SwitchRegion {
        header,
        cases,
        default,
    });
    Ok((region, out))
}

/// Groups `(key, target)` pairs by target, preserving first-seen order; the
/// default target is tracked separately (still appears in the returned vec,
/// flagged `is_default`, so callers can locate and pull it).
fn group_targets_by_key<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
) -> Vec<TargetGroup>
where
    C: CfgView,
{
    let mut groups: Vec<TargetGroup> = Vec::new();
    for (key, target) in b.cfg().switch_cases(header) {
        if let Some(group) = groups.iter_mut().find(|g| g.target == *target) {
            group.keys.push(*key);
        } else {
            let mut keys = SmallVec::new();
            keys.push(*key);
            groups.push(TargetGroup {
                target: *target,
                keys,
                is_default: false,
            });
        }
    }

    let default = b.cfg().switch_default(header);
    if let Some(group) = groups.iter_mut().find(|g| g.target == default) {
        group.is_default = true;
    } else {
        groups.push(TargetGroup {
            target: default,
            keys: SmallVec::new(),
            is_default: true,
        });
    }
    groups
}

/// Dominance-frontier-based out-block candidate computation, chain/
/// fallthrough collapsing, and narrowing.
fn compute_out_block<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
    groups: &[TargetGroup],
) -> Option<BlockId>
where
    C: CfgView,
    L: LoopView,
{
    let mut candidates: Vec<BlockId> = b.cfg().dom_frontier(header).iter().collect();

    for group in groups {
        let frontier = b.cfg().dom_frontier(group.target);
        if frontier.len() == 2 {
            let members: Vec<BlockId> = frontier.iter().collect();
            let (a, b_) = (members[0], members[1]);
            let chain = if b.cfg().dom_frontier(a).contains(b_) {
                Some((a, b_))
            } else if b.cfg().dom_frontier(b_).contains(a) {
                Some((b_, a))
            } else {
                None
            };
            if let Some((_head, tail)) = chain {
                if !candidates.contains(&tail) {
                    candidates.push(tail);
                }
                continue;
            }
        } else if frontier.len() > 2 {
            log::debug!(
                target: "midenc_hir_regions",
                "switch header {header}: successor dominance frontier has {} entries",
                frontier.len(),
            );
            b.cfg()
                .add_warn("switch out-block candidates: successor dominance frontier >2 entries");
        }
        for block in frontier.iter() {
            if !candidates.contains(&block) {
                candidates.push(block);
            }
        }
    }

    candidates.retain(|c| *c != header);
    if let Some(loop_id) = b.cfg().loop_for_block(header) {
        let loop_start = b.loops().header(loop_id);
        candidates.retain(|c| *c != loop_start);
    }

    narrow_candidates(b, header, candidates)
}

fn narrow_candidates<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
    mut candidates: Vec<BlockId>,
) -> Option<BlockId>
where
    C: CfgView,
    L: LoopView,
{
    if candidates.len() > 1 {
        candidates.retain(|c| !b.cfg().contains_flag(*c, BlockFlags::EXC_HANDLER));
    }
    if candidates.len() > 1 {
        let others: Vec<BlockId> = candidates.clone();
        candidates.retain(|c| {
            !others.iter().any(|o| {
                o != c
                    && (b.cfg().successors(*o).contains(c) || b.cfg().dom_frontier(*o).contains(*c))
            })
        });
        candidates.retain(|c| !b.cfg().contains_flag(*c, BlockFlags::LOOP_START));
    }
    if candidates.len() > 1 {
        if let Some(loop_id) = b.cfg().loop_for_block(header) {
            let loop_end = b.loops().end(loop_id);
            candidates.retain(|c| *c != loop_end);
        }
    }

    if candidates.is_empty() {
        let successors = b.cfg().successors(header);
        return successors
            .iter()
            .copied()
            .find(|m| successors.iter().all(|s| *s == *m || b.cfg().is_path_exists(*s, *m)));
    }

    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    if b.cfg().loop_for_block(header).is_none() {
        log::warn!(
            target: "midenc_hir_regions",
            "switch header {header}: {} out-block candidates outside a loop, proceeding without one",
            candidates.len(),
        );
        b.cfg()
            .add_warn("switch has multiple out-block candidates outside a loop; proceeding without one");
        return None;
    }
    candidates.into_iter().next()
}

/// Reorders `groups` so each fallthrough source immediately precedes its
/// target, flagging `INCONSISTENT_CODE` if that's impossible.
fn reorder_for_fallthrough<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
    groups: &mut [TargetGroup],
) where
    C: CfgView,
{
    let fallthroughs: Vec<(BlockId, BlockId)> = groups
        .iter()
        .filter(|g| !g.is_default)
        .filter_map(|g| {
            let cleans = b.cfg().clean_successors(g.target);
            (cleans.len() == 1).then(|| (g.target, cleans[0]))
        })
        .filter(|(_, next)| groups.iter().any(|g2| g2.target == *next && !g2.is_default))
        .collect();

    if fallthroughs.is_empty() {
        return;
    }

    let mut order: Vec<BlockId> = groups.iter().map(|g| g.target).collect();
    let mut fixed = true;
    for (source, target) in &fallthroughs {
        let (Some(si), Some(ti)) = (
            order.iter().position(|b| b == source),
            order.iter().position(|b| b == target),
        ) else {
            continue;
        };
        if ti != si + 1 {
            if let Some(removed_idx) = order.iter().position(|b| b == target) {
                let target_block = order.remove(removed_idx);
                let insert_at = order.iter().position(|b| b == source).map(|i| i + 1);
                match insert_at {
                    Some(i) => order.insert(i, target_block),
                    None => {
                        fixed = false;
                        order.push(target_block);
                    }
                }
            }
        }
    }

    groups.sort_by_key(|g| order.iter().position(|b| *b == g.target).unwrap_or(usize::MAX));

    if !fixed {
        log::debug!(
            target: "midenc_hir_regions",
            "switch header {header}: fallthrough chain could not be reordered consistently",
        );
        b.cfg().add_method_flag(BlockFlags::INCONSISTENT_CODE);
    }
}

fn case_has_fallthrough_flag<C, L, M, R>(b: &RegionBuilder<'_, C, L, M, R>, target: BlockId) -> bool
where
    C: CfgView,
{
    b.cfg().contains_flag(target, BlockFlags::FALL_THROUGH)
}

/// Builds one case's region. An empty body (target already an exit
/// of the enclosing scope) stays an empty sequence; otherwise the
/// fallthrough-next block (if any) is added as a temporary exit so the
/// recognizer doesn't walk into the next case's body, and both the target
/// and case region are flagged `FALL_THROUGH` when that happened.
fn build_case<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    out: Option<BlockId>,
    target: BlockId,
    fallthrough_next: Option<BlockId>,
) -> Result<Region, RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    if out == Some(target) || b.stack_mut().top_contains_exit(target) {
        return Ok(Region::empty_sequence());
    }

    if let Some(next) = fallthrough_next {
        b.stack_mut().add_exit(next);
    }
    let region = b.build(target);
    if let Some(next) = fallthrough_next {
        b.stack_mut().remove_exit(next);
        b.cfg().add_flag(target, BlockFlags::FALL_THROUGH);
    }
    region
}

/// Switch-continue: for each clean successor whose dominance frontier
/// contains `loop.end` and differs from `out`, find a synthetic predecessor
/// of `loop.end` dominated by that successor and append `CONTINUE` to it.
fn insert_switch_continue<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: crate::LoopId,
    header: BlockId,
    out: BlockId,
) where
    C: CfgView,
    L: LoopView,
{
    let loop_end = b.loops().end(loop_id);
    if out == loop_end {
        return;
    }
    for succ in b.cfg().clean_successors(header) {
        if succ == out || !b.cfg().dom_frontier(succ).contains(loop_end) {
            continue;
        }
        let synthetic_pred = b
            .cfg()
            .predecessors(loop_end)
            .iter()
            .copied()
            .find(|pred| b.cfg().contains_flag(*pred, BlockFlags::SYNTHETIC) && b.cfg().is_dominator(succ, *pred));
        if let Some(pred) = synthetic_pred {
            b.cfg()
                .add_edge_insn(Edge::new(succ, pred), EdgeInsnKind::Continue, None);
        }
    }
}
