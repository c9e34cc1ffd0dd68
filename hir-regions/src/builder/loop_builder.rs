//! Loop recognition.
//!
//! Turns a `LOOP_START` header into a `while`/`do-while`/endless
//! [`LoopRegion`], choosing the condition-bearing exit (if any), shaping its
//! `IfInfo`, recursing into the body, and synthesizing `break`/`continue`
//! edge instructions for the loop's other exits.

use alloc::vec::Vec;

use crate::{
    BlockFlags, BlockId, CfgView, ConditionMerger, EdgeInsnKind, Edge, InsnRemover, LoopId,
    LoopLabelAttr, LoopPosition, LoopView, Region, RegionBuildError, RegionItem,
    region::{IfCondition, LoopRegion},
};

use super::RegionBuilder;

pub(super) fn build_loop<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
) -> Result<(Region, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let exits = ordered_exit_candidates(b, loop_id, header);

    for candidate in &exits {
        if let Some((region, next)) = try_make_loop_region(b, loop_id, header, *candidate)? {
            return Ok((region, next));
        }
    }

    make_endless_loop(b, loop_id, header)
}

/// Candidate blocks that might bear the loop's condition test, tried in
/// order: header's graph-successor, then header itself, then loop end.
/// [`is_acceptable_condition_header`] does the real filtering (membership in
/// the loop, `If` terminator, reachability from header) — these three are
/// the only blocks that can ever pass it, since a condition header must sit
/// inside the loop while [`LoopView::exit_nodes`] are by definition outside
/// it.
fn ordered_exit_candidates<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
) -> Vec<BlockId>
where
    C: CfgView,
    L: LoopView,
{
    let mut ordered = Vec::with_capacity(3);
    let mut push_once = |block: BlockId, ordered: &mut Vec<BlockId>| {
        if !ordered.contains(&block) {
            ordered.push(block);
        }
    };

    if let Some(succ) = b.cfg().successors(header).first().copied() {
        push_once(succ, &mut ordered);
    }
    push_once(header, &mut ordered);
    push_once(b.loops().end(loop_id), &mut ordered);
    ordered
}

/// Accepts `candidate` as the condition header, or returns `Ok(None)` so
/// the caller tries the next candidate.
fn try_make_loop_region<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
    candidate: BlockId,
) -> Result<Option<(Region, Option<BlockId>)>, RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    if !is_acceptable_condition_header(b, loop_id, header, candidate) {
        return Ok(None);
    }

    let Some(mut info) = b.merger().make_if_info(b.cfg(), candidate) else {
        return Ok(None);
    };
    b.merger().merge_nested_if_nodes(b.cfg(), &mut info);
    b.merger().confirm_merge(b.cfg(), &info);

    let loop_end = b.loops().end(loop_id);
    let is_condition_at_end = candidate == loop_end;

    // If the then-branch leaves the loop, invert so `then` stays in.
    let then_in_loop = b.loops().contains_block(loop_id, info.then_block);
    let info = if !then_in_loop { info.invert() } else { info };

    let mut exit_blocks: Vec<BlockId> = b
        .loops()
        .exit_nodes(loop_id)
        .iter()
        .copied()
        .filter(|block| !info.merged_headers.contains(block))
        .collect();

    let condition = IfCondition {
        if_block: info.if_block,
        merged_headers: info.merged_headers.clone(),
    };

    let (body, pre_condition_block, out) = if is_condition_at_end {
        build_condition_at_end_body(b, loop_id, header, loop_end, &mut exit_blocks)?
    } else {
        build_condition_at_start_body(b, loop_id, header, &info, &mut exit_blocks)?
    };

    // Remaining loop exits get synthesized `break`s.
    for exit_edge in b.loops().exit_edges(loop_id).to_vec() {
        if exit_blocks.contains(&exit_edge.to) {
            let _ = insert_loop_break(b, loop_id, candidate, exit_edge)?;
        }
    }

    let region = Region::Loop(LoopRegion {
        loop_id,
        body: body.boxed(),
        condition: Some(condition),
        position: if is_condition_at_end {
            LoopPosition::ConditionAtEnd
        } else {
            LoopPosition::ConditionAtStart
        },
        pre_condition_block,
    });
    Ok(Some((region, out)))
}

fn is_acceptable_condition_header<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
    candidate: BlockId,
) -> bool
where
    C: CfgView,
    L: LoopView,
{
    if b.cfg().contains_flag(candidate, BlockFlags::EXC_HANDLER) {
        return false;
    }
    if b.cfg().term_kind(candidate) != crate::cfg::TermKind::If {
        return false;
    }

    let loop_end = b.loops().end(loop_id);
    let same_loop = b
        .cfg()
        .loop_for_block(candidate)
        .is_some_and(|c| c == loop_id)
        || candidate == header
        || candidate == loop_end;
    if !same_loop {
        return false;
    }

    let reaches_start = candidate == header
        || candidate == loop_end
        || b.cfg().is_empty_simple_path(header, candidate)
        || check_pre_condition(b, header, candidate);
    if !reaches_start {
        return false;
    }

    let in_multiple_loops = b.cfg().all_loops_for_block(candidate).len() >= 2;
    if in_multiple_loops {
        let all_leave = b
            .cfg()
            .clean_successors(candidate)
            .iter()
            .all(|succ| !b.loops().contains_block(loop_id, *succ));
        if all_leave {
            return false;
        }
    }

    check_loop_exits(b, loop_id, candidate)
}

/// `checkPreCondition`: is `candidate` a direct successor of `header` that
/// can serve as a pre-condition test run unconditionally before the loop
/// proper, i.e. `header` itself has no other real instructions?
fn check_pre_condition<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
    candidate: BlockId,
) -> bool
where
    C: CfgView,
{
    b.cfg().successors(header).contains(&candidate) && header != candidate
}

/// `checkLoopExits`: when a loop has multiple exit edges, every secondary
/// exit target must either walk an equal path to the main exit, or must not
/// cross it.
fn check_loop_exits<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    candidate: BlockId,
) -> bool
where
    C: CfgView,
    L: LoopView,
{
    let exit_edges = b.loops().exit_edges(loop_id);
    if exit_edges.len() <= 1 {
        return true;
    }
    let main_target = b.cfg().skip_synthetic_successor(candidate);
    exit_edges.iter().all(|edge| {
        let target = b.cfg().skip_synthetic_successor(edge.to);
        if target == main_target {
            return true;
        }
        b.cfg().get_path_cross(target, main_target).is_none()
    })
}

fn build_condition_at_end_body<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
    loop_end: BlockId,
    exit_blocks: &mut Vec<BlockId>,
) -> Result<(Region, Option<BlockId>, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    b.cfg().add_flag(loop_end, BlockFlags::ADDED_TO_REGION);
    let saved = b.cfg().take_loop_attr(header);
    b.mark_unprocessed(header);

    b.stack_mut().push();
    b.stack_mut().add_exit(loop_end);
    let body = b.build(header);
    b.stack_mut().pop();

    if let Some(loop_attr) = saved {
        b.cfg().restore_loop_attr(header, loop_attr);
    }

    insert_continue(b, loop_id, loop_end);

    exit_blocks.retain(|block| *block != loop_end);
    let out = b.cfg().next_block(loop_end);
    Ok((body?, None, out))
}

fn build_condition_at_start_body<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
    info: &crate::IfInfo,
    exit_blocks: &mut Vec<BlockId>,
) -> Result<(Region, Option<BlockId>, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let pre_condition_block = (header != info.if_block).then_some(header);
    let path_blocks = if header != info.if_block {
        b.cfg().simple_path_blocks(header, info.if_block)
    } else {
        Vec::new()
    };

    let reenters_outer_loop = b
        .cfg()
        .loop_for_block(info.else_block)
        .is_some_and(|outer| outer != loop_id && b.is_processed(info.else_block));
    let out = if reenters_outer_loop {
        None
    } else {
        Some(info.else_block)
    };
    if let Some(out) = out {
        exit_blocks.retain(|block| *block != out);
    }

    b.stack_mut().push();
    if let Some(out) = out {
        b.stack_mut().add_exit(out);
    }
    let body = b.build(info.then_block);
    b.stack_mut().pop();

    insert_continue(b, loop_id, b.loops().end(loop_id));

    let body = merge_pre_condition_path(body?, path_blocks);
    Ok((body, pre_condition_block, out))
}

/// Splices the instruction-empty blocks sitting between a condition-at-start
/// loop's header and its (non-header) condition header into the recursed
/// body, as plain leading items.
fn merge_pre_condition_path(body: Region, path_blocks: Vec<BlockId>) -> Region {
    if path_blocks.is_empty() {
        return body;
    }
    let mut items: Vec<RegionItem> = path_blocks.into_iter().map(RegionItem::Block).collect();
    match body {
        Region::Sequence(mut body_items) => {
            items.append(&mut body_items);
            Region::Sequence(items)
        }
        other => {
            items.push(RegionItem::Region(other.boxed()));
            Region::Sequence(items)
        }
    }
}

/// `insertContinue`: append a synthesized `CONTINUE` to synthetic
/// predecessors of `loop.end` that aren't already placed, aren't dominated
/// by `loop.end`, aren't themselves exit nodes, aren't dominated by every
/// predecessor of `loop.end`, and from which a loop exit is reachable.
fn insert_continue<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    loop_end: BlockId,
) where
    C: CfgView,
    L: LoopView,
{
    let preds: Vec<BlockId> = b.cfg().predecessors(loop_end).to_vec();
    let exit_nodes = b.loops().exit_nodes(loop_id);

    for pred in b.cfg().predecessors(loop_end).to_vec() {
        if !b.cfg().contains_flag(pred, BlockFlags::SYNTHETIC) {
            continue;
        }
        let Some(code_pred) = b.cfg().predecessors(pred).first().copied() else {
            continue;
        };
        if b.is_processed(code_pred) {
            continue;
        }
        if b.cfg().is_dominator(loop_end, code_pred) {
            continue;
        }
        if exit_nodes.contains(&code_pred) {
            continue;
        }
        if preds.iter().all(|p| b.cfg().is_dominator(*p, code_pred)) {
            continue;
        }
        let exit_reachable = exit_nodes
            .iter()
            .any(|exit| b.cfg().is_path_exists(code_pred, *exit));
        if !exit_reachable {
            continue;
        }

        b.cfg()
            .add_edge_insn(Edge::new(code_pred, pred), EdgeInsnKind::Continue, None);
    }
}

/// Endless-loop fallback (`makeEndlessLoop`), used when no condition header
/// could be found.
fn make_endless_loop<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    header: BlockId,
) -> Result<(Region, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let exit_edges: Vec<Edge> = b.loops().exit_edges(loop_id).to_vec();
    let loop_end = b.loops().end(loop_id);

    let mut out = None;
    b.stack_mut().push();
    if exit_edges.len() == 1 {
        let edge = exit_edges[0];
        if insert_loop_break(b, loop_id, edge.to, edge)? {
            out = b.cfg().next_block(edge.to);
        }
    } else {
        for edge in &exit_edges {
            for candidate in b.cfg().dom_frontier(edge.to).iter().collect::<Vec<_>>() {
                if !b.cfg().is_path_exists(edge.to, candidate) {
                    continue;
                }
                b.stack_mut().add_exit(candidate);
                if insert_loop_break(b, loop_id, candidate, *edge)? {
                    out = Some(candidate);
                }
            }
        }
    }

    // The header was already marked processed by the dispatcher before it
    // recognized this as a loop; clear it (and detach
    // the `Loop` attribute, so the header doesn't immediately re-trigger
    // loop recognition) so it can legitimately reappear in its own body,
    // then restore both once the body is built.
    let saved_loop_attr = b.cfg().take_loop_attr(header);
    b.mark_unprocessed(header);
    let mut body = b.build(header)?;
    if let Some(loop_attr) = saved_loop_attr {
        b.cfg().restore_loop_attr(header, loop_attr);
    }
    b.stack_mut().pop();

    if !b.is_processed(loop_end) {
        let in_handler = b.cfg().contains_flag(loop_end, BlockFlags::EXC_HANDLER);
        if !in_handler {
            if let Region::Sequence(items) = &mut body {
                items.push(RegionItem::Block(loop_end));
            }
            b.processed.insert(loop_end);
        }
    }

    if out.is_none() {
        let after_end = b.cfg().next_block(loop_end);
        out = after_end.filter(|block| !b.is_processed(*block));
    }

    let region = Region::Loop(LoopRegion {
        loop_id,
        body: body.boxed(),
        condition: None,
        position: LoopPosition::ConditionAtStart,
        pre_condition_block: None,
    });
    Ok((region, out))
}

/// `insertLoopBreak`. Returns `true` if a `break` edge instruction was
/// inserted.
fn insert_loop_break<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    loop_exit: BlockId,
    exit_edge: Edge,
) -> Result<bool, RegionBuildError>
where
    C: CfgView,
    L: LoopView,
{
    // Special case: the exit edge's source is a catch block whose other
    // successor leads into an exception handler.
    if loop_exit == exit_edge.to && b.cfg().contains_flag(exit_edge.from, BlockFlags::CATCH_BLOCK) {
        let other_leads_to_handler = b
            .cfg()
            .successors(exit_edge.from)
            .iter()
            .any(|succ| *succ != exit_edge.to && b.cfg().contains_flag(*succ, BlockFlags::EXC_HANDLER));
        if other_leads_to_handler {
            return Ok(insert_break_on(b, loop_id, exit_edge.from, exit_edge));
        }
    }

    let mut insert_block = exit_edge.to;
    loop {
        if can_insert_break(b, insert_block) && b.cfg().is_path_exists(insert_block, loop_exit) {
            let succ = match b.cfg().clean_successors(insert_block).first().copied() {
                Some(s) => s,
                None => return Ok(false),
            };
            let edge = Edge::new(insert_block, succ);
            return Ok(insert_break_on(b, loop_id, insert_block, edge));
        }
        let succs = b.cfg().clean_successors(insert_block);
        if succs.len() != 1 {
            return Ok(false);
        }
        insert_block = succs[0];
        if insert_block == exit_edge.to {
            return Ok(false);
        }
    }
}

/// Forbidden-insertion conditions for a break candidate block.
fn can_insert_break<C, L, M, R>(b: &RegionBuilder<'_, C, L, M, R>, block: BlockId) -> bool
where
    C: CfgView,
{
    if b.cfg().contains_flag(block, BlockFlags::RETURN) {
        return false;
    }
    if b.cfg().term_kind(block) == crate::cfg::TermKind::Break {
        return false;
    }

    let mut cursor = block;
    loop {
        match b.cfg().term_kind(cursor) {
            crate::cfg::TermKind::Return => return false,
            crate::cfg::TermKind::Switch => return false,
            _ => {}
        }
        let succs = b.cfg().clean_successors(cursor);
        if succs.len() != 1 {
            break;
        }
        cursor = succs[0];
    }

    entry_walk_has_no_switch(b, block)
}

/// `canInsertBreak`'s global walk from the method entry: no block on the
/// path from entry to `block` may end with a `SWITCH` (avoids ambiguity
/// with a switch's own `break`). Implemented as a direct reachability walk
/// per candidate, per `SPEC_FULL.md`'s resolution of this open question.
fn entry_walk_has_no_switch<C, L, M, R>(b: &RegionBuilder<'_, C, L, M, R>, block: BlockId) -> bool
where
    C: CfgView,
{
    let entry = b.cfg().entry_block();
    for candidate in b.cfg().blocks() {
        if b.cfg().term_kind(*candidate) == crate::cfg::TermKind::Switch
            && b.cfg().is_path_exists(entry, *candidate)
            && b.cfg().is_path_exists(*candidate, block)
        {
            return false;
        }
    }
    true
}

fn insert_break_on<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    insert_block: BlockId,
    edge: Edge,
) -> bool
where
    C: CfgView,
    L: LoopView,
{
    let label = label_for_break(b, loop_id, insert_block, edge);
    b.cfg().add_edge_insn(edge, EdgeInsnKind::Break, label);
    b.cfg().add_flag(insert_block, BlockFlags::ADDED_TO_REGION);
    b.stack_mut().add_exit(insert_block);
    true
}

/// Adds a [`LoopLabelAttr`] when the break would otherwise be ambiguous
/// about which loop it exits: the source sits in ≥2 loops, the outermost
/// parent has no parent of its own, and the crossing exit is neither the
/// parent's end nor one of its exit nodes.
fn label_for_break<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    loop_id: LoopId,
    source: BlockId,
    edge: Edge,
) -> Option<LoopLabelAttr>
where
    C: CfgView,
    L: LoopView,
{
    if b.cfg().all_loops_for_block(source).len() < 2 {
        return None;
    }
    let mut outer = loop_id;
    while let Some(parent) = b.loops().parent_loop(outer) {
        outer = parent;
    }
    if b.loops().parent_loop(outer).is_some() {
        return None;
    }
    let crosses_parent_boundary =
        edge.to != b.loops().end(outer) && !b.loops().exit_nodes(outer).contains(&edge.to);
    if crosses_parent_boundary {
        Some(LoopLabelAttr(loop_id))
    } else {
        None
    }
}
