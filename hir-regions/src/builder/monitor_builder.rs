//! Synchronized-section recognition.

use alloc::{vec, vec::Vec};

use smallvec::SmallVec;

use crate::{
    BlockFlags, BlockId, CfgView, ConditionMerger, InsnRemover, LoopView, Region,
    RegionBuildError, cfg::TermKind, region::SynchronizedRegion,
};

use super::RegionBuilder;

pub(super) fn build_synchronized<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
) -> Result<(Region, Option<BlockId>), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let lock_arg = b.cfg().monitor_arg(header);
    let exit_blocks = find_monitor_exits(b, header, lock_arg);

    for exit in &exit_blocks {
        b.cfg().add_flag(*exit, BlockFlags::DONT_GENERATE);
        b.cfg().add_flag(*exit, BlockFlags::REMOVE);
        b.remover().unbind_insn(b.cfg(), *exit, TermKind::MonitorExit);
    }

    let out = compute_common_out(b, &exit_blocks);

    b.stack_mut().push();
    if let Some(out) = out {
        b.stack_mut().add_exit(out);
    } else {
        for exit in &exit_blocks {
            if !ends_in_return(b, *exit) {
                b.stack_mut().add_exit(*exit);
            }
        }
    }

    let entry = b.cfg().clean_successors(header).first().copied();
    let mut body = match entry {
        Some(entry) => b.build(entry)?,
        None => Region::empty_sequence(),
    };
    b.stack_mut().pop();

    prepend_header(&mut body, header);

    let region = Region::Synchronized(SynchronizedRegion {
        header,
        body: body.boxed(),
        exit_blocks: SmallVec::from_vec(exit_blocks),
    });
    Ok((region, out))
}

fn prepend_header(body: &mut Region, header: BlockId) {
    if let Region::Sequence(items) = body {
        items.insert(0, crate::RegionItem::Block(header));
    }
}

/// DFS forward from the header collecting every block whose instruction
/// list contains a `MONITOR_EXIT` on the same lock argument.
fn find_monitor_exits<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    header: BlockId,
    lock_arg: Option<crate::cfg::MonitorArg>,
) -> Vec<BlockId>
where
    C: CfgView,
{
    let mut visited = Vec::new();
    let mut stack = vec![header];
    let mut exits = Vec::new();

    while let Some(block) = stack.pop() {
        if visited.contains(&block) {
            continue;
        }
        visited.push(block);

        if block != header
            && b.cfg().term_kind(block) == TermKind::MonitorExit
            && b.cfg().monitor_arg(block) == lock_arg
        {
            exits.push(block);
            continue;
        }

        for succ in b.cfg().clean_successors(block) {
            if !visited.contains(&succ) {
                stack.push(succ);
            }
        }
    }

    exits
}

/// If exactly one exit block, its successor is `out`; if several, find a
/// common point reachable from all exits via clean successors.
fn compute_common_out<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    exit_blocks: &[BlockId],
) -> Option<BlockId>
where
    C: CfgView,
{
    match exit_blocks {
        [] => None,
        [only] => b.cfg().clean_successors(*only).first().copied(),
        exits => reachable_from(b, exits[0])
            .into_iter()
            .find(|candidate| exits[1..].iter().all(|e| b.cfg().is_path_exists(*e, *candidate))),
    }
}

fn reachable_from<C, L, M, R>(b: &RegionBuilder<'_, C, L, M, R>, start: BlockId) -> Vec<BlockId>
where
    C: CfgView,
{
    let mut visited = Vec::new();
    let mut stack = vec![start];
    let mut order = Vec::new();
    while let Some(block) = stack.pop() {
        if visited.contains(&block) {
            continue;
        }
        visited.push(block);
        order.push(block);
        for succ in b.cfg().clean_successors(block) {
            stack.push(succ);
        }
    }
    order
}

fn ends_in_return<C, L, M, R>(b: &RegionBuilder<'_, C, L, M, R>, block: BlockId) -> bool
where
    C: CfgView,
{
    let mut cursor = block;
    loop {
        if b.cfg().contains_flag(cursor, BlockFlags::RETURN) {
            return true;
        }
        match b.cfg().clean_successors(cursor).first().copied() {
            Some(next) if next != cursor => cursor = next,
            _ => return false,
        }
    }
}
