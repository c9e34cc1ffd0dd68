//! Try/catch recognition.
//!
//! Unlike the other recognizers this one isn't reached through
//! [`super::RegionBuilder::traverse`] — exception handlers aren't entered by
//! a normal CFG edge from the method body, so the method-level driver calls
//! [`build_all`] once after the main body region is built.

use alloc::vec::Vec;

use crate::{
    BlockId, CfgView, ConditionMerger, ExcHandler, InsnRemover, LoopView, Region,
    RegionBuildError, RegionItem,
    region::ExcHandlerRegion,
};

use super::RegionBuilder;

pub(super) fn build_all<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    items: &mut Vec<RegionItem>,
) -> Result<(), RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let handlers: Vec<ExcHandler> = b.cfg().exception_handlers().to_vec();
    if handlers.is_empty() {
        return Ok(());
    }

    let try_blocks = gather_try_blocks(&handlers);
    let exits = compute_splitter_exits(b, &try_blocks, &handlers);

    let mut handler_last_blocks = Vec::new();
    for handler in &handlers {
        if let Some((region, last_block)) = process_exc_handler(b, handler, &exits)? {
            handler_last_blocks.push(last_block);
            items.push(RegionItem::Region(region.boxed()));
        }
    }

    // Supplementary regions for blocks reachable from a handler's last
    // block that weren't claimed by any region.
    for last_block in handler_last_blocks {
        for succ in b.cfg().clean_successors(last_block) {
            if b.is_processed(succ) {
                continue;
            }
            b.stack_mut().push();
            let region = b.build(succ)?;
            b.stack_mut().pop();
            if !region.is_empty() {
                items.push(RegionItem::Region(region.boxed()));
            }
        }
    }

    Ok(())
}

fn gather_try_blocks(handlers: &[ExcHandler]) -> Vec<BlockId> {
    let mut blocks = Vec::new();
    for handler in handlers {
        for block in &handler.try_blocks {
            if !blocks.contains(block) {
                blocks.push(*block);
            }
        }
    }
    blocks
}

/// For each try-block, gather `splitters = ⋃ handler.predecessors`; for each
/// splitter, walk its first successor and compute the path-cross with each
/// handler, collecting non-trivial crosses as exit hints.
fn compute_splitter_exits<C, L, M, R>(
    b: &RegionBuilder<'_, C, L, M, R>,
    try_blocks: &[BlockId],
    handlers: &[ExcHandler],
) -> Vec<BlockId>
where
    C: CfgView,
{
    let mut exits = Vec::new();
    for handler in handlers {
        for splitter in b.cfg().predecessors(handler.handler_block) {
            if !try_blocks.contains(splitter) {
                continue;
            }
            let Some(ss) = b.cfg().successors(*splitter).first().copied() else {
                continue;
            };
            if let Some(cross) = b.cfg().get_path_cross(ss, handler.handler_block) {
                if cross != ss && cross != handler.handler_block && !exits.contains(&cross) {
                    exits.push(cross);
                }
            }
        }
    }
    exits
}

/// Chooses the dominator block (the associated splitter for `finally`, else
/// the handler block itself), collects dominance-frontier blocks already
/// inside the region as exit hints, and builds the handler region, wrapped
/// in an [`ExcHandlerRegion`] carrying the handler's id, try-blocks, and
/// `finally`-ness.
fn process_exc_handler<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    handler: &ExcHandler,
    exits: &[BlockId],
) -> Result<Option<(Region, BlockId)>, RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    if b.is_processed(handler.handler_block) {
        return Ok(None);
    }

    let dominator = if handler.is_finally {
        b.cfg()
            .predecessors(handler.handler_block)
            .iter()
            .copied()
            .find(|pred| handler.try_blocks.contains(pred))
            .unwrap_or(handler.handler_block)
    } else {
        handler.handler_block
    };

    b.stack_mut().push();
    for candidate in b.cfg().dom_frontier(dominator).iter() {
        if b.is_processed(candidate) {
            b.stack_mut().add_exit(candidate);
        }
    }
    for exit in exits {
        b.stack_mut().add_exit(*exit);
    }

    let region = b.build(handler.handler_block);
    b.stack_mut().pop();
    let region = region?;

    let last_block = last_block_of(&region).unwrap_or(handler.handler_block);
    let region = Region::ExceptionHandler(ExcHandlerRegion {
        id: handler.id,
        try_blocks: handler.try_blocks.clone(),
        is_finally: handler.is_finally,
        body: region.boxed(),
    });
    Ok(Some((region, last_block)))
}

fn last_block_of(region: &Region) -> Option<BlockId> {
    match region {
        Region::Sequence(items) => items.iter().rev().find_map(|item| match item {
            RegionItem::Block(block) => Some(*block),
            RegionItem::Region(region) => last_block_of(region),
        }),
        Region::Loop(r) => last_block_of(&r.body),
        Region::If(r) => r
            .else_region
            .as_deref()
            .and_then(last_block_of)
            .or_else(|| last_block_of(&r.then_region)),
        Region::Switch(r) => r
            .default
            .as_deref()
            .and_then(last_block_of)
            .or_else(|| r.cases.last().and_then(|c| last_block_of(&c.region))),
        Region::Synchronized(r) => last_block_of(&r.body),
        Region::ExceptionHandler(r) => last_block_of(&r.body),
    }
}
