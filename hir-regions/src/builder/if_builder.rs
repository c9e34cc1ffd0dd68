//! If/else recognition.

use alloc::vec::Vec;

use crate::{
    BlockId, CfgView, ConditionMerger, Edge, InsnRemover, LoopView, Region, RegionBuildError,
    RegionItem,
    region::{IfCondition, IfRegion},
};

use super::RegionBuilder;

/// Builds the `IfRegion` rooted at `block`. Returns `Ok(None)` when the
/// condition can't be restructured into a valid if/else — the caller then
/// treats `block` as an opaque plain block.
pub(super) fn build_if<C, L, M, R>(
    b: &mut RegionBuilder<'_, C, L, M, R>,
    block: BlockId,
) -> Result<Option<(Region, Option<BlockId>)>, RegionBuildError>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    let Some(mut info) = b.merger().make_if_info(b.cfg(), block) else {
        return Ok(None);
    };
    let merged = b.merger().merge_nested_if_nodes(b.cfg(), &mut info);
    if !merged {
        info = info.invert();
    }

    let mut restructured = b.merger().restructure_if(b.cfg(), block, &info);
    if restructured.is_none() && info.merged_headers.len() > 1 {
        let Some(mut fresh) = b.merger().make_if_info(b.cfg(), block) else {
            return Ok(None);
        };
        b.merger().merge_nested_if_nodes(b.cfg(), &mut fresh);
        restructured = b.merger().restructure_if(b.cfg(), block, &fresh);
        info = fresh;
    }
    let Some(restructured) = restructured else {
        return Ok(None);
    };

    b.merger().confirm_merge(b.cfg(), &info);

    let condition = IfCondition {
        if_block: info.if_block,
        merged_headers: info.merged_headers.clone(),
    };

    b.stack_mut().push();
    if let Some(out) = restructured.out_block {
        b.stack_mut().add_exit(out);
    }
    let then_region = b.build(restructured.then_block)?;
    b.stack_mut().pop();

    let has_real_else = restructured.out_block != Some(restructured.else_block);
    let mut else_region = if has_real_else {
        b.stack_mut().push();
        if let Some(out) = restructured.out_block {
            b.stack_mut().add_exit(out);
        }
        let region = b.build(restructured.else_block)?;
        b.stack_mut().pop();
        Some(region)
    } else {
        None
    };

    // No real else, but the out-block carries edge instructions originating
    // from one of this if's header blocks — synthesize a small else-region
    // so those edge-effects still get emitted on a branch.
    if else_region.is_none() {
        if let Some(out) = restructured.out_block {
            let origins: Vec<BlockId> = info
                .merged_headers
                .iter()
                .copied()
                .filter(|header| b.cfg().has_edge_insn(Edge::new(*header, out)))
                .collect();
            if !origins.is_empty() {
                else_region = Some(Region::Sequence(
                    origins.into_iter().map(RegionItem::Block).collect(),
                ));
            }
        }
    }

    let region = Region::If(IfRegion {
        condition,
        then_region: then_region.boxed(),
        else_region: else_region.map(Region::boxed),
    });
    Ok(Some((region, restructured.out_block)))
}
