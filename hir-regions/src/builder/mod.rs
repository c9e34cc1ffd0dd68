//! Entry point and dispatcher: [`RegionBuilder::build_method`] walks a
//! method's CFG and produces its root [`Region`], dispatching on each
//! block's last-instruction kind to the matching recognizer.

mod if_builder;
mod loop_builder;
mod monitor_builder;
mod switch_builder;
mod trycatch_builder;

#[cfg(test)]
mod tests;

use alloc::vec::Vec;

use crate::{
    BlockFlags, BlockId, CfgView, ConditionMerger, InsnRemover, LoopView, Region, RegionBuildError,
    RegionBuilderConfig, RegionItem,
    cfg::{BlockSet, TermKind},
    stack::RegionStack,
};

/// Drives region recognition for a single method body.
///
/// One instance per method — nothing in this crate's state is shared
/// across methods. `C` is the caller's CFG representation; `L` its loop
/// metadata; `M` its condition merger; `R` its instruction-unbinder.
pub struct RegionBuilder<'a, C, L, M, R> {
    cfg: &'a C,
    loops: &'a L,
    merger: &'a M,
    remover: &'a R,
    config: RegionBuilderConfig,
    processed: BlockSet,
    stack: RegionStack,
    regions_count: usize,
    region_limit: usize,
}

impl<'a, C, L, M, R> RegionBuilder<'a, C, L, M, R>
where
    C: CfgView,
    L: LoopView,
    M: ConditionMerger<C>,
    R: InsnRemover<C>,
{
    pub fn new(cfg: &'a C, loops: &'a L, merger: &'a M, remover: &'a R) -> Self {
        Self::with_config(cfg, loops, merger, remover, RegionBuilderConfig::default())
    }

    pub fn with_config(
        cfg: &'a C,
        loops: &'a L,
        merger: &'a M,
        remover: &'a R,
        config: RegionBuilderConfig,
    ) -> Self {
        let region_limit = config.region_limit(cfg.blocks_count());
        Self {
            cfg,
            loops,
            merger,
            remover,
            config,
            processed: BlockSet::with_capacity(cfg.blocks_count()),
            stack: RegionStack::new(),
            regions_count: 0,
            region_limit,
        }
    }

    pub fn config(&self) -> &RegionBuilderConfig {
        &self.config
    }

    /// Builds the root region for the whole method, starting at the entry
    /// block with an empty exit scope.
    pub fn build_method(&mut self) -> Result<Region, RegionBuildError> {
        let entry = self.cfg.entry_block();
        self.stack.push();
        let root = self.build(entry);
        self.stack.pop();
        let mut root = root?;

        // Exception handlers aren't reached by a normal body edge, so
        // they're attached to the method region once the main body is done.
        if let Region::Sequence(items) = &mut root {
            self.build_exception_handlers(items)?;
        }
        Ok(root)
    }

    fn count_region(&mut self) -> Result<(), RegionBuildError> {
        self.regions_count += 1;
        if self.regions_count > self.region_limit {
            return Err(RegionBuildError::Overflow {
                blocks: self.cfg.blocks_count(),
                limit: self.region_limit,
            });
        }
        Ok(())
    }

    /// Produces a sequential `Region` by repeatedly calling [`Self::traverse`]
    /// until a stack exit or end-of-graph is reached.
    pub(crate) fn build(&mut self, start: BlockId) -> Result<Region, RegionBuildError> {
        let mut items = Vec::new();
        let mut current = Some(start);
        while let Some(block) = current {
            if self.stack.contains_exit(block) {
                break;
            }
            if self.processed.contains(block) {
                log::warn!(target: "midenc_hir_regions", "refusing to re-enter already-processed block {block}");
                self.cfg
                    .add_warn("region builder: refusing to re-enter an already processed block");
                break;
            }
            current = self.traverse(block, &mut items)?;
        }
        Ok(Region::Sequence(items))
    }

    /// Recognizes and builds the region (if any) rooted at `block`, appends
    /// it (or the plain block) to `items`, and returns the next block the
    /// caller's sequence should continue from, if any.
    fn traverse(
        &mut self,
        block: BlockId,
        items: &mut Vec<RegionItem>,
    ) -> Result<Option<BlockId>, RegionBuildError> {
        self.processed.insert(block);

        if self.cfg.contains_flag(block, BlockFlags::LOOP_START)
            && self
                .cfg
                .loop_for_block(block)
                .is_some_and(|loop_id| self.loops.header(loop_id) == block)
        {
            let loop_id = self.cfg.loop_for_block(block).unwrap();
            self.count_region()?;
            let (region, next) = loop_builder::build_loop(self, loop_id, block)?;
            items.push(RegionItem::Region(region.boxed()));
            return Ok(next);
        }

        match self.cfg.term_kind(block) {
            TermKind::If => {
                if self.cfg.contains_flag(block, BlockFlags::ADDED_TO_REGION) {
                    let succ = self.cfg.successors(block);
                    return Ok(succ.first().copied());
                }
                self.count_region()?;
                match if_builder::build_if(self, block)? {
                    Some((region, next)) => {
                        items.push(RegionItem::Region(region.boxed()));
                        Ok(next)
                    }
                    None => {
                        items.push(RegionItem::Block(block));
                        Ok(self.cfg.clean_successors(block).first().copied())
                    }
                }
            }
            TermKind::Switch => {
                self.count_region()?;
                let (region, next) = switch_builder::build_switch(self, block)?;
                items.push(RegionItem::Region(region.boxed()));
                Ok(next)
            }
            TermKind::MonitorEnter => {
                self.count_region()?;
                let (region, next) = monitor_builder::build_synchronized(self, block)?;
                items.push(RegionItem::Region(region.boxed()));
                Ok(next)
            }
            TermKind::Return => {
                items.push(RegionItem::Block(block));
                Ok(None)
            }
            TermKind::Break | TermKind::Continue | TermKind::MonitorExit | TermKind::Plain => {
                items.push(RegionItem::Block(block));
                Ok(self.cfg.clean_successors(block).first().copied())
            }
        }
    }

    pub(crate) fn cfg(&self) -> &'a C {
        self.cfg
    }

    pub(crate) fn loops(&self) -> &'a L {
        self.loops
    }

    pub(crate) fn merger(&self) -> &'a M {
        self.merger
    }

    pub(crate) fn remover(&self) -> &'a R {
        self.remover
    }

    pub(crate) fn stack_mut(&mut self) -> &mut RegionStack {
        &mut self.stack
    }

    pub(crate) fn mark_unprocessed(&mut self, block: BlockId) {
        self.processed.remove(block);
    }

    pub(crate) fn is_processed(&self, block: BlockId) -> bool {
        self.processed.contains(block)
    }

    /// Handles the exception-handler region(s) attached to this method, once
    /// the main body has been built. Attaches the resulting try/catch and
    /// supplementary regions to `items`.
    pub fn build_exception_handlers(
        &mut self,
        items: &mut Vec<RegionItem>,
    ) -> Result<(), RegionBuildError> {
        trycatch_builder::build_all(self, items)
    }
}
