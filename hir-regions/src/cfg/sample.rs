//! A reference [`CfgView`]/[`LoopView`] implementation, used only by this
//! crate's own tests. Builds a fixed basic-block graph from a literal list
//! of edges, computes dominance (via `petgraph`) and dominance frontiers
//! (Cooper/Harvey/Kennedy), and detects natural loops from back edges.
//!
//! Not meant as a template for a production CFG — a real frontend already
//! has this information lying around from lowering; this exists purely to
//! drive the round-trip scenarios in the crate's test suite.

use alloc::{string::String, vec, vec::Vec};
use core::cell::{Cell, RefCell};

use cranelift_entity::EntityRef;
use petgraph::{algo::dominators, graph::DiGraph};
use smallvec::SmallVec;

use crate::{
    BlockFlags, CaseKey, Edge, EdgeInsnKind, FxHashMap, LoopLabelAttr,
    cfg::{BlockId, BlockSet, CfgView, ExcHandler, ExcHandlerId, LoopId, LoopView, MonitorArg,
        TermKind},
};

#[derive(Debug, Default, Clone)]
struct LoopData {
    header: BlockId,
    end: BlockId,
    members: BlockSet,
    exit_edges: Vec<Edge>,
    exit_nodes: Vec<BlockId>,
    parent: Option<LoopId>,
}

/// A small, fully in-memory CFG fixture.
pub struct SampleCfg {
    blocks: Vec<BlockId>,
    succs: Vec<SmallVec<[BlockId; 4]>>,
    preds: Vec<SmallVec<[BlockId; 4]>>,
    term: Vec<TermKind>,
    flags: Vec<Cell<BlockFlags>>,
    method_flags: Cell<BlockFlags>,
    monitor_arg: Vec<Option<MonitorArg>>,
    switch_cases: Vec<Vec<(CaseKey, BlockId)>>,
    switch_default: Vec<Option<BlockId>>,
    entry: BlockId,
    idom: Vec<Option<BlockId>>,
    dom_frontier: Vec<BlockSet>,
    loop_for_block: Vec<SmallVec<[LoopId; 2]>>,
    loops: Vec<LoopData>,
    exc_handlers: Vec<ExcHandler>,
    edge_insns: RefCell<FxHashMap<Edge, (EdgeInsnKind, Option<LoopLabelAttr>)>>,
    warnings: RefCell<Vec<String>>,
}

impl SampleCfg {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub fn edge_insn(&self, edge: Edge) -> Option<(EdgeInsnKind, Option<LoopLabelAttr>)> {
        self.edge_insns.borrow().get(&edge).copied()
    }

    pub fn method_flags(&self) -> BlockFlags {
        self.method_flags.get()
    }

    fn is_real(&self, block: BlockId) -> bool {
        !self.contains_flag(block, BlockFlags::SYNTHETIC)
    }
}

impl CfgView for SampleCfg {
    fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    fn entry_block(&self) -> BlockId {
        self.entry
    }

    fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.preds[block.index()]
    }

    fn successors(&self, block: BlockId) -> &[BlockId] {
        &self.succs[block.index()]
    }

    fn clean_successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.succs[block.index()]
            .iter()
            .copied()
            .filter(|succ| !self.is_dominator(*succ, block))
            .collect()
    }

    fn dom_frontier(&self, block: BlockId) -> &BlockSet {
        &self.dom_frontier[block.index()]
    }

    fn is_dominator(&self, dominator: BlockId, other: BlockId) -> bool {
        let mut cursor = other;
        loop {
            if cursor == dominator {
                return true;
            }
            match self.idom[cursor.index()] {
                Some(next) if next != cursor => cursor = next,
                _ => return false,
            }
        }
    }

    fn term_kind(&self, block: BlockId) -> TermKind {
        self.term[block.index()]
    }

    fn switch_cases(&self, block: BlockId) -> &[(CaseKey, BlockId)] {
        &self.switch_cases[block.index()]
    }

    fn switch_default(&self, block: BlockId) -> BlockId {
        self.switch_default[block.index()].unwrap_or(block)
    }

    fn monitor_arg(&self, block: BlockId) -> Option<MonitorArg> {
        self.monitor_arg[block.index()]
    }

    fn contains_flag(&self, block: BlockId, flag: BlockFlags) -> bool {
        self.flags[block.index()].get().contains(flag)
    }

    fn add_flag(&self, block: BlockId, flag: BlockFlags) {
        let cell = &self.flags[block.index()];
        cell.set(cell.get() | flag);
    }

    fn remove_flag(&self, block: BlockId, flag: BlockFlags) {
        let cell = &self.flags[block.index()];
        cell.set(cell.get() & !flag);
    }

    fn exception_handlers(&self) -> &[ExcHandler] {
        &self.exc_handlers
    }

    fn add_warn(&self, message: &str) {
        self.warnings.borrow_mut().push(String::from(message));
    }

    fn add_method_flag(&self, flag: BlockFlags) {
        self.method_flags.set(self.method_flags.get() | flag);
    }

    fn loop_for_block(&self, block: BlockId) -> Option<LoopId> {
        self.loop_for_block[block.index()].first().copied()
    }

    fn all_loops_for_block(&self, block: BlockId) -> SmallVec<[LoopId; 2]> {
        self.loop_for_block[block.index()].clone()
    }

    fn take_loop_attr(&self, block: BlockId) -> Option<LoopId> {
        let had = self.contains_flag(block, BlockFlags::LOOP_START);
        self.remove_flag(block, BlockFlags::LOOP_START);
        had.then(|| self.loop_for_block(block)).flatten()
    }

    fn restore_loop_attr(&self, block: BlockId, _loop_id: LoopId) {
        self.add_flag(block, BlockFlags::LOOP_START);
    }

    fn next_block(&self, block: BlockId) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| *b == block)
            .and_then(|idx| self.blocks.get(idx + 1))
            .copied()
    }

    fn skip_synthetic_successor(&self, block: BlockId) -> BlockId {
        let mut cursor = block;
        loop {
            if self.is_real(cursor) {
                return cursor;
            }
            match self.succs[cursor.index()].first().copied() {
                Some(next) if next != cursor => cursor = next,
                _ => return cursor,
            }
        }
    }

    fn is_path_exists(&self, from: BlockId, to: BlockId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = BlockSet::with_capacity(self.blocks.len());
        let mut stack = vec![from];
        while let Some(block) = stack.pop() {
            if visited.contains(block) {
                continue;
            }
            visited.insert(block);
            for succ in &self.succs[block.index()] {
                if *succ == to {
                    return true;
                }
                stack.push(*succ);
            }
        }
        false
    }

    fn get_path_cross(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        if a == b {
            return None;
        }
        let reachable_from = |start: BlockId| -> BlockSet {
            let mut visited = BlockSet::with_capacity(self.blocks.len());
            let mut stack = vec![start];
            while let Some(block) = stack.pop() {
                if visited.contains(block) {
                    continue;
                }
                visited.insert(block);
                for succ in &self.succs[block.index()] {
                    stack.push(*succ);
                }
            }
            visited
        };
        let from_a = reachable_from(a);
        let from_b = reachable_from(b);
        self.blocks
            .iter()
            .copied()
            .find(|block| *block != a && *block != b && from_a.contains(*block) && from_b.contains(*block))
    }

    fn is_empty_simple_path(&self, from: BlockId, to: BlockId) -> bool {
        if from == to {
            return true;
        }
        let mut cursor = from;
        loop {
            if !self.is_real(cursor) && cursor != from {
                // synthetic blocks carry no real instructions
            } else if cursor != from {
                return false;
            }
            match self.succs[cursor.index()].as_slice() {
                [only] if *only == to => return true,
                [only] => cursor = *only,
                _ => return false,
            }
        }
    }

    fn simple_path_blocks(&self, from: BlockId, to: BlockId) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        if from == to {
            return blocks;
        }
        let mut cursor = from;
        loop {
            match self.succs[cursor.index()].as_slice() {
                [only] if *only == to => return blocks,
                [only] => {
                    blocks.push(*only);
                    cursor = *only;
                }
                _ => return blocks,
            }
        }
    }

    fn add_edge_insn(&self, edge: Edge, kind: EdgeInsnKind, label: Option<LoopLabelAttr>) {
        self.edge_insns.borrow_mut().insert(edge, (kind, label));
    }

    fn has_edge_insn(&self, edge: Edge) -> bool {
        self.edge_insns.borrow().contains_key(&edge)
    }
}

/// Loop metadata for a [`SampleCfg`] built alongside it.
pub struct SampleLoops {
    loops: Vec<LoopData>,
}

impl LoopView for SampleLoops {
    fn header(&self, loop_id: LoopId) -> BlockId {
        self.loops[loop_id.index()].header
    }

    fn end(&self, loop_id: LoopId) -> BlockId {
        self.loops[loop_id.index()].end
    }

    fn contains_block(&self, loop_id: LoopId, block: BlockId) -> bool {
        self.loops[loop_id.index()].members.contains(block)
    }

    fn exit_edges(&self, loop_id: LoopId) -> &[Edge] {
        &self.loops[loop_id.index()].exit_edges
    }

    fn exit_nodes(&self, loop_id: LoopId) -> &[BlockId] {
        &self.loops[loop_id.index()].exit_nodes
    }

    fn parent_loop(&self, loop_id: LoopId) -> Option<LoopId> {
        self.loops[loop_id.index()].parent
    }
}

/// Builds a [`SampleCfg`]/[`SampleLoops`] pair from a literal block/edge
/// list — enough to express the round-trip scenarios in the crate's tests.
#[derive(Default)]
pub struct SampleCfgBuilder {
    num_blocks: usize,
    edges: Vec<(BlockId, BlockId)>,
    term: FxHashMap<BlockId, TermKind>,
    flags: FxHashMap<BlockId, BlockFlags>,
    monitor_arg: FxHashMap<BlockId, MonitorArg>,
    switch_cases: FxHashMap<BlockId, Vec<(CaseKey, BlockId)>>,
    switch_default: FxHashMap<BlockId, BlockId>,
    handlers: Vec<(BlockId, Vec<BlockId>, bool)>,
}

impl SampleCfgBuilder {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            num_blocks,
            ..Self::default()
        }
    }

    pub fn edge(mut self, from: u32, to: u32) -> Self {
        self.edges.push((BlockId::from_u32(from), BlockId::from_u32(to)));
        self
    }

    pub fn term(mut self, block: u32, kind: TermKind) -> Self {
        self.term.insert(BlockId::from_u32(block), kind);
        self
    }

    pub fn flag(mut self, block: u32, flag: BlockFlags) -> Self {
        *self.flags.entry(BlockId::from_u32(block)).or_default() |= flag;
        self
    }

    pub fn monitor(mut self, block: u32, arg: u32) -> Self {
        self.monitor_arg.insert(BlockId::from_u32(block), MonitorArg(arg));
        self
    }

    pub fn switch(mut self, block: u32, cases: Vec<(CaseKey, u32)>, default: u32) -> Self {
        let block_id = BlockId::from_u32(block);
        self.switch_cases.insert(
            block_id,
            cases.into_iter().map(|(k, t)| (k, BlockId::from_u32(t))).collect(),
        );
        self.switch_default.insert(block_id, BlockId::from_u32(default));
        self
    }

    pub fn handler(mut self, handler_block: u32, try_blocks: Vec<u32>, is_finally: bool) -> Self {
        self.handlers.push((
            BlockId::from_u32(handler_block),
            try_blocks.into_iter().map(BlockId::from_u32).collect(),
            is_finally,
        ));
        self
    }

    pub fn build(self) -> (SampleCfg, SampleLoops) {
        let blocks: Vec<BlockId> = (0..self.num_blocks as u32).map(BlockId::from_u32).collect();
        let mut succs = vec![SmallVec::new(); self.num_blocks];
        let mut preds = vec![SmallVec::new(); self.num_blocks];
        for (from, to) in &self.edges {
            succs[from.index()].push(*to);
            preds[to.index()].push(*from);
        }

        let mut graph = DiGraph::<(), ()>::new();
        let nodes: Vec<_> = (0..self.num_blocks).map(|_| graph.add_node(())).collect();
        for (from, to) in &self.edges {
            graph.add_edge(nodes[from.index()], nodes[to.index()], ());
        }
        let entry = BlockId::from_u32(0);
        let dom_result = dominators::simple_fast(&graph, nodes[entry.index()]);

        let mut idom = vec![None; self.num_blocks];
        for block in &blocks {
            if *block == entry {
                continue;
            }
            if let Some(idom_node) = dom_result.immediate_dominator(nodes[block.index()]) {
                let idom_idx = nodes.iter().position(|n| *n == idom_node).unwrap();
                idom[block.index()] = Some(BlockId::from_u32(idom_idx as u32));
            }
        }

        let dom_frontier = compute_dominance_frontiers(&blocks, &preds, &idom);

        let term: Vec<TermKind> = blocks
            .iter()
            .map(|b| self.term.get(b).copied().unwrap_or(TermKind::Plain))
            .collect();
        let flags: Vec<Cell<BlockFlags>> = blocks
            .iter()
            .map(|b| Cell::new(self.flags.get(b).copied().unwrap_or_default()))
            .collect();
        let monitor_arg: Vec<Option<MonitorArg>> =
            blocks.iter().map(|b| self.monitor_arg.get(b).copied()).collect();
        let switch_cases: Vec<Vec<(CaseKey, BlockId)>> = blocks
            .iter()
            .map(|b| self.switch_cases.get(b).cloned().unwrap_or_default())
            .collect();
        let switch_default: Vec<Option<BlockId>> =
            blocks.iter().map(|b| self.switch_default.get(b).copied()).collect();

        let exc_handlers: Vec<ExcHandler> = self
            .handlers
            .iter()
            .enumerate()
            .map(|(idx, (handler_block, try_blocks, is_finally))| ExcHandler {
                id: ExcHandlerId::from_u32(idx as u32),
                handler_block: *handler_block,
                try_blocks: SmallVec::from_vec(try_blocks.clone()),
                is_finally: *is_finally,
            })
            .collect();

        let is_dominator = |dominator: BlockId, other: BlockId| -> bool {
            let mut cursor = other;
            loop {
                if cursor == dominator {
                    return true;
                }
                match idom[cursor.index()] {
                    Some(next) if next != cursor => cursor = next,
                    _ => return false,
                }
            }
        };

        let (loops, loop_for_block) =
            detect_natural_loops(&blocks, &succs, &preds, &idom, is_dominator);

        let cfg = SampleCfg {
            blocks: blocks.clone(),
            succs,
            preds,
            term,
            flags,
            method_flags: Cell::new(BlockFlags::empty()),
            monitor_arg,
            switch_cases,
            switch_default,
            entry,
            idom,
            dom_frontier,
            loop_for_block,
            loops: loops.clone(),
            exc_handlers,
            edge_insns: RefCell::new(FxHashMap::default()),
            warnings: RefCell::new(Vec::new()),
        };
        let loop_view = SampleLoops { loops };
        (cfg, loop_view)
    }
}

/// Cooper/Harvey/Kennedy dominance-frontier computation.
fn compute_dominance_frontiers(
    blocks: &[BlockId],
    preds: &[SmallVec<[BlockId; 4]>],
    idom: &[Option<BlockId>],
) -> Vec<BlockSet> {
    let mut frontier = vec![BlockSet::with_capacity(blocks.len()); blocks.len()];
    for block in blocks {
        let block_preds = &preds[block.index()];
        if block_preds.len() < 2 {
            continue;
        }
        for pred in block_preds {
            let mut runner = *pred;
            while Some(runner) != idom[block.index()] {
                frontier[runner.index()].insert(*block);
                match idom[runner.index()] {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }
    frontier
}

/// Detects natural loops from back edges (an edge whose target dominates
/// its source). Loops sharing a header are merged into one [`LoopData`].
fn detect_natural_loops(
    blocks: &[BlockId],
    succs: &[SmallVec<[BlockId; 4]>],
    preds: &[SmallVec<[BlockId; 4]>],
    idom: &[Option<BlockId>],
    is_dominator: impl Fn(BlockId, BlockId) -> bool,
) -> (Vec<LoopData>, Vec<SmallVec<[LoopId; 2]>>) {
    let _ = idom;
    let mut by_header: FxHashMap<BlockId, LoopData> = FxHashMap::default();
    let mut header_order: Vec<BlockId> = Vec::new();

    for block in blocks {
        for succ in &succs[block.index()] {
            if is_dominator(*succ, *block) {
                let header = *succ;
                let entry = by_header.entry(header).or_insert_with(|| {
                    header_order.push(header);
                    LoopData {
                        header,
                        end: *block,
                        members: BlockSet::with_capacity(blocks.len()),
                        exit_edges: Vec::new(),
                        exit_nodes: Vec::new(),
                        parent: None,
                    }
                });
                entry.members.insert(header);
                entry.members.insert(*block);

                // members = header plus everything that reaches `block`
                // without passing back through header.
                let mut stack = vec![*block];
                while let Some(b) = stack.pop() {
                    if entry.members.contains(b) {
                        continue;
                    }
                    entry.members.insert(b);
                    for pred in &preds[b.index()] {
                        if *pred != header && !entry.members.contains(*pred) {
                            stack.push(*pred);
                        }
                    }
                }
            }
        }
    }

    for header in &header_order {
        let data = by_header.get_mut(header).unwrap();
        let members = data.members.clone();
        let mut exit_edges = Vec::new();
        let mut exit_nodes = Vec::new();
        for member in members.iter() {
            for succ in &succs[member.index()] {
                if !members.contains(*succ) {
                    exit_edges.push(Edge::new(member, *succ));
                    if !exit_nodes.contains(succ) {
                        exit_nodes.push(*succ);
                    }
                }
            }
        }
        data.exit_edges = exit_edges;
        data.exit_nodes = exit_nodes;
    }

    let mut loops: Vec<LoopData> = header_order
        .iter()
        .map(|h| by_header.get(h).unwrap().clone())
        .collect();

    // Nesting: loop i's parent is the smallest enclosing loop whose member
    // set is a strict superset of loop i's.
    let ids: Vec<LoopId> = (0..loops.len() as u32).map(LoopId::from_u32).collect();
    for i in 0..loops.len() {
        let mut parent: Option<(usize, usize)> = None; // (index, member count)
        for j in 0..loops.len() {
            if i == j {
                continue;
            }
            let contains_header = loops[j].members.contains(loops[i].header);
            let is_superset = loops[j].members.len() > loops[i].members.len();
            if contains_header && is_superset {
                let better = parent.is_none_or(|(_, count)| loops[j].members.len() < count);
                if better {
                    parent = Some((j, loops[j].members.len()));
                }
            }
        }
        loops[i].parent = parent.map(|(j, _)| ids[j]);
    }

    let mut loop_for_block: Vec<SmallVec<[LoopId; 2]>> = vec![SmallVec::new(); blocks.len()];
    for block in blocks {
        for (idx, data) in loops.iter().enumerate() {
            if data.members.contains(*block) {
                loop_for_block[block.index()].push(ids[idx]);
            }
        }
        // innermost first: sort by member-set size ascending.
        loop_for_block[block.index()].sort_by_key(|id| loops[id.index()].members.len());
    }

    (loops, loop_for_block)
}
