use alloc::vec::Vec;

use cranelift_entity::EntityRef;
use pretty_assertions::assert_eq;

use crate::{
    BlockFlags, BlockId, Region, RegionItem,
    cfg::NullInsnRemover,
    cfg::{TermKind, sample::SampleCfgBuilder},
    condition::SimpleConditionMerger,
};

use super::RegionBuilder;

fn b(id: u32) -> BlockId {
    BlockId::from_u32(id)
}

/// Collects every [`BlockId`] that appears directly as a [`RegionItem::Block`]
/// anywhere in `region`, depth-first.
fn blocks_of(region: &Region) -> Vec<BlockId> {
    let mut out = Vec::new();
    collect(region, &mut out);
    out
}

fn collect(region: &Region, out: &mut Vec<BlockId>) {
    match region {
        Region::Sequence(items) => {
            for item in items {
                match item {
                    RegionItem::Block(block) => out.push(*block),
                    RegionItem::Region(region) => collect(region, out),
                }
            }
        }
        Region::Loop(r) => collect(&r.body, out),
        Region::If(r) => {
            collect(&r.then_region, out);
            if let Some(else_region) = &r.else_region {
                collect(else_region, out);
            }
        }
        Region::Switch(r) => {
            for case in &r.cases {
                collect(&case.region, out);
            }
            if let Some(default) = &r.default {
                collect(default, out);
            }
        }
        Region::Synchronized(r) => collect(&r.body, out),
        Region::ExceptionHandler(r) => collect(&r.body, out),
    }
}

/// A `while` loop whose condition sits in the header itself.
#[test]
fn simple_while() {
    let (cfg, loops) = SampleCfgBuilder::new(4)
        .edge(0, 1)
        .edge(1, 2)
        .edge(2, 1)
        .edge(1, 3)
        .term(1, TermKind::If)
        .flag(1, BlockFlags::LOOP_START)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 3, "expected [Block0, Loop, Block3], got {items:?}");
    assert!(matches!(items[0], RegionItem::Block(block) if block == b(0)));
    let RegionItem::Region(loop_region) = &items[1] else {
        panic!("second item is not a region");
    };
    let Region::Loop(loop_region) = loop_region.as_ref() else {
        panic!("expected a loop region");
    };
    assert_eq!(loop_region.position, crate::LoopPosition::ConditionAtStart);
    let condition = loop_region.condition.as_ref().expect("while loop has a condition");
    assert_eq!(condition.if_block, b(1));
    assert_eq!(blocks_of(&loop_region.body), alloc::vec![b(2)]);
    assert!(matches!(items[2], RegionItem::Block(block) if block == b(3)));

    // The loop header keeps its `Loop` attribute.
    assert!(cfg.contains_flag(b(1), BlockFlags::LOOP_START));

    // No block appears twice in the tree.
    let mut seen = blocks_of(&root);
    seen.sort();
    let mut deduped = seen.clone();
    deduped.dedup();
    assert_eq!(seen, deduped, "a block was placed into the region tree twice");
}

/// A `do-while` loop whose condition sits in the back-edge tail block
/// (`loop.end`), so it isn't duplicated into the loop body — it's carried
/// by `LoopRegion::condition` instead.
#[test]
fn do_while() {
    let (cfg, loops) = SampleCfgBuilder::new(4)
        .edge(0, 1)
        .edge(1, 2)
        .edge(2, 1)
        .edge(2, 3)
        .term(2, TermKind::If)
        .flag(1, BlockFlags::LOOP_START)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0], RegionItem::Block(block) if block == b(0)));
    let RegionItem::Region(loop_region) = &items[1] else {
        panic!("second item is not a region");
    };
    let Region::Loop(loop_region) = loop_region.as_ref() else {
        panic!("expected a loop region");
    };
    assert_eq!(loop_region.position, crate::LoopPosition::ConditionAtEnd);
    let condition = loop_region.condition.as_ref().expect("do-while loop has a condition");
    assert_eq!(condition.if_block, b(2));
    assert_eq!(blocks_of(&loop_region.body), alloc::vec![b(1)]);
    assert!(matches!(items[2], RegionItem::Block(block) if block == b(3)));

    assert!(cfg.contains_flag(b(1), BlockFlags::LOOP_START));
}

/// An endless loop (no block qualifies as a condition header) whose single
/// exit edge gets a synthesized `break`. The break is attached one hop past
/// the exit target, at the first block forward from it that still has a
/// clean successor of its own (`insertLoopBreak`).
#[test]
fn endless_loop_with_break() {
    let (cfg, loops) = SampleCfgBuilder::new(6)
        .edge(0, 1)
        .edge(1, 2)
        .edge(2, 3)
        .edge(3, 1)
        .edge(3, 4)
        .edge(4, 5)
        .flag(1, BlockFlags::LOOP_START)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 3, "expected [Block0, Loop, Block5], got {items:?}");
    assert!(matches!(items[0], RegionItem::Block(block) if block == b(0)));
    let RegionItem::Region(loop_region) = &items[1] else {
        panic!("second item is not a region");
    };
    let Region::Loop(loop_region) = loop_region.as_ref() else {
        panic!("expected a loop region");
    };
    assert!(loop_region.condition.is_none(), "no block qualifies as a condition header");
    assert_eq!(blocks_of(&loop_region.body), alloc::vec![b(1), b(2), b(3)]);
    assert!(matches!(items[2], RegionItem::Block(block) if block == b(5)));

    let (kind, _label) = cfg
        .edge_insn(crate::Edge::new(b(4), b(5)))
        .expect("a break was synthesized past the loop's exit target");
    assert_eq!(kind, crate::EdgeInsnKind::Break);

    assert!(cfg.contains_flag(b(1), BlockFlags::LOOP_START));
}

/// An if/else whose branches rejoin at a common out-block.
#[test]
fn if_else_join() {
    let (cfg, loops) = SampleCfgBuilder::new(4)
        .edge(0, 1)
        .edge(0, 2)
        .edge(1, 3)
        .edge(2, 3)
        .term(0, TermKind::If)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 2, "expected [IfRegion, Block3], got {items:?}");
    let RegionItem::Region(if_region) = &items[0] else {
        panic!("first item is not a region");
    };
    let Region::If(if_region) = if_region.as_ref() else {
        panic!("expected an if region");
    };
    assert_eq!(if_region.condition.if_block, b(0));
    // The bundled `SimpleConditionMerger` never merges short-circuited
    // conditions, so the if-builder always inverts the unmerged condition
    // (the common compiler convention of emitting the negated test first) —
    // `then`/`else` end up swapped relative to the block's own successor
    // order.
    assert_eq!(blocks_of(&if_region.then_region), alloc::vec![b(2)]);
    let else_region = if_region.else_region.as_ref().expect("a real else branch exists");
    assert_eq!(blocks_of(else_region), alloc::vec![b(1)]);
    assert!(matches!(items[1], RegionItem::Block(block) if block == b(3)));
}

/// Two sequential if/else statements where the first one's out-block is
/// itself the second one's header. Building the first if must not mark its
/// out-block `ADDED_TO_REGION`, or the dispatcher would treat the second
/// if's header as already consumed by a nested-if merge and silently drop
/// the whole second if/else (then, else, and header) from the output tree.
#[test]
fn sequential_ifs() {
    let (cfg, loops) = SampleCfgBuilder::new(7)
        .edge(0, 1)
        .edge(0, 2)
        .edge(1, 3)
        .edge(2, 3)
        .edge(3, 4)
        .edge(3, 5)
        .edge(4, 6)
        .edge(5, 6)
        .term(0, TermKind::If)
        .term(3, TermKind::If)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(
        items.len(),
        3,
        "expected [IfRegion, IfRegion, Block6], got {items:?}"
    );

    let RegionItem::Region(first) = &items[0] else {
        panic!("first item is not a region");
    };
    let Region::If(first) = first.as_ref() else {
        panic!("expected an if region");
    };
    assert_eq!(first.condition.if_block, b(0));

    let RegionItem::Region(second) = &items[1] else {
        panic!("second item is not a region");
    };
    let Region::If(second) = second.as_ref() else {
        panic!("expected a second if region, the first if's out-block wrongly swallowed it");
    };
    assert_eq!(second.condition.if_block, b(3));
    let second_else = second.else_region.as_ref().expect("second if keeps a real else branch");
    assert_eq!(blocks_of(&second.then_region), alloc::vec![b(5)]);
    assert_eq!(blocks_of(second_else), alloc::vec![b(4)]);

    assert!(matches!(items[2], RegionItem::Block(block) if block == b(6)));

    // No block appears twice in the tree, in particular block 3 (the second
    // if's header) isn't silently dropped nor duplicated.
    let mut seen = blocks_of(&root);
    seen.sort();
    let mut deduped = seen.clone();
    deduped.dedup();
    assert_eq!(seen, deduped);
}

/// A switch with a genuine fallthrough case (case key 2's block flows
/// straight into case key 3's block with no intervening jump). The
/// dominance-frontier out-block heuristic picks case 3's own block (block 3)
/// as the switch's out-block rather than the farther common merge (block 5),
/// since block 3's successors already reach it — a known narrowing
/// imprecision. That pulls the common merge into the default case's body
/// instead of leaving it at the switch's own top level.
#[test]
fn switch_with_fallthrough() {
    let (cfg, loops) = SampleCfgBuilder::new(6)
        .edge(0, 1)
        .edge(0, 2)
        .edge(0, 3)
        .edge(0, 4)
        .edge(1, 5)
        .edge(2, 3)
        .edge(3, 5)
        .edge(4, 5)
        .term(0, TermKind::Switch)
        .switch(0, alloc::vec![(1, 1), (2, 2), (3, 3)], 4)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 2, "expected [SwitchRegion, Block3], got {items:?}");
    let RegionItem::Region(switch_region) = &items[0] else {
        panic!("first item is not a region");
    };
    let Region::Switch(switch_region) = switch_region.as_ref() else {
        panic!("expected a switch region");
    };
    assert_eq!(switch_region.header, b(0));
    assert_eq!(switch_region.cases.len(), 3);

    let case_1 = &switch_region.cases[0];
    assert_eq!(case_1.keys.as_slice(), &[1]);
    assert!(!case_1.fall_through);
    assert_eq!(blocks_of(&case_1.region), alloc::vec![b(1)]);

    let case_2 = &switch_region.cases[1];
    assert_eq!(case_2.keys.as_slice(), &[2]);
    assert!(case_2.fall_through, "case 2 flows straight into case 3's block");
    assert_eq!(blocks_of(&case_2.region), alloc::vec![b(2)]);
    assert!(cfg.contains_flag(b(2), BlockFlags::FALL_THROUGH));

    let case_3 = &switch_region.cases[2];
    assert_eq!(case_3.keys.as_slice(), &[3]);
    assert!(!case_3.fall_through);
    assert!(case_3.region.is_empty(), "case 3's own block doubles as the switch's out-block");

    // Block 4 (default) and block 5 (the real common merge) both end up
    // nested in the default region: the out-block (3) sits on the path from
    // 4 to 5, so the default case's walk reaches and absorbs 5 before
    // hitting the scope's exit.
    let default = switch_region.default.as_ref().expect("default case has a real body");
    assert_eq!(blocks_of(default), alloc::vec![b(4), b(5)]);

    assert!(matches!(items[1], RegionItem::Block(block) if block == b(3)));

    // No-block-twice still holds even though block 5 is reached twice in the
    // raw CFG (once via the default case, once via block 3 at the top
    // level) — the second visit must be refused, not duplicated.
    assert!(
        cfg.warnings().iter().any(|w| w.contains("already processed")),
        "expected a warning about refusing to re-enter block 5"
    );
}

/// A synchronized section whose body branches and rejoins before either of
/// its two `monitor-exit`s. The nested if/else inside the synchronized body
/// absorbs blocks 1-5; block 1 itself (the if's condition header) is
/// tracked via `IfCondition::if_block`, not as a `RegionItem`.
#[test]
fn synchronized_two_exits() {
    let (cfg, loops) = SampleCfgBuilder::new(7)
        .edge(0, 1)
        .edge(1, 2)
        .edge(1, 4)
        .edge(2, 3)
        .edge(4, 5)
        .edge(3, 6)
        .edge(5, 6)
        .term(0, TermKind::MonitorEnter)
        .term(1, TermKind::If)
        .term(3, TermKind::MonitorExit)
        .term(5, TermKind::MonitorExit)
        .monitor(0, 1)
        .monitor(3, 1)
        .monitor(5, 1)
        .build();

    let merger = SimpleConditionMerger;
    let remover = NullInsnRemover;
    let mut builder = RegionBuilder::new(&cfg, &loops, &merger, &remover);
    let root = builder.build_method().expect("build succeeds");

    let Region::Sequence(items) = &root else {
        panic!("root is not a sequence");
    };
    assert_eq!(items.len(), 2, "expected [Synchronized, Block6], got {items:?}");
    let RegionItem::Region(sync_region) = &items[0] else {
        panic!("first item is not a region");
    };
    let Region::Synchronized(sync_region) = sync_region.as_ref() else {
        panic!("expected a synchronized region");
    };
    assert_eq!(sync_region.header, b(0));

    let mut exits: Vec<BlockId> = sync_region.exit_blocks.iter().copied().collect();
    exits.sort();
    assert_eq!(exits, alloc::vec![b(3), b(5)]);

    // Both matched monitor-exits are marked for removal.
    for exit in [b(3), b(5)] {
        assert!(cfg.contains_flag(exit, BlockFlags::REMOVE));
        assert!(cfg.contains_flag(exit, BlockFlags::DONT_GENERATE));
    }

    let Region::Sequence(body_items) = sync_region.body.as_ref() else {
        panic!("synchronized body is not a sequence");
    };
    assert_eq!(body_items.len(), 2, "expected [Block0, IfRegion], got {body_items:?}");
    assert!(matches!(body_items[0], RegionItem::Block(block) if block == b(0)));
    let RegionItem::Region(if_region) = &body_items[1] else {
        panic!("second body item is not a region");
    };
    let Region::If(if_region) = if_region.as_ref() else {
        panic!("expected an if region");
    };
    assert_eq!(if_region.condition.if_block, b(1));
    assert_eq!(blocks_of(&if_region.then_region), alloc::vec![b(4), b(5)]);
    let else_region = if_region.else_region.as_ref().expect("a real else branch exists");
    assert_eq!(blocks_of(else_region), alloc::vec![b(2), b(3)]);

    // `blocks_of` recurses through the nested if, so the full flattened
    // body excludes only block 1 (present solely as `condition.if_block`).
    let mut body_blocks = blocks_of(&sync_region.body);
    body_blocks.sort();
    assert_eq!(body_blocks, alloc::vec![b(0), b(2), b(3), b(4), b(5)]);

    assert!(matches!(items[1], RegionItem::Block(block) if block == b(6)));
}
