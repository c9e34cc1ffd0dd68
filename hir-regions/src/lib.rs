//! Structured control-flow recovery for lowered basic-block graphs.
//!
//! Given a method's control-flow graph — basic blocks with typed
//! terminators, a dominator relation, detected natural loops, and
//! exception-handler metadata — this crate reconstructs the nested
//! `Region` tree (loops, conditionals, switches, synchronized sections,
//! try/catch) that a structured printer or HIR builder needs in order to
//! emit high-level code instead of an unstructured block soup.
//!
//! The algorithm itself ([`builder::RegionBuilder`]) is the hard part: CFG
//! traversal interleaved with structural pattern recognition, merge-point
//! ("out block") computation, synthetic `break`/`continue` insertion, and a
//! handful of partial-failure policies for the malformed graphs obfuscated
//! or otherwise adversarial input code can produce.
//!
//! Bytecode lifting, dominator-tree/loop-forest construction, and
//! source-code emission are all out of scope here — they're external
//! collaborators, reached through the [`cfg::CfgView`]/[`cfg::LoopView`]
//! traits (supplied by the caller) and the [`condition::ConditionMerger`]/
//! [`cfg::InsnRemover`] helper traits.

#![no_std]
#![deny(warnings)]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod builder;
pub mod cfg;
pub mod condition;
pub mod config;
pub mod edge;
pub mod error;
pub mod flags;
pub mod region;
pub mod stack;

pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, rustc_hash::FxBuildHasher>;
pub type FxHashSet<K> = hashbrown::HashSet<K, rustc_hash::FxBuildHasher>;

pub use self::{
    builder::RegionBuilder,
    cfg::{BlockId, CfgView, ExcHandler, ExcHandlerId, InsnRemover, LoopId, LoopView, TermKind},
    condition::{ConditionMerger, IfInfo, RestructuredIf},
    config::RegionBuilderConfig,
    edge::{Edge, EdgeInsnKind, EdgeInsnTable, LoopLabelAttr},
    error::RegionBuildError,
    flags::BlockFlags,
    region::{CaseKey, IfCondition, IfRegion, LoopPosition, LoopRegion, Region, RegionItem,
        SwitchCase, SwitchRegion, SynchronizedRegion},
};
