use alloc::string::String;

use miette::Diagnostic;

/// Errors that abort a method's region build outright.
///
/// Every other failure kind the builder can encounter (malformed exception
/// metadata, a condition that can't be restructured, an inconsistent switch
/// fallthrough chain) is recovered locally — logged via `log::warn!`/
/// `log::debug!` and skipped or approximated — and never reaches this type.
/// See the crate-level docs and `builder` module for the recovery policy.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum RegionBuildError {
    /// The region-count safety limit (`blocks_count * region_count_multiplier`,
    /// see [`crate::RegionBuilderConfig`]) was exceeded.
    #[error("region builder overflow: created more than {limit} regions for a method with {blocks} blocks")]
    Overflow { blocks: usize, limit: usize },

    /// An invariant the builder relies on did not hold for this CFG, e.g. a
    /// loop was reported with no exit edges at all, or a required main exit
    /// edge could not be found during loop-exit checking.
    #[error("region builder invariant violated: {0}")]
    InvariantViolation(String),
}
