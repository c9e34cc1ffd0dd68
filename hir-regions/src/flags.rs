use bitflags::bitflags;

bitflags! {
    /// Mutable per-block state consulted and updated by the region builder.
    ///
    /// These are the builder's only observable side-effects on the CFG; the
    /// emitted [`crate::Region`] tree is otherwise frozen once returned.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct BlockFlags: u16 {
        /// Block is the header of a detected natural loop.
        const LOOP_START        = 1 << 0;
        /// Block was inserted by an earlier pass (trampoline), not original source.
        const SYNTHETIC          = 1 << 1;
        /// Block's terminator is a method return.
        const RETURN             = 1 << 2;
        /// Block has already been placed into the region tree.
        const ADDED_TO_REGION    = 1 << 3;
        /// Block must be suppressed from code generation (e.g. a consumed monitor-exit block).
        const DONT_GENERATE      = 1 << 4;
        /// Block (or instruction) is scheduled for removal.
        const REMOVE             = 1 << 5;
        /// Switch case falls through to the next case in source order.
        const FALL_THROUGH       = 1 << 6;
        /// Method-level flag: some recognition step could not be made consistent.
        const INCONSISTENT_CODE  = 1 << 7;
        /// Block is the entry of an exception handler.
        const CATCH_BLOCK        = 1 << 8;
        /// Block belongs to an exception handler region.
        const EXC_HANDLER        = 1 << 9;
    }
}
