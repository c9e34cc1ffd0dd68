//! The region stack: the exit-set scoping discipline that lets recursive
//! traversal stop exactly where the enclosing recognizer needs it to.
//!
//! There's no "region currently being populated" slot on the frame here —
//! every recognizer builds its region bottom-up and returns it to its
//! caller rather than mutating a shared top-of-stack object, so that half
//! is simply a local variable on the call stack. `RegionStack` is exit-set
//! bookkeeping only.

use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::cfg::BlockId;

/// One scope's exit boundary: the set of blocks at which a nested `build`
/// must stop and hand control back to its caller.
#[derive(Debug, Default, Clone)]
struct Frame {
    exits: SmallVec<[BlockId; 4]>,
}

/// A stack of exit-set scopes, pushed by every region recognizer that
/// recurses into a sub-body (loop, if-branch, switch case, synchronized
/// body, handler region) and popped on return.
#[derive(Debug, Default, Clone)]
pub struct RegionStack {
    frames: Vec<Frame>,
}

impl RegionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new, empty-exit-set frame.
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Adds `block` to the **top** frame's exit set.
    pub fn add_exit(&mut self, block: BlockId) {
        if let Some(top) = self.frames.last_mut() {
            if !top.exits.contains(&block) {
                top.exits.push(block);
            }
        }
    }

    pub fn add_exits(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        for block in blocks {
            self.add_exit(block);
        }
    }

    /// Removes `block` from the top frame's exit set only.
    pub fn remove_exit(&mut self, block: BlockId) {
        if let Some(top) = self.frames.last_mut() {
            top.exits.retain(|b| *b != block);
        }
    }

    /// Is `block` an exit of the top frame only?
    pub fn top_contains_exit(&self, block: BlockId) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.exits.contains(&block))
    }

    /// Is `block` an exit of the top frame, or of any frame beneath it?
    /// Lets callers early-terminate when a block is the boundary of any
    /// enclosing scope, not just the innermost one.
    pub fn contains_exit(&self, block: BlockId) -> bool {
        self.frames.iter().any(|frame| frame.exits.contains(&block))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
