//! Time-tagging trait for chronologically mergeable items.

/// Anything carrying a single timestamp that a chronological merger can
/// order by. Implemented by hits, events and any per-module output item.
pub trait TimeTagged {
    /// Returns the timestamp used for chronological ordering.
    fn time(&self) -> u64;
}

impl TimeTagged for u64 {
    #[inline]
    fn time(&self) -> u64 {
        *self
    }
}
