//! Bounded-latency chronological merging across parallel pipelines.
//!
//! # Problem
//! Each detector module runs its own clusterer+matcher chain, so its
//! output is only locally time-ordered. Downstream serialization wants
//! one globally chronological stream.
//!
//! # Solution
//! A k-way merge with an explicit latency bound: the merger tracks each
//! module's latest-seen timestamp, and only releases an item once every
//! module has been observed to progress more than `maximum_latency`
//! past it. A stalled module therefore holds back the whole stream;
//! backpressure is structural, not explicit.

use std::collections::VecDeque;
use std::fmt::Write as _;

use eventform_core::{Error, Result, TimeTagged};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pixel-mapped detection, the conventional pass-through item for a
/// [`ChronoMerger`] stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeutronEvent {
    /// Timestamp in detector time units.
    pub time: u64,
    /// Pixel identifier assigned by the external geometry stage.
    pub pixel_id: u32,
}

impl NeutronEvent {
    /// Creates a new neutron event.
    #[inline]
    #[must_use]
    pub fn new(time: u64, pixel_id: u32) -> Self {
        Self { time, pixel_id }
    }
}

impl TimeTagged for NeutronEvent {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }
}

/// Restores global chronological order across several independent,
/// only-locally-ordered module streams.
///
/// Items go into a single backing queue; [`ChronoMerger::sort`] MUST be
/// called after a burst of inserts before `earliest`/`pop_earliest` are
/// relied upon for time order. [`ChronoMerger::ready`] is the sole
/// criterion under which popping is guaranteed not to violate global
/// chronological order.
#[derive(Debug)]
pub struct ChronoMerger<T: TimeTagged> {
    maximum_latency: u64,
    latest: Vec<u64>,
    queue: VecDeque<T>,
}

impl<T: TimeTagged> ChronoMerger<T> {
    /// Creates a merger for `module_count` upstream pipelines.
    #[must_use]
    pub fn new(maximum_latency: u64, module_count: usize) -> Self {
        Self {
            maximum_latency,
            latest: vec![0; module_count],
            queue: VecDeque::new(),
        }
    }

    /// Number of upstream pipelines.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.latest.len()
    }

    fn check_module(&self, module: usize) -> Result<()> {
        if module >= self.latest.len() {
            return Err(Error::InvalidModule {
                module,
                module_count: self.latest.len(),
            });
        }
        Ok(())
    }

    /// Queues one item from a module, advancing that module's
    /// high-water mark.
    ///
    /// # Errors
    /// [`Error::InvalidModule`] if `module` is out of range.
    pub fn insert(&mut self, module: usize, item: T) -> Result<()> {
        self.check_module(module)?;
        self.latest[module] = self.latest[module].max(item.time());
        self.queue.push_back(item);
        Ok(())
    }

    /// Queues a sequence of items from one module.
    ///
    /// # Errors
    /// [`Error::InvalidModule`] if `module` is out of range.
    pub fn insert_many<I>(&mut self, module: usize, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.check_module(module)?;
        for item in items {
            self.latest[module] = self.latest[module].max(item.time());
            self.queue.push_back(item);
        }
        Ok(())
    }

    /// Re-establishes chronological order of the backing queue.
    pub fn sort(&mut self) {
        self.queue.make_contiguous().sort_by_key(TimeTagged::time);
    }

    /// The point in time up to which every pipeline is known to have
    /// reported: the minimum of the per-module high-water marks.
    #[must_use]
    pub fn horizon(&self) -> u64 {
        self.latest.iter().copied().min().unwrap_or(0)
    }

    /// Timestamp of the earliest queued item (front of the queue; only
    /// meaningful after [`ChronoMerger::sort`]).
    #[must_use]
    pub fn earliest(&self) -> Option<u64> {
        self.queue.front().map(TimeTagged::time)
    }

    /// True iff the earliest queued item lies more than
    /// `maximum_latency` behind the horizon, i.e. popping it cannot
    /// violate global chronological order.
    #[must_use]
    pub fn ready(&self) -> bool {
        match self.earliest() {
            Some(time) => self.horizon() > time.saturating_add(self.maximum_latency),
            None => false,
        }
    }

    /// Removes and returns the earliest queued item. Ordering is
    /// undefined if [`ChronoMerger::sort`] has not been called since
    /// the last insert.
    pub fn pop_earliest(&mut self) -> Option<T> {
        let item = self.queue.pop_front();
        if let Some(ref item) = item {
            trace!(time = item.time(), "releasing item");
        }
        item
    }

    /// Declares that two modules share a progress bound (e.g. a common
    /// hardware clock), raising both high-water marks to their maximum.
    ///
    /// # Errors
    /// [`Error::InvalidModule`] if either module is out of range.
    pub fn sync_up(&mut self, module_a: usize, module_b: usize) -> Result<()> {
        self.check_module(module_a)?;
        self.check_module(module_b)?;
        let latest = self.latest[module_a].max(self.latest[module_b]);
        self.latest[module_a] = latest;
        self.latest[module_b] = latest;
        Ok(())
    }

    /// Zeroes all high-water marks, for pipelines restarting with a new
    /// clock epoch. Does not clear the queue.
    pub fn reset(&mut self) {
        self.latest.fill(0);
    }

    /// Returns true if no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Human-readable status dump.
    #[must_use]
    pub fn debug_dump(&self, prepend: &str, verbose: bool) -> String {
        let mut out = format!(
            "{prepend}maximum_latency={} horizon={} queued={}\n",
            self.maximum_latency,
            self.horizon(),
            self.queue.len()
        );
        for (module, latest) in self.latest.iter().enumerate() {
            let _ = writeln!(out, "{prepend}latest[{module}]={latest}");
        }
        if verbose {
            for item in &self.queue {
                let _ = writeln!(out, "{prepend}  t={}", item.time());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merger() -> ChronoMerger<NeutronEvent> {
        ChronoMerger::new(100, 3)
    }

    #[test]
    fn bad_module_is_an_error() {
        let mut m = merger();
        assert!(m.insert(0, NeutronEvent::new(0, 0)).is_ok());
        assert!(m.insert(2, NeutronEvent::new(0, 0)).is_ok());
        assert!(matches!(
            m.insert(3, NeutronEvent::new(0, 0)),
            Err(Error::InvalidModule {
                module: 3,
                module_count: 3
            })
        ));
        assert!(m.insert(4, NeutronEvent::new(0, 0)).is_err());
    }

    #[test]
    fn empty_tracking() {
        let mut m = merger();
        assert!(m.is_empty());
        m.insert(0, NeutronEvent::new(0, 0)).unwrap();
        assert!(!m.is_empty());
        assert_eq!(m.len(), 1);
        m.pop_earliest();
        assert!(m.is_empty());
    }

    #[test]
    fn pop_preserves_payload() {
        let mut m = merger();
        m.insert(0, NeutronEvent::new(1, 2)).unwrap();
        m.insert(0, NeutronEvent::new(3, 4)).unwrap();
        let first = m.pop_earliest().unwrap();
        assert_eq!(first.time, 1);
        assert_eq!(first.pixel_id, 2);
        let second = m.pop_earliest().unwrap();
        assert_eq!(second.time, 3);
        assert_eq!(second.pixel_id, 4);
        assert!(m.is_empty());
    }

    #[test]
    fn horizon_is_min_of_latest_and_monotonic() {
        let mut m = merger();
        assert_eq!(m.horizon(), 0);
        m.insert(0, NeutronEvent::new(5, 0)).unwrap();
        assert_eq!(m.horizon(), 0);
        m.insert(1, NeutronEvent::new(4, 0)).unwrap();
        assert_eq!(m.horizon(), 0);
        m.insert(2, NeutronEvent::new(3, 0)).unwrap();
        assert_eq!(m.horizon(), 3);
        m.insert(2, NeutronEvent::new(6, 0)).unwrap();
        assert_eq!(m.horizon(), 4);
        m.insert(1, NeutronEvent::new(7, 0)).unwrap();
        assert_eq!(m.horizon(), 5);
        m.insert(0, NeutronEvent::new(8, 0)).unwrap();
        assert_eq!(m.horizon(), 6);
    }

    #[test]
    fn sort_establishes_chronological_pops() {
        let mut m = merger();
        m.insert(0, NeutronEvent::new(5, 0)).unwrap();
        m.insert(1, NeutronEvent::new(4, 0)).unwrap();
        m.insert(2, NeutronEvent::new(3, 0)).unwrap();
        m.insert(2, NeutronEvent::new(6, 0)).unwrap();
        m.insert(1, NeutronEvent::new(7, 0)).unwrap();
        m.insert(0, NeutronEvent::new(8, 0)).unwrap();

        // before sorting, the queue reflects insertion order
        assert_eq!(m.earliest(), Some(5));
        m.sort();

        let mut popped = Vec::new();
        while let Some(item) = m.pop_earliest() {
            popped.push(item.time);
        }
        assert_eq!(popped, vec![3, 4, 5, 6, 7, 8]);
        assert!(m.is_empty());
    }

    #[test]
    fn ready_criterion() {
        let mut m = merger();
        assert!(!m.ready());
        m.insert(0, NeutronEvent::new(3, 0)).unwrap();
        assert!(!m.ready());
        m.insert(1, NeutronEvent::new(4, 0)).unwrap();
        assert!(!m.ready());
        m.insert(2, NeutronEvent::new(5, 0)).unwrap();
        assert!(!m.ready());

        m.insert(0, NeutronEvent::new(104, 0)).unwrap();
        assert!(!m.ready());
        m.insert(1, NeutronEvent::new(105, 0)).unwrap();
        assert!(!m.ready());
        m.insert(2, NeutronEvent::new(106, 0)).unwrap();
        assert!(m.ready());

        m.pop_earliest();
        assert!(!m.ready());

        m.insert(0, NeutronEvent::new(105, 0)).unwrap();
        m.sort();
        assert!(m.ready());
        m.pop_earliest();
        assert!(!m.ready());

        m.insert(0, NeutronEvent::new(106, 0)).unwrap();
        m.insert(1, NeutronEvent::new(106, 0)).unwrap();
        m.sort();
        assert!(m.ready());
        m.pop_earliest();
        assert!(!m.ready());
    }

    #[test]
    fn reset_zeroes_marks_but_keeps_queue() {
        let mut m = merger();
        m.insert(0, NeutronEvent::new(8, 0)).unwrap();
        m.insert(1, NeutronEvent::new(7, 0)).unwrap();
        m.insert(2, NeutronEvent::new(6, 0)).unwrap();
        assert_eq!(m.horizon(), 6);
        m.reset();
        assert_eq!(m.horizon(), 0);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn sync_up_raises_both_marks() {
        let mut m = merger();
        m.insert(0, NeutronEvent::new(50, 0)).unwrap();
        m.insert(1, NeutronEvent::new(10, 0)).unwrap();
        m.insert(2, NeutronEvent::new(60, 0)).unwrap();
        assert_eq!(m.horizon(), 10);

        m.sync_up(0, 1).unwrap();
        assert_eq!(m.horizon(), 50);
        assert!(m.sync_up(0, 9).is_err());
    }

    #[test]
    fn insert_many_advances_mark_once_per_item() {
        let mut m = merger();
        m.insert_many(0, (1..=5).map(|t| NeutronEvent::new(t, 0)))
            .unwrap();
        assert_eq!(m.len(), 5);
        m.insert_many(1, [NeutronEvent::new(9, 0)]).unwrap();
        m.insert_many(2, [NeutronEvent::new(7, 0)]).unwrap();
        assert_eq!(m.horizon(), 5);
    }

    #[test]
    fn debug_dump_lists_marks() {
        let mut m = merger();
        m.insert(0, NeutronEvent::new(3, 0)).unwrap();
        let text = m.debug_dump("  ", true);
        assert!(text.contains("latest[0]=3"));
        assert!(text.contains("queued=1"));
    }
}
