//! Gap matching: clusters separated by a small enough time gap belong
//! to the same event.

use std::fmt::Write as _;

use eventform_core::{Cluster, Event};
use tracing::debug;

use super::{Matcher, MatcherBase};
use crate::clustering::ClusterQueue;

/// Configuration for [`GapMatcher`].
#[derive(Debug, Clone, Copy)]
pub struct GapMatcherConfig {
    /// Latency bound for the readiness rule.
    pub maximum_latency: u64,
    /// First plane selected for matching.
    pub plane_a: u8,
    /// Second plane selected for matching.
    pub plane_b: u8,
    /// Largest time gap between an event and the next cluster for the
    /// cluster to still extend the event.
    pub minimum_time_gap: u64,
}

impl Default for GapMatcherConfig {
    fn default() -> Self {
        Self {
            maximum_latency: 500,
            plane_a: 0,
            plane_b: 1,
            minimum_time_gap: 70,
        }
    }
}

/// Matches clusters into events by time gap alone.
///
/// The unmatched queue is processed in time order. Each cluster either
/// extends the growing event or, when its gap to the event exceeds
/// `minimum_time_gap`, finalizes the event and starts a new one.
#[derive(Debug)]
pub struct GapMatcher {
    base: MatcherBase,
    minimum_time_gap: u64,
}

impl GapMatcher {
    /// Creates a gap matcher.
    #[must_use]
    pub fn new(config: GapMatcherConfig) -> Self {
        Self {
            base: MatcherBase::new(config.maximum_latency, config.plane_a, config.plane_b),
            minimum_time_gap: config.minimum_time_gap,
        }
    }

    /// Shared matcher state, exposed for inspection in tests and
    /// diagnostics.
    #[must_use]
    pub fn base(&self) -> &MatcherBase {
        &self.base
    }
}

impl Matcher for GapMatcher {
    fn insert(&mut self, cluster: Cluster) {
        self.base.insert(cluster);
    }

    fn insert_plane(&mut self, plane: u8, clusters: &mut ClusterQueue) {
        self.base.insert_plane(plane, clusters);
    }

    fn match_clusters(&mut self, flush: bool) {
        self.base.sort_unmatched();
        debug!(
            unmatched = self.base.unmatched_clusters.len(),
            flush, "matching"
        );

        let mut event = Event::new(self.base.plane_a, self.base.plane_b);
        loop {
            let Some(front) = self.base.unmatched_clusters.front() else {
                break;
            };
            if !flush && !self.base.ready_to_be_matched(front) {
                break;
            }
            if !event.is_empty() && event.time_gap(front) > self.minimum_time_gap {
                let finished = std::mem::replace(
                    &mut event,
                    Event::new(self.base.plane_a, self.base.plane_b),
                );
                self.base.stash_event(finished);
            }
            let Some(mut cluster) = self.base.unmatched_clusters.pop_front() else {
                break;
            };
            event.merge(&mut cluster);
        }

        if !event.is_empty() {
            if flush {
                self.base.stash_event(event);
            } else {
                self.base.requeue_clusters(&mut event);
            }
        }
    }

    fn matched_events(&mut self) -> &mut Vec<Event> {
        &mut self.base.matched_events
    }

    fn stats_event_count(&self) -> usize {
        self.base.stats_event_count
    }

    fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }

    fn config(&self, prepend: &str) -> String {
        let mut out = String::from("GapMatcher:\n");
        out.push_str(&self.base.config(prepend));
        let _ = writeln!(out, "{prepend}minimum_time_gap={}", self.minimum_time_gap);
        out
    }

    fn status(&self, prepend: &str, verbose: bool) -> String {
        self.base.status(prepend, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventform_core::Hit;

    fn cluster(plane: u8, time_start: u64, time_end: u64, coordinate: u16) -> Cluster {
        let mut c = Cluster::new();
        for t in time_start..=time_end {
            c.insert(Hit::new(plane, t, coordinate, 1));
        }
        c
    }

    fn matcher(minimum_time_gap: u64) -> GapMatcher {
        GapMatcher::new(GapMatcherConfig {
            maximum_latency: 100,
            plane_a: 0,
            plane_b: 1,
            minimum_time_gap,
        })
    }

    #[test]
    fn overlapping_pair_matches_on_flush() {
        let mut m = matcher(10);
        m.insert(cluster(0, 0, 5, 10));
        m.insert(cluster(1, 2, 6, 20));
        m.match_clusters(true);

        assert_eq!(m.stats_event_count(), 1);
        let event = &m.matched_events()[0];
        assert!(event.both_planes());
        assert_eq!(event.total_hit_count(), 11);
    }

    #[test]
    fn large_gap_separates_events() {
        let mut m = matcher(10);
        m.insert(cluster(0, 0, 5, 10));
        m.insert(cluster(1, 2, 6, 20));
        m.insert(cluster(0, 100, 105, 10));
        m.insert(cluster(1, 101, 106, 20));
        m.match_clusters(true);

        assert_eq!(m.stats_event_count(), 2);
        assert!(m.matched_events().iter().all(Event::both_planes));
    }

    #[test]
    fn unready_clusters_stay_queued() {
        let mut m = matcher(10);
        m.insert(cluster(0, 0, 5, 10));
        m.insert(cluster(1, 2, 6, 20));
        // neither plane has progressed past 5 + latency
        m.match_clusters(false);

        assert_eq!(m.stats_event_count(), 0);
        assert_eq!(m.base().unmatched_clusters.len(), 2);
    }

    #[test]
    fn progress_on_both_planes_releases_early_clusters() {
        let mut m = matcher(10);
        m.insert(cluster(0, 0, 5, 10));
        m.insert(cluster(1, 2, 6, 20));
        m.insert(cluster(0, 200, 210, 10));
        m.insert(cluster(1, 200, 210, 20));
        m.insert(cluster(0, 400, 410, 10));
        m.insert(cluster(1, 400, 410, 20));
        m.match_clusters(false);

        // the earliest pair is released; the rest awaits more data
        assert_eq!(m.stats_event_count(), 1);
        assert!(m.matched_events()[0].both_planes());
        assert_eq!(m.matched_events()[0].time_end(), 6);
        assert_eq!(m.base().unmatched_clusters.len(), 4);
    }

    #[test]
    fn single_plane_event_is_still_an_event() {
        let mut m = matcher(10);
        m.insert(cluster(0, 0, 5, 10));
        m.match_clusters(true);
        assert_eq!(m.stats_event_count(), 1);
        assert!(!m.matched_events()[0].both_planes());
    }

    #[test]
    fn rejected_planes_counted() {
        let mut m = matcher(10);
        m.insert(cluster(4, 0, 5, 10));
        assert_eq!(m.stats_rejected_clusters(), 1);
        m.match_clusters(true);
        assert_eq!(m.stats_event_count(), 0);
    }
}
