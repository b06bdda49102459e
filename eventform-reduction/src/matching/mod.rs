//! Matcher contract and shared matching state.

mod gap;
mod multi_hit;

pub use gap::{GapMatcher, GapMatcherConfig};
pub use multi_hit::{MultiHitMatcher, MultiHitMatcherConfig};

use std::fmt::Write as _;

use eventform_core::{Cluster, Event};
use tracing::trace;

use crate::clustering::ClusterQueue;

/// Streaming state machine pairing clusters from two planes into events.
///
/// Inserted clusters must be chronological to the extent that the
/// latency guarantee holds: if a cluster ends at time `T`, no subsequent
/// cluster may start earlier than `T - maximum_latency`. Violations are
/// not detected; they silently degrade the ordering of the output.
pub trait Matcher {
    /// Queues a cluster for matching. Clusters on neither configured
    /// plane are counted as rejected and dropped.
    fn insert(&mut self, cluster: Cluster);

    /// Queues clusters known to belong to one plane, draining the
    /// caller's container. A plane outside the configured pair rejects
    /// the whole batch.
    fn insert_plane(&mut self, plane: u8, clusters: &mut ClusterQueue);

    /// Matches queued clusters into events. With `flush`, all queued
    /// clusters are processed regardless of latency considerations.
    fn match_clusters(&mut self, flush: bool);

    /// Matched events accumulated so far, drainable by the consumer.
    fn matched_events(&mut self) -> &mut Vec<Event>;

    /// Cumulative number of matched events.
    fn stats_event_count(&self) -> usize;

    /// Cumulative number of clusters rejected for a wrong plane.
    fn stats_rejected_clusters(&self) -> usize;

    /// Human-readable configuration dump.
    fn config(&self, prepend: &str) -> String;

    /// Human-readable status dump.
    fn status(&self, prepend: &str, verbose: bool) -> String;
}

/// State and bookkeeping shared by every matcher strategy: the
/// unmatched-cluster queue, per-plane high-water marks, the plane
/// filter and the matched-event store.
#[derive(Debug)]
pub struct MatcherBase {
    /// Latency bound under which the readiness rule releases clusters.
    pub maximum_latency: u64,
    /// First plane selected for matching.
    pub plane_a: u8,
    /// Second plane selected for matching.
    pub plane_b: u8,

    /// Clusters queued but not yet matched.
    pub unmatched_clusters: ClusterQueue,
    /// Latest cluster end time seen on plane A.
    pub latest_a: u64,
    /// Latest cluster end time seen on plane B.
    pub latest_b: u64,

    /// Matched events awaiting retrieval.
    pub matched_events: Vec<Event>,
    /// Cumulative number of matched events.
    pub stats_event_count: usize,
    /// Cumulative number of clusters rejected for a wrong plane.
    pub stats_rejected_clusters: usize,
}

impl MatcherBase {
    /// Creates matcher state for the given latency bound and planes.
    #[must_use]
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            maximum_latency,
            plane_a,
            plane_b,
            unmatched_clusters: ClusterQueue::new(),
            latest_a: 0,
            latest_b: 0,
            matched_events: Vec::new(),
            stats_event_count: 0,
            stats_rejected_clusters: 0,
        }
    }

    /// Queues one cluster, updating the plane's high-water mark, or
    /// counts it as rejected.
    pub fn insert(&mut self, cluster: Cluster) {
        if cluster.plane() == self.plane_a {
            self.latest_a = self.latest_a.max(cluster.time_end());
        } else if cluster.plane() == self.plane_b {
            self.latest_b = self.latest_b.max(cluster.time_end());
        } else {
            trace!(plane = cluster.plane(), "rejecting wrong-plane cluster");
            self.stats_rejected_clusters += 1;
            return;
        }
        self.unmatched_clusters.push_back(cluster);
    }

    /// Queues a same-plane batch, draining the caller's container.
    pub fn insert_plane(&mut self, plane: u8, clusters: &mut ClusterQueue) {
        if plane != self.plane_a && plane != self.plane_b {
            self.stats_rejected_clusters += clusters.len();
            clusters.clear();
            return;
        }
        for cluster in clusters.drain(..) {
            self.insert(cluster);
        }
    }

    /// True iff both planes have been observed to progress far enough
    /// past this cluster's end that no earlier-in-time cluster can
    /// still arrive and need to be matched ahead of it.
    #[must_use]
    pub fn ready_to_be_matched(&self, cluster: &Cluster) -> bool {
        self.latest_a.min(self.latest_b) > cluster.time_end().saturating_add(self.maximum_latency)
    }

    /// Sorts the unmatched queue chronologically by cluster start time.
    pub fn sort_unmatched(&mut self) {
        self.unmatched_clusters
            .make_contiguous()
            .sort_by_key(Cluster::time_start);
    }

    /// Moves a finalized event into the event store.
    pub fn stash_event(&mut self, event: Event) {
        trace!(hits = event.total_hit_count(), "stashing event");
        self.matched_events.push(event);
        self.stats_event_count += 1;
    }

    /// Puts an unfinished event's constituent clusters back onto the
    /// unmatched queue, to be reconsidered on the next pass.
    pub fn requeue_clusters(&mut self, event: &mut Event) {
        if !event.cluster_a.is_empty() {
            self.unmatched_clusters
                .push_back(std::mem::take(&mut event.cluster_a));
        }
        if !event.cluster_b.is_empty() {
            self.unmatched_clusters
                .push_back(std::mem::take(&mut event.cluster_b));
        }
    }

    /// Shared part of the configuration dump.
    #[must_use]
    pub fn config(&self, prepend: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{prepend}maximum_latency={}", self.maximum_latency);
        let _ = writeln!(out, "{prepend}planes=({},{})", self.plane_a, self.plane_b);
        out
    }

    /// Shared part of the status dump.
    #[must_use]
    pub fn status(&self, prepend: &str, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{prepend}matched events: {} (cumulative {}), rejected clusters: {}",
            self.matched_events.len(),
            self.stats_event_count,
            self.stats_rejected_clusters
        );
        let _ = writeln!(
            out,
            "{prepend}latest: A={} B={}, unmatched queue: {}",
            self.latest_a,
            self.latest_b,
            self.unmatched_clusters.len()
        );
        if verbose {
            for cluster in &self.unmatched_clusters {
                let _ = writeln!(out, "{prepend}  {}", cluster.describe(prepend, false));
            }
        }
        out
    }
}
