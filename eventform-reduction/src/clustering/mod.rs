//! Clusterer contract and closed-cluster storage.

mod gap;
mod hierarchical;

pub use gap::{GapClusterer, GapClustererConfig};
pub use hierarchical::{HierarchicalClusterer, HierarchicalClustererConfig};

use std::collections::VecDeque;
use std::fmt::Write as _;

use eventform_core::{Cluster, Hit};

/// Queue of closed clusters awaiting retrieval by a matcher.
///
/// The original fixed-pool allocation scheme behind this container was a
/// hot-path optimization, not a correctness requirement; a plain deque
/// keeps the same FIFO retrieval discipline.
pub type ClusterQueue = VecDeque<Cluster>;

/// Streaming state machine grouping a chronological hit stream into
/// clusters.
///
/// Hits must arrive time-sorted per plane; behavior under out-of-order
/// input is unspecified (ordering is guaranteed upstream). Closed
/// clusters accumulate in [`Clusterer::clusters`] until the consumer
/// drains them. Closure decisions are final: a closed cluster is never
/// reopened, which is why [`Clusterer::flush`] is required to drain the
/// still-open tail of the stream.
pub trait Clusterer {
    /// Inserts a new hit, potentially closing the open cluster.
    fn insert(&mut self, hit: Hit);

    /// Inserts a batch of time-sorted hits.
    fn cluster(&mut self, hits: &[Hit]) {
        for &hit in hits {
            self.insert(hit);
        }
    }

    /// Completes clustering for any remaining buffered hits.
    fn flush(&mut self);

    /// Closed clusters, retrievable (and drainable) by the consumer.
    fn clusters(&mut self) -> &mut ClusterQueue;

    /// Cumulative number of clusters produced. Survives draining of
    /// [`Clusterer::clusters`].
    fn stats_cluster_count(&self) -> usize;

    /// Human-readable configuration dump.
    fn config(&self, prepend: &str) -> String;

    /// Human-readable status dump.
    fn status(&self, prepend: &str, verbose: bool) -> String;
}

/// Describes every cluster in a queue, one per line.
#[must_use]
pub fn describe_clusters(clusters: &ClusterQueue, prepend: &str, verbose: bool) -> String {
    let mut out = String::new();
    for (i, cluster) in clusters.iter().enumerate() {
        let _ = writeln!(out, "{prepend}[{i}] {}", cluster.describe(prepend, verbose));
    }
    out
}
