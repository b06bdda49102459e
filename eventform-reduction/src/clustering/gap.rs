//! Gap-based clustering: sequential time and coordinate gap criteria.

use std::fmt::Write as _;

use eventform_core::{Cluster, Hit};
use tracing::trace;

use super::{describe_clusters, ClusterQueue, Clusterer};

/// Configuration for [`GapClusterer`].
#[derive(Debug, Clone, Copy)]
pub struct GapClustererConfig {
    /// Maximum time distance from the most recently inserted hit for a
    /// hit to extend the open cluster.
    pub max_time_gap: u64,
    /// Maximum coordinate distance from the open cluster's coordinate
    /// span for a hit to extend it.
    pub max_coord_gap: u16,
}

impl Default for GapClustererConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 200,
            max_coord_gap: 2,
        }
    }
}

/// The primary reference clustering strategy.
///
/// A hit extends the open cluster iff its time distance to the most
/// recently inserted hit is within `max_time_gap` AND its coordinate
/// distance to the cluster's current coordinate span is within
/// `max_coord_gap`. Otherwise the open cluster is closed and a new one
/// is started with the hit. Closure is irreversible.
#[derive(Debug, Default)]
pub struct GapClusterer {
    config: GapClustererConfig,
    current: Cluster,

    /// Closed clusters awaiting retrieval.
    pub clusters: ClusterQueue,
    /// Cumulative number of clusters produced.
    pub stats_cluster_count: usize,
}

impl GapClusterer {
    /// Creates a clusterer with the given gap criteria.
    #[must_use]
    pub fn new(config: GapClustererConfig) -> Self {
        Self {
            config,
            current: Cluster::new(),
            clusters: ClusterQueue::new(),
            stats_cluster_count: 0,
        }
    }

    // Hits are expected in nondecreasing time order; a backward hit is
    // still tolerated as long as it stays within the time gap, rather
    // than force-closing the open cluster.
    fn hit_extends_current(&self, hit: &Hit) -> bool {
        let Some(last) = self.current.hits.last() else {
            return true;
        };
        if hit.time.abs_diff(last.time) > self.config.max_time_gap {
            return false;
        }
        let coord_distance = if hit.coordinate < self.current.coord_start() {
            self.current.coord_start() - hit.coordinate
        } else if hit.coordinate > self.current.coord_end() {
            hit.coordinate - self.current.coord_end()
        } else {
            0
        };
        coord_distance <= self.config.max_coord_gap
    }

    fn stash_current(&mut self) {
        trace!(
            hits = self.current.hit_count(),
            time_end = self.current.time_end(),
            "closing cluster"
        );
        self.clusters.push_back(std::mem::take(&mut self.current));
        self.stats_cluster_count += 1;
    }
}

impl Clusterer for GapClusterer {
    fn insert(&mut self, hit: Hit) {
        if !self.current.is_empty() && !self.hit_extends_current(&hit) {
            self.stash_current();
        }
        self.current.insert(hit);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.stash_current();
        }
    }

    fn clusters(&mut self) -> &mut ClusterQueue {
        &mut self.clusters
    }

    fn stats_cluster_count(&self) -> usize {
        self.stats_cluster_count
    }

    fn config(&self, prepend: &str) -> String {
        let mut out = String::from("GapClusterer:\n");
        let _ = writeln!(out, "{prepend}max_time_gap={}", self.config.max_time_gap);
        let _ = writeln!(out, "{prepend}max_coord_gap={}", self.config.max_coord_gap);
        out
    }

    fn status(&self, prepend: &str, verbose: bool) -> String {
        let mut out = format!(
            "{prepend}total clusters produced: {}\n",
            self.stats_cluster_count
        );
        if !self.clusters.is_empty() {
            let _ = writeln!(out, "{prepend}retrievable clusters:");
            out.push_str(&describe_clusters(&self.clusters, prepend, verbose));
        }
        if !self.current.is_empty() {
            let _ = writeln!(
                out,
                "{prepend}open cluster: {}",
                self.current.describe(prepend, verbose)
            );
        }
        out
    }
}
