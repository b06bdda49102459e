//! Hierarchical clustering: time-window batching, then seed-relative
//! spatial grouping within each closed window.

use std::fmt::Write as _;

use eventform_core::{Cluster, Hit, HitVector};
use tracing::{debug, trace};

use super::{describe_clusters, ClusterQueue, Clusterer};

/// Configuration for [`HierarchicalClusterer`].
#[derive(Debug, Clone, Copy)]
pub struct HierarchicalClustererConfig {
    /// Maximum time distance from the latest buffered hit before the
    /// time-window batch is closed.
    pub max_time_gap: u64,
    /// Maximum coordinate distance to a sub-cluster's seed hit for a
    /// hit to be absorbed into it.
    pub max_coord_gap: u16,
}

impl Default for HierarchicalClustererConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 500,
            max_coord_gap: 5,
        }
    }
}

/// Batch strategy for detectors where hits group primarily by
/// coordinate proximity within a time window.
///
/// Hits accumulate into one time-window batch, closed when a hit's time
/// gap to the batch exceeds `max_time_gap` or on [`Clusterer::flush`].
/// Within a closed batch, sub-clustering scans unvisited hits in order,
/// seeds a cluster from the first one, and absorbs every other
/// unvisited hit within `max_coord_gap` of that seed (not of the
/// evolving cluster). This single-pass, seed-relative grouping is a
/// deliberate simplification of connected-components clustering;
/// downstream numeric expectations are calibrated against it.
#[derive(Debug, Default)]
pub struct HierarchicalClusterer {
    config: HierarchicalClustererConfig,
    window: HitVector,

    /// Closed clusters awaiting retrieval.
    pub clusters: ClusterQueue,
    /// Cumulative number of clusters produced.
    pub stats_cluster_count: usize,
}

impl HierarchicalClusterer {
    /// Creates a clusterer with the given window and seed criteria.
    #[must_use]
    pub fn new(config: HierarchicalClustererConfig) -> Self {
        Self {
            config,
            window: HitVector::new(),
            clusters: ClusterQueue::new(),
            stats_cluster_count: 0,
        }
    }

    /// Seed-relative grouping of the closed time window.
    fn cluster_window(&mut self) {
        let gap = u32::from(self.config.max_coord_gap);
        let gap_squared = gap * gap;
        let mut visited = vec![false; self.window.len()];

        debug!(hits = self.window.len(), "clustering time window");
        for i in 0..self.window.len() {
            if visited[i] {
                continue;
            }
            let seed = self.window[i];
            let mut cluster = Cluster::new();
            cluster.insert(seed);
            visited[i] = true;

            for j in (i + 1)..self.window.len() {
                if visited[j] {
                    continue;
                }
                let candidate = self.window[j];
                let distance = u32::from(seed.coordinate.abs_diff(candidate.coordinate));
                // squared compare, strict per the reference behavior
                if distance * distance < gap_squared {
                    trace!(seed = seed.coordinate, hit = candidate.coordinate, "absorbed");
                    cluster.insert(candidate);
                    visited[j] = true;
                }
            }

            self.clusters.push_back(cluster);
            self.stats_cluster_count += 1;
        }
        self.window.clear();
    }
}

impl Clusterer for HierarchicalClusterer {
    fn insert(&mut self, hit: Hit) {
        if let Some(last) = self.window.last() {
            if hit.time.abs_diff(last.time) > self.config.max_time_gap {
                self.flush();
            }
        }
        self.window.push(hit);
    }

    fn flush(&mut self) {
        if self.window.is_empty() {
            return;
        }
        self.cluster_window();
    }

    fn clusters(&mut self) -> &mut ClusterQueue {
        &mut self.clusters
    }

    fn stats_cluster_count(&self) -> usize {
        self.stats_cluster_count
    }

    fn config(&self, prepend: &str) -> String {
        let mut out = String::from("HierarchicalClusterer:\n");
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
        if !self.window.is_empty() {
            let _ = writeln!(
                out,
                "{prepend}current time window: {} hits",
                self.window.len()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_held_until_time_gap() {
        let mut hc = HierarchicalClusterer::new(HierarchicalClustererConfig {
            max_time_gap: 10,
            max_coord_gap: 3,
        });
        hc.insert(Hit::new(0, 0, 1, 1));
        hc.insert(Hit::new(0, 5, 2, 1));
        assert_eq!(hc.stats_cluster_count, 0);

        // large time gap closes the window
        hc.insert(Hit::new(0, 100, 50, 1));
        assert_eq!(hc.stats_cluster_count, 1);
        assert_eq!(hc.clusters[0].hit_count(), 2);

        hc.flush();
        assert_eq!(hc.stats_cluster_count, 2);
    }

    #[test]
    fn seed_relative_grouping_is_not_transitive() {
        let mut hc = HierarchicalClusterer::new(HierarchicalClustererConfig {
            max_time_gap: 100,
            max_coord_gap: 3,
        });
        // chain 0, 2, 4: 2 is within 3 of seed 0, but 4 is not, even
        // though 4 is within 3 of 2 (connected components would merge
        // all three)
        hc.insert(Hit::new(0, 0, 0, 1));
        hc.insert(Hit::new(0, 1, 2, 1));
        hc.insert(Hit::new(0, 2, 4, 1));
        hc.flush();

        assert_eq!(hc.stats_cluster_count, 2);
        assert_eq!(hc.clusters[0].hit_count(), 2);
        assert_eq!(hc.clusters[1].hit_count(), 1);
        assert_eq!(hc.clusters[1].coord_start(), 4);
    }

    #[test]
    fn distance_at_gap_is_excluded() {
        let mut hc = HierarchicalClusterer::new(HierarchicalClustererConfig {
            max_time_gap: 100,
            max_coord_gap: 3,
        });
        hc.insert(Hit::new(0, 0, 10, 1));
        hc.insert(Hit::new(0, 1, 13, 1)); // distance exactly 3: excluded
        hc.insert(Hit::new(0, 2, 12, 1)); // distance 2: absorbed
        hc.flush();

        assert_eq!(hc.stats_cluster_count, 2);
        assert_eq!(hc.clusters[0].hit_count(), 2);
    }

    #[test]
    fn flush_on_empty_window_does_nothing() {
        let mut hc = HierarchicalClusterer::new(HierarchicalClustererConfig::default());
        hc.flush();
        assert_eq!(hc.stats_cluster_count, 0);
        assert!(hc.clusters.is_empty());
    }

    #[test]
    fn two_well_separated_groups() {
        let mut hc = HierarchicalClusterer::new(HierarchicalClustererConfig {
            max_time_gap: 50,
            max_coord_gap: 5,
        });
        for t in 0..5u64 {
            #[allow(clippy::cast_possible_truncation)]
            hc.insert(Hit::new(0, t, 100 + t as u16, 1));
        }
        for t in 5..10u64 {
            #[allow(clippy::cast_possible_truncation)]
            hc.insert(Hit::new(0, t, 200 + t as u16, 1));
        }
        hc.flush();

        assert_eq!(hc.stats_cluster_count, 2);
        let total: usize = hc.clusters.iter().map(Cluster::hit_count).sum();
        assert_eq!(total, 10);
    }
}
