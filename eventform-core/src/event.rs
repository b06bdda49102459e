//! Event: a pairing of clusters from two complementary planes.

use std::fmt::Write as _;

use crate::cluster::Cluster;
use crate::hit::Hit;
use crate::time::TimeTagged;

/// One candidate reconstructed 2D detection: at most one cluster from
/// each of two configured planes.
///
/// Hits or clusters on a plane other than the two configured ones are
/// silently dropped at this level; the matcher is responsible for
/// counting and rejecting them earlier.
#[derive(Debug, Clone)]
pub struct Event {
    /// Cluster bound to plane A.
    pub cluster_a: Cluster,
    /// Cluster bound to plane B.
    pub cluster_b: Cluster,

    plane_a: u8,
    plane_b: u8,
}

impl Event {
    /// Creates an empty event for the given pair of planes.
    #[must_use]
    pub fn new(plane_a: u8, plane_b: u8) -> Self {
        Self {
            cluster_a: Cluster::new(),
            cluster_b: Cluster::new(),
            plane_a,
            plane_b,
        }
    }

    /// Plane bound to the A slot.
    #[must_use]
    pub fn plane_a(&self) -> u8 {
        self.plane_a
    }

    /// Plane bound to the B slot.
    #[must_use]
    pub fn plane_b(&self) -> u8 {
        self.plane_b
    }

    /// Routes a hit into the slot matching its plane; hits on neither
    /// configured plane are dropped.
    pub fn insert(&mut self, hit: Hit) {
        if hit.plane == self.plane_a {
            self.cluster_a.insert(hit);
        } else if hit.plane == self.plane_b {
            self.cluster_b.insert(hit);
        }
    }

    /// Merges a cluster into the slot matching its plane, leaving the
    /// source empty; clusters on neither configured plane are dropped.
    pub fn merge(&mut self, cluster: &mut Cluster) {
        if cluster.plane() == self.plane_a {
            self.cluster_a.merge(cluster);
        } else if cluster.plane() == self.plane_b {
            self.cluster_b.merge(cluster);
        }
    }

    /// Clears both cluster slots.
    pub fn clear(&mut self) {
        self.cluster_a.clear();
        self.cluster_b.clear();
    }

    /// Total number of hits across both slots.
    #[must_use]
    pub fn total_hit_count(&self) -> usize {
        self.cluster_a.hit_count() + self.cluster_b.hit_count()
    }

    /// Returns true if both slots are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cluster_a.is_empty() && self.cluster_b.is_empty()
    }

    /// Returns true if neither slot is empty.
    #[must_use]
    pub fn both_planes(&self) -> bool {
        !self.cluster_a.is_empty() && !self.cluster_b.is_empty()
    }

    /// Earliest timestamp across both slots; undefined if empty.
    #[must_use]
    pub fn time_start(&self) -> u64 {
        if self.cluster_a.is_empty() {
            return self.cluster_b.time_start();
        }
        if self.cluster_b.is_empty() {
            return self.cluster_a.time_start();
        }
        self.cluster_a.time_start().min(self.cluster_b.time_start())
    }

    /// Latest timestamp across both slots; undefined if empty.
    #[must_use]
    pub fn time_end(&self) -> u64 {
        if self.cluster_a.is_empty() {
            return self.cluster_b.time_end();
        }
        if self.cluster_b.is_empty() {
            return self.cluster_a.time_end();
        }
        self.cluster_a.time_end().max(self.cluster_b.time_end())
    }

    /// Inclusive time span of the event; 0 if empty.
    #[must_use]
    pub fn time_span(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.time_end() - self.time_start()) + 1
    }

    /// Overlapping time span between this event and a cluster,
    /// inclusive of the endpoints; 0 if either is empty or they touch.
    #[must_use]
    pub fn time_overlap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return 0;
        }
        let latest_start = self.time_start().max(other.time_start());
        let earliest_end = self.time_end().min(other.time_end());
        if latest_start > earliest_end {
            return 0;
        }
        (earliest_end - latest_start) + 1
    }

    /// Time gap between this event and a cluster; 0 if they overlap or
    /// touch, `u64::MAX` if either is empty.
    #[must_use]
    pub fn time_gap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start().max(other.time_start());
        let earliest_end = self.time_end().min(other.time_end());
        if latest_start <= earliest_end {
            return 0;
        }
        latest_start - earliest_end
    }

    /// Human-readable description of the event and, optionally, its
    /// constituent clusters.
    #[must_use]
    pub fn describe(&self, prepend: &str, verbose: bool) -> String {
        let mut out = format!(
            "Event planes({}{},{}{})",
            self.plane_a,
            if self.cluster_a.is_empty() { "" } else { "*" },
            self.plane_b,
            if self.cluster_b.is_empty() { "" } else { "*" },
        );
        if !self.cluster_a.is_empty() {
            let _ = write!(
                out,
                "\n{prepend}  PlaneA:  {}",
                self.cluster_a.describe(&format!("{prepend}  "), verbose)
            );
        }
        if !self.cluster_b.is_empty() {
            let _ = write!(
                out,
                "\n{prepend}  PlaneB:  {}",
                self.cluster_b.describe(&format!("{prepend}  "), verbose)
            );
        }
        out
    }
}

impl TimeTagged for Event {
    /// Events are merged chronologically by their earliest timestamp.
    #[inline]
    fn time(&self) -> u64 {
        self.time_start()
    }
}
