//! Cluster: an aggregate of same-plane hits with cached bounds and sums.

use std::fmt::Write as _;

use crate::hit::{Hit, HitVector, INVALID_COORD, INVALID_PLANE};

/// A container of hits, aware of its plane, bounds and weight.
///
/// Hits can be added but not removed. Coordinates and timestamps are
/// treated as having an uncertainty of one unit when evaluating spans,
/// so the endpoints are included. All aggregate sums are maintained
/// incrementally, making the accessors O(1).
///
/// Inserting or merging hits from a different plane does not discard
/// anything; the cluster is merely marked invalid, preserving the data
/// for inspection.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Hits in insertion order. Public so that analysis strategies can
    /// reorder them without copying.
    pub hits: HitVector,

    plane: u8,

    coord_start: u16,
    coord_end: u16,

    time_start: u64,
    time_end: u64,

    weight_sum: f64,
    coord_mass: f64,
    time_mass: f64,

    weight2_sum: f64,
    coord_mass2: f64,
    time_mass2: f64,

    // Insertion indices of the first and last hit carrying the latest
    // timestamp, for the micro-TPC coordinate estimate.
    utpc_idx_min: usize,
    utpc_idx_max: usize,
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hits: HitVector::new(),
            plane: INVALID_PLANE,
            coord_start: INVALID_COORD,
            coord_end: 0,
            time_start: u64::MAX,
            time_end: 0,
            weight_sum: 0.0,
            coord_mass: 0.0,
            time_mass: 0.0,
            weight2_sum: 0.0,
            coord_mass2: 0.0,
            time_mass2: 0.0,
            utpc_idx_min: 0,
            utpc_idx_max: 0,
        }
    }

    /// Adds a hit, accumulating mass and recalculating bounds.
    ///
    /// No validation is enforced and duplicates are possible. No
    /// particular time or spatial ordering is expected. A hit from a
    /// different plane invalidates the cluster's plane but is still
    /// added.
    pub fn insert(&mut self, hit: Hit) {
        if self.hits.is_empty() {
            self.plane = hit.plane;
            self.time_start = hit.time;
            self.time_end = hit.time;
            self.coord_start = hit.coordinate;
            self.coord_end = hit.coordinate;
            self.utpc_idx_min = 0;
            self.utpc_idx_max = 0;
        }

        if self.plane != hit.plane {
            self.plane = INVALID_PLANE;
        }

        let weight = f64::from(hit.weight);
        let coordinate = f64::from(hit.coordinate);
        // u64 -> f64 loses precision above 2^53; acceptable for mass sums
        #[allow(clippy::cast_precision_loss)]
        let time = hit.time as f64;

        self.hits.push(hit);
        self.weight_sum += weight;
        self.weight2_sum += weight * weight;
        self.coord_mass += weight * coordinate;
        self.coord_mass2 += weight * weight * coordinate;
        self.time_mass += weight * time;
        self.time_mass2 += weight * weight * time;

        self.time_start = self.time_start.min(hit.time);
        if hit.time == self.time_end {
            // another hit sharing the latest timestamp
            self.utpc_idx_max = self.hits.len() - 1;
        } else if hit.time > self.time_end {
            self.utpc_idx_min = self.hits.len() - 1;
            self.utpc_idx_max = self.utpc_idx_min;
            self.time_end = hit.time;
        }

        self.coord_start = self.coord_start.min(hit.coordinate);
        self.coord_end = self.coord_end.max(hit.coordinate);
    }

    /// Merges another cluster into this one, leaving `other` empty.
    ///
    /// Hits are moved, bounds recalculated and sums aggregated. A plane
    /// mismatch invalidates the plane but the merge still happens.
    pub fn merge(&mut self, other: &mut Cluster) {
        if other.hits.is_empty() {
            return;
        }

        if self.hits.is_empty() {
            *self = std::mem::take(other);
            return;
        }

        if other.plane != self.plane {
            self.plane = INVALID_PLANE;
        }

        let offset = self.hits.len();
        if other.time_end > self.time_end {
            self.utpc_idx_min = offset + other.utpc_idx_min;
            self.utpc_idx_max = offset + other.utpc_idx_max;
        } else if other.time_end == self.time_end {
            self.utpc_idx_max = offset + other.utpc_idx_max;
        }

        self.hits.append(&mut other.hits);

        self.weight_sum += other.weight_sum;
        self.weight2_sum += other.weight2_sum;
        self.coord_mass += other.coord_mass;
        self.coord_mass2 += other.coord_mass2;
        self.time_mass += other.time_mass;
        self.time_mass2 += other.time_mass2;
        self.time_start = self.time_start.min(other.time_start);
        self.time_end = self.time_end.max(other.time_end);
        self.coord_start = self.coord_start.min(other.coord_start);
        self.coord_end = self.coord_end.max(other.coord_end);

        other.clear();
    }

    /// Clears hits and resets all cached values.
    pub fn clear(&mut self) {
        *self = Cluster::new();
    }

    /// Returns true if the cluster contains no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true if the cluster contains hits, all on the same plane.
    #[must_use]
    pub fn valid(&self) -> bool {
        !self.hits.is_empty() && self.plane != INVALID_PLANE
    }

    /// Plane of all hits in the cluster, or [`INVALID_PLANE`] if hits
    /// from two different planes have been inserted.
    #[must_use]
    pub fn plane(&self) -> u8 {
        self.plane
    }

    /// Number of hits in the cluster.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Lowest coordinate; undefined for an empty cluster.
    #[must_use]
    pub fn coord_start(&self) -> u16 {
        self.coord_start
    }

    /// Highest coordinate; undefined for an empty cluster.
    #[must_use]
    pub fn coord_end(&self) -> u16 {
        self.coord_end
    }

    /// Inclusive coordinate span; 0 for an empty cluster.
    #[must_use]
    pub fn coord_span(&self) -> u16 {
        if self.hits.is_empty() {
            return 0;
        }
        (self.coord_end - self.coord_start) + 1
    }

    /// Earliest timestamp; undefined for an empty cluster.
    #[must_use]
    pub fn time_start(&self) -> u64 {
        self.time_start
    }

    /// Latest timestamp; undefined for an empty cluster.
    #[must_use]
    pub fn time_end(&self) -> u64 {
        self.time_end
    }

    /// Inclusive time span; 0 for an empty cluster.
    #[must_use]
    pub fn time_span(&self) -> u64 {
        if self.hits.is_empty() {
            return 0;
        }
        (self.time_end - self.time_start) + 1
    }

    /// Sum of hit weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Sum of squared hit weights.
    #[must_use]
    pub fn weight2_sum(&self) -> f64 {
        self.weight2_sum
    }

    /// Sum of weight * coordinate over all hits.
    #[must_use]
    pub fn coord_mass(&self) -> f64 {
        self.coord_mass
    }

    /// Center of mass in the coordinate dimension.
    ///
    /// NaN if the weight sum is zero; this is an expected edge case for
    /// zero-amplitude hits, not an error.
    #[must_use]
    pub fn coord_center(&self) -> f64 {
        self.coord_mass / self.weight_sum
    }

    /// Sum of weight * time over all hits.
    #[must_use]
    pub fn time_mass(&self) -> f64 {
        self.time_mass
    }

    /// Center of mass in the time dimension. NaN if the weight sum is zero.
    #[must_use]
    pub fn time_center(&self) -> f64 {
        self.time_mass / self.weight_sum
    }

    /// Sum of weight^2 * coordinate over all hits.
    #[must_use]
    pub fn coord_mass2(&self) -> f64 {
        self.coord_mass2
    }

    /// Squared-weighted center of mass in the coordinate dimension.
    /// NaN if the squared weight sum is zero.
    #[must_use]
    pub fn coord_center2(&self) -> f64 {
        self.coord_mass2 / self.weight2_sum
    }

    /// Sum of weight^2 * time over all hits.
    #[must_use]
    pub fn time_mass2(&self) -> f64 {
        self.time_mass2
    }

    /// Squared-weighted center of mass in the time dimension.
    /// NaN if the squared weight sum is zero.
    #[must_use]
    pub fn time_center2(&self) -> f64 {
        self.time_mass2 / self.weight2_sum
    }

    /// Checks whether the cluster's coordinates contain an internal gap
    /// larger than `max_allowed_gap`: a run of more than
    /// `max_allowed_gap` consecutive unoccupied coordinates between two
    /// occupied ones.
    #[must_use]
    pub fn has_gap(&self, max_allowed_gap: u16) -> bool {
        let mut coords: Vec<u16> = self.hits.iter().map(|h| h.coordinate).collect();
        coords.sort_unstable();
        // widened so max_allowed_gap == u16::MAX cannot overflow
        coords
            .windows(2)
            .any(|w| u32::from(w[1] - w[0]) > u32::from(max_allowed_gap) + 1)
    }

    /// Micro-TPC coordinate estimate: the coordinate of the latest-time
    /// hit, optionally charge-weighted over its insertion-order
    /// neighbours. Between several hits sharing the latest timestamp,
    /// the one closer to an insertion edge wins, ties resolved by
    /// weight. NaN for an empty cluster.
    #[must_use]
    pub fn coord_utpc(&self, weighted: bool) -> f64 {
        if self.hits.is_empty() {
            return f64::NAN;
        }

        let last = self.hits.len() - 1;
        let idx = if self.utpc_idx_min == self.utpc_idx_max {
            self.utpc_idx_max
        } else if self.utpc_idx_min < last - self.utpc_idx_max {
            self.utpc_idx_min
        } else if self.utpc_idx_min > last - self.utpc_idx_max {
            self.utpc_idx_max
        } else if self.hits[self.utpc_idx_min].weight > self.hits[self.utpc_idx_max].weight {
            self.utpc_idx_min
        } else {
            self.utpc_idx_max
        };

        if !weighted {
            return f64::from(self.hits[idx].coordinate);
        }

        // squared-charge center of mass over the hit and its neighbours
        let mut mass = 0.0;
        let mut norm = 0.0;
        let lo = idx.saturating_sub(1);
        let hi = (idx + 1).min(last);
        for hit in &self.hits[lo..=hi] {
            let w2 = f64::from(hit.weight) * f64::from(hit.weight);
            mass += f64::from(hit.coordinate) * w2;
            norm += w2;
        }
        mass / norm
    }

    /// Overlapping time span against another cluster, inclusive of the
    /// endpoints. 0 if either cluster is empty or they merely touch.
    #[must_use]
    pub fn time_overlap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return 0;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        if latest_start > earliest_end {
            return 0;
        }
        (earliest_end - latest_start) + 1
    }

    /// Time gap to another cluster; 0 if the clusters overlap or touch.
    ///
    /// The gap between empty clusters is undefined, so `u64::MAX` is
    /// returned in that case.
    #[must_use]
    pub fn time_gap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        if latest_start <= earliest_end {
            return 0;
        }
        latest_start - earliest_end
    }

    /// Human-readable description of bounds and weights.
    #[must_use]
    pub fn describe(&self, prepend: &str, verbose: bool) -> String {
        let mut out = format!(
            "plane={} time=({},{})={} space=({},{})={} weight={} entries[{}]",
            self.plane,
            self.time_start,
            self.time_end,
            self.time_span(),
            self.coord_start,
            self.coord_end,
            self.coord_span(),
            self.weight_sum,
            self.hits.len()
        );
        if verbose && !self.hits.is_empty() {
            out.push('\n');
            for hit in &self.hits {
                let _ = writeln!(out, "{prepend}  {hit:?}");
            }
        }
        out
    }
}
