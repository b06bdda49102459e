//! Hit type for digitized detector readings.

use crate::time::TimeTagged;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Plane identity reserved for hits or clusters with no valid plane,
/// including clusters that have mixed two different planes.
pub const INVALID_PLANE: u8 = u8::MAX;

/// Coordinate value reserved for "no coordinate seen yet".
pub const INVALID_COORD: u16 = u16::MAX;

/// One digitized detector reading.
///
/// Produced by an external protocol decoder and geometry mapper, consumed
/// by value into clusters, and never mutated after insertion. Time is a
/// ns-scale monotonic clock; weight is the digitized amplitude (ADC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Detector plane the hit was read out on.
    pub plane: u8,
    /// Timestamp in detector time units.
    pub time: u64,
    /// Strip or wire coordinate within the plane.
    pub coordinate: u16,
    /// Amplitude of the reading.
    pub weight: u16,
}

impl Hit {
    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(plane: u8, time: u64, coordinate: u16, weight: u16) -> Self {
        Self {
            plane,
            time,
            coordinate,
            weight,
        }
    }

    /// Returns true if the hit carries a valid plane identity.
    #[inline]
    #[must_use]
    pub fn has_valid_plane(&self) -> bool {
        self.plane != INVALID_PLANE
    }
}

impl TimeTagged for Hit {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }
}

/// Chronological sequence of hits, as handed between pipeline stages.
pub type HitVector = Vec<Hit>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        let hit = Hit::new(1, 1000, 42, 7);
        assert_eq!(hit.plane, 1);
        assert_eq!(hit.time, 1000);
        assert_eq!(hit.coordinate, 42);
        assert_eq!(hit.weight, 7);
        assert!(hit.has_valid_plane());
    }

    #[test]
    fn invalid_plane_sentinel() {
        let hit = Hit::new(INVALID_PLANE, 0, 0, 0);
        assert!(!hit.has_valid_plane());
    }

    #[test]
    fn time_tagged() {
        let hit = Hit::new(0, 123, 0, 0);
        assert_eq!(TimeTagged::time(&hit), 123);
    }
}
