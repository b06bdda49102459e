//! Error types for event formation.
//!
//! Only configuration-class mistakes surface as errors. Data-quality
//! anomalies (wrong-plane clusters, zero-weight centroids, ambiguous
//! multi-hit splits) are expected background in a live detector stream
//! and are tracked through statistics counters instead.

use thiserror::Error;

/// Result type alias for event formation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the event formation core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Module index out of range for a chronological merger.
    #[error("invalid module index {module}, merger was configured with {module_count} modules")]
    InvalidModule {
        /// Offending module index.
        module: usize,
        /// Number of modules the merger was configured with.
        module_count: usize,
    },
}
