//! eventform-reduction: Streaming state machines for neutron event formation.
//!
//! Three stages, each latency-bounded and single-threaded:
//! - **Clusterers** group a chronological per-plane hit stream into
//!   spatio-temporal clusters (`GapClusterer`, `HierarchicalClusterer`).
//! - **Matchers** pair clusters from two complementary planes into
//!   events (`GapMatcher`, `MultiHitMatcher`).
//! - **`ChronoMerger`** restores global chronological order across
//!   several independently ordered pipelines.
//!
#![warn(missing_docs)]

pub mod clustering;
pub mod matching;
pub mod merger;

pub use clustering::{
    describe_clusters, Clusterer, ClusterQueue, GapClusterer, GapClustererConfig,
    HierarchicalClusterer, HierarchicalClustererConfig,
};
pub use matching::{
    GapMatcher, GapMatcherConfig, Matcher, MatcherBase, MultiHitMatcher, MultiHitMatcherConfig,
};
pub use merger::{ChronoMerger, NeutronEvent};

// Re-export the core types every pipeline needs alongside the stages.
pub use eventform_core::{Cluster, Error, Event, Hit, Result, TimeTagged};
