//! eventform-core: Core data types for neutron event formation.
//!
//! This crate provides the leaf abstractions shared by every detector
//! front-end: digitized hits, same-plane hit clusters with cached
//! aggregate sums, and two-plane events. The streaming state machines
//! that produce clusters and events live in `eventform-reduction`.

pub mod cluster;
pub mod error;
pub mod event;
pub mod hit;
pub mod time;

pub use cluster::Cluster;
pub use error::{Error, Result};
pub use event::Event;
pub use hit::{Hit, HitVector, INVALID_COORD, INVALID_PLANE};
pub use time::TimeTagged;
