//! # targetctl-forward - Capability Routing
//!
//! Decides which backend services a capability call on a given target and
//! dispatches to it. Depends only on `targetctl-core`.
//!
//! ## Public API
//!
//! - [`Capability`] - Names a capability and the backend contract it routes to
//! - [`TargetRegistry`] - Per-target capability registrations with snapshot reads
//! - [`TargetSnapshot`] - Immutable, restartable view of targets supporting a capability
//! - [`CommandForwarder`] - Single and fan-out invocation over the registry
//! - [`TargetResult`] - Per-target outcome of a fan-out call

pub mod forwarder;
pub mod registry;

pub use forwarder::{CommandForwarder, TargetResult};
pub use registry::{Capability, TargetIter, TargetRegistry, TargetSnapshot};
