//! # targetctl-core - Core Domain Types
//!
//! Foundation crate for targetctl. Provides domain types, error handling, the
//! [`CommandFuture`] result primitive and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tokio, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Target`], [`TargetId`], [`TargetKind`] - Device and simulator endpoints
//! - [`InstalledApplication`], [`InstallType`] - Listing results
//! - [`LaunchConfiguration`], [`OutputRouting`], [`LaunchMode`] - Launch requests
//!
//! ### Futures (`future`)
//! - [`CommandFuture`] - Single-resolution result with cancellation and combinators
//! - [`Resolver`] - Producer handle that completes a future
//! - [`Outcome`], [`FutureState`] - Terminal outcome and observable state
//! - [`CancellationSignal`] - Cooperative cancellation for the producing work
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum covering routing, application and completion failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use targetctl_core::prelude::*;
//! ```

pub mod error;
pub mod future;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all targetctl crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{Error, Result, ResultExt};
pub use future::{CancellationSignal, CommandFuture, FutureState, FutureValue, Outcome, Resolver};
pub use types::{
    InstallType, InstalledApplication, LaunchConfiguration, LaunchMode, OutputRouting,
    OutputTarget, Target, TargetId, TargetKind,
};
