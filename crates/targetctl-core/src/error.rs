//! Error taxonomy shared by every targetctl layer

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types organized by layer
///
/// Errors are `Clone` because a single failure is observed by every consumer
/// of a [`CommandFuture`](crate::future::CommandFuture).
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Routing Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Target {target} does not support capability '{capability}'")]
    CapabilityNotSupported { target: String, capability: String },

    #[error("Capability '{capability}' is already registered for target {target}")]
    DuplicateRegistration { target: String, capability: String },

    // ─────────────────────────────────────────────────────────────
    // Application Command Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Application not found: {bundle_id}")]
    ApplicationNotFound { bundle_id: String },

    #[error("Application is not running: {bundle_id}")]
    ApplicationNotRunning { bundle_id: String },

    #[error("Installation failed: {reason}")]
    InstallationFailed { reason: String },

    #[error("Launch failed: {reason}")]
    LaunchFailed { reason: String },

    #[error("Kill failed: {reason}")]
    KillFailed { reason: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    // ─────────────────────────────────────────────────────────────
    // Completion Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Result channel closed before the operation completed")]
    ChannelClosed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn capability_not_supported(target: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::CapabilityNotSupported {
            target: target.into(),
            capability: capability.into(),
        }
    }

    pub fn duplicate_registration(target: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            target: target.into(),
            capability: capability.into(),
        }
    }

    pub fn application_not_found(bundle_id: impl Into<String>) -> Self {
        Self::ApplicationNotFound {
            bundle_id: bundle_id.into(),
        }
    }

    pub fn application_not_running(bundle_id: impl Into<String>) -> Self {
        Self::ApplicationNotRunning {
            bundle_id: bundle_id.into(),
        }
    }

    pub fn installation_failed(reason: impl Into<String>) -> Self {
        Self::InstallationFailed {
            reason: reason.into(),
        }
    }

    pub fn launch_failed(reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            reason: reason.into(),
        }
    }

    pub fn kill_failed(reason: impl Into<String>) -> Self {
        Self::KillFailed {
            reason: reason.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Errors raised by the routing layer itself rather than by a backend
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            Error::CapabilityNotSupported { .. } | Error::DuplicateRegistration { .. }
        )
    }

    /// Check if the caller may reasonably retry the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Cancelled
                | Error::Backend { .. }
                | Error::KillFailed { .. }
                | Error::LaunchFailed { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::capability_not_supported("SIM-1", "application-commands");
        assert_eq!(
            err.to_string(),
            "Target SIM-1 does not support capability 'application-commands'"
        );

        let err = Error::installation_failed("invalid signature");
        assert_eq!(err.to_string(), "Installation failed: invalid signature");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_cloneable() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_error_is_routing() {
        assert!(Error::capability_not_supported("a", "b").is_routing());
        assert!(Error::duplicate_registration("a", "b").is_routing());
        assert!(!Error::application_not_found("com.example.app").is_routing());
        assert!(!Error::Cancelled.is_routing());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::timeout(Duration::from_secs(1)).is_recoverable());
        assert!(Error::backend("device busy").is_recoverable());
        assert!(!Error::capability_not_supported("a", "b").is_recoverable());
        assert!(!Error::application_not_found("x").is_recoverable());
    }

    #[test]
    fn test_backend_reasons_kept_verbatim() {
        let reason = "insufficient storage (需要 12 MB)";
        match Error::installation_failed(reason) {
            Error::InstallationFailed { reason: r } => assert_eq!(r, reason),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_result_ext_context_preserves_error() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.context("reading catalog").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
