//! Backend contract for application management on a target
//!
//! Every backend serving [`ApplicationCommandsCapability`] implements
//! [`ApplicationCommands`]. Long-running operations hand back a
//! [`CommandFuture`] and must resolve it exactly once; the rest return
//! directly.

use targetctl_core::prelude::*;
use targetctl_core::{CommandFuture, InstalledApplication, LaunchConfiguration};
use targetctl_forward::Capability;

/// Application management operations a target may support
pub trait ApplicationCommands: Send + Sync {
    /// Install the bundle at `path`
    ///
    /// Fails with [`Error::InstallationFailed`] carrying the backend's reason.
    fn install_application(&self, path: &str) -> CommandFuture<()>;

    /// Remove the application, failing with [`Error::ApplicationNotFound`]
    /// when it is not installed
    fn uninstall_application(&self, bundle_id: &str) -> CommandFuture<()>;

    /// `Ok(false)` means definitely absent; `Err` means the target could not
    /// tell
    fn is_application_installed(&self, bundle_id: &str) -> Result<bool>;

    /// Start the application described by `config`
    ///
    /// Returns once the launch is initiated, not when the process exits.
    fn launch_application(&self, config: &LaunchConfiguration) -> Result<()>;

    /// Terminate a running instance of the application
    fn kill_application(&self, bundle_id: &str) -> Result<()>;

    /// Every installed application; empty when nothing is installed
    fn installed_applications(&self) -> CommandFuture<Vec<InstalledApplication>>;
}

/// Registry marker for [`ApplicationCommands`] backends
#[derive(Debug, Clone, Copy)]
pub struct ApplicationCommandsCapability;

impl Capability for ApplicationCommandsCapability {
    const NAME: &'static str = "application-commands";
    type Backend = dyn ApplicationCommands;
}
