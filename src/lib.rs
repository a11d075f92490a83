//! targetctl Library
//!
//! Application management across devices and simulators: a capability
//! registry, a command forwarder and the command future every asynchronous
//! operation returns.
//!
//! ```no_run
//! use std::sync::Arc;
//! use targetctl::{
//!     ApplicationCommandClient, ApplicationCommandsCapability, BundleCatalog, MemoryBackend,
//!     Target, TargetKind, TargetRegistry,
//! };
//!
//! # fn main() -> targetctl::Result<()> {
//! let settings = targetctl::bootstrap(std::path::Path::new("."))?;
//!
//! let registry = Arc::new(TargetRegistry::new());
//! registry.attach::<ApplicationCommandsCapability>(
//!     Target::new("SIM-1", "iPhone 15", TargetKind::Simulator),
//!     Arc::new(MemoryBackend::new("SIM-1", BundleCatalog::new())),
//! )?;
//!
//! let client = ApplicationCommandClient::with_settings(registry, settings.commands);
//! let apps = client.wait(&client.installed_applications(&"SIM-1".into()))?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tracing::info;

pub use targetctl_apps::{
    config, init_config_dir, load_settings, save_settings, ApplicationCommandClient,
    ApplicationCommands, ApplicationCommandsCapability, Bundle, BundleCatalog, CommandSettings,
    LoggingSettings, MemoryBackend, Operation, RunningProcess, Settings,
};
pub use targetctl_core::{
    logging, prelude, CancellationSignal, CommandFuture, Error, FutureState, FutureValue,
    InstallType, InstalledApplication, LaunchConfiguration, LaunchMode, Outcome, OutputRouting,
    OutputTarget, Resolver, Result, ResultExt, Target, TargetId, TargetKind,
};
pub use targetctl_forward::{
    Capability, CommandForwarder, TargetRegistry, TargetResult, TargetSnapshot,
};

/// Load `.targetctl/config.toml` for `project_path` and start logging
///
/// Logging can only be started once per process; later calls fail with
/// [`Error::Config`].
pub fn bootstrap(project_path: &Path) -> Result<Settings> {
    let settings = load_settings(project_path);
    logging::init_with(
        &settings.logging.filter,
        settings.logging.directory.as_deref(),
    )?;
    info!(
        "Loaded settings for {} (await timeout {}ms)",
        project_path.display(),
        settings.commands.await_timeout_ms
    );
    Ok(settings)
}
