//! Caller-facing application command surface
//!
//! [`ApplicationCommandClient`] names the target on every call and lets the
//! forwarder pick the backend registered for it.

use std::sync::Arc;

use targetctl_core::prelude::*;
use targetctl_core::{
    CommandFuture, FutureValue, InstalledApplication, LaunchConfiguration, Target, TargetId,
};
use targetctl_forward::{Capability, CommandForwarder, TargetRegistry, TargetResult};

use crate::commands::ApplicationCommandsCapability;
use crate::config::CommandSettings;

type Apps = ApplicationCommandsCapability;

/// Application management across registered targets
#[derive(Debug, Clone)]
pub struct ApplicationCommandClient {
    forwarder: CommandForwarder,
    settings: CommandSettings,
}

impl ApplicationCommandClient {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self::with_settings(registry, CommandSettings::default())
    }

    pub fn with_settings(registry: Arc<TargetRegistry>, settings: CommandSettings) -> Self {
        Self {
            forwarder: CommandForwarder::new(registry),
            settings,
        }
    }

    pub fn forwarder(&self) -> &CommandForwarder {
        &self.forwarder
    }

    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    /// Targets that currently accept application commands, ordered by id
    pub fn targets(&self) -> Vec<Target> {
        self.forwarder
            .registry()
            .targets_supporting(Apps::NAME)
            .iter()
            .cloned()
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────
    // Single Target
    // ─────────────────────────────────────────────────────────────────

    pub fn install_application(&self, target: &TargetId, path: &str) -> CommandFuture<()> {
        debug!("Installing {} on {}", path, target);
        self.forwarder
            .invoke_future::<Apps, _, _>(target, |backend| backend.install_application(path))
    }

    pub fn uninstall_application(&self, target: &TargetId, bundle_id: &str) -> CommandFuture<()> {
        debug!("Uninstalling {} from {}", bundle_id, target);
        self.forwarder
            .invoke_future::<Apps, _, _>(target, |backend| backend.uninstall_application(bundle_id))
    }

    pub fn is_application_installed(&self, target: &TargetId, bundle_id: &str) -> Result<bool> {
        self.forwarder
            .invoke_sync::<Apps, _, _>(target, |backend| backend.is_application_installed(bundle_id))
    }

    pub fn launch_application(&self, target: &TargetId, config: &LaunchConfiguration) -> Result<()> {
        debug!("Launching {} on {}", config.bundle_id(), target);
        self.forwarder
            .invoke_sync::<Apps, _, _>(target, |backend| backend.launch_application(config))
    }

    pub fn kill_application(&self, target: &TargetId, bundle_id: &str) -> Result<()> {
        debug!("Killing {} on {}", bundle_id, target);
        self.forwarder
            .invoke_sync::<Apps, _, _>(target, |backend| backend.kill_application(bundle_id))
    }

    pub fn installed_applications(&self, target: &TargetId) -> CommandFuture<Vec<InstalledApplication>> {
        self.forwarder
            .invoke_future::<Apps, _, _>(target, |backend| backend.installed_applications())
    }

    // ─────────────────────────────────────────────────────────────────
    // Fan-out
    // ─────────────────────────────────────────────────────────────────

    /// List applications on every target; one failing target does not hide
    /// the others
    pub fn installed_applications_on(
        &self,
        targets: &[TargetId],
    ) -> CommandFuture<Vec<TargetResult<Vec<InstalledApplication>>>> {
        self.forwarder
            .invoke_all::<Apps, _, _>(targets, |backend| backend.installed_applications())
    }

    /// Install the same bundle on every target, failing with the first error
    pub fn install_application_on(&self, targets: &[TargetId], path: &str) -> CommandFuture<()> {
        info!("Installing {} on {} targets", path, targets.len());
        self.forwarder
            .invoke_all_fail_fast::<Apps, _, _>(targets, |backend| backend.install_application(path))
            .then(|_| ())
    }

    pub fn is_application_installed_on(
        &self,
        targets: &[TargetId],
        bundle_id: &str,
    ) -> Vec<TargetResult<bool>> {
        self.forwarder.invoke_all_sync::<Apps, _, _>(targets, |backend| {
            backend.is_application_installed(bundle_id)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Waiting
    // ─────────────────────────────────────────────────────────────────

    /// Block for the result using the configured await timeout
    pub fn wait<T: FutureValue>(&self, future: &CommandFuture<T>) -> Result<T> {
        future.wait_timeout(self.settings.await_timeout())
    }

    /// Await the result using the configured await timeout
    pub async fn wait_async<T: FutureValue>(&self, future: &CommandFuture<T>) -> Result<T> {
        future.result_timeout(self.settings.await_timeout()).await
    }
}
