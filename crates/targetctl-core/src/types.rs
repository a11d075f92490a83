//! Domain types for targets and the applications installed on them

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Targets
// ─────────────────────────────────────────────────────────────────

/// Stable identity of a target (UDID for devices and simulators)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether a target is physical hardware or a virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Device,
    #[default]
    Simulator,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Device => write!(f, "Device"),
            TargetKind::Simulator => write!(f, "Simulator"),
        }
    }
}

/// A controllable device or simulator endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Target {
    /// Stable identifier, used as the registry key
    pub id: TargetId,

    /// Human-readable name (e.g., "iPhone 15 Pro")
    pub name: String,

    pub kind: TargetKind,

    /// OS version reported by the target (e.g., "iOS 17.2")
    #[serde(default)]
    pub os_version: Option<String>,
}

impl Target {
    pub fn new(id: impl Into<TargetId>, name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            os_version: None,
        }
    }

    /// Set the OS version (builder pattern)
    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = Some(os_version.into());
        self
    }

    /// Get display string for the target
    pub fn display_string(&self) -> String {
        match &self.os_version {
            Some(version) => format!("{} ({}, {})", self.name, self.kind, version),
            None => format!("{} ({})", self.name, self.kind),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Installed Applications
// ─────────────────────────────────────────────────────────────────

/// How an application came to be installed on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    #[default]
    User,
    System,
    Developer,
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallType::User => write!(f, "user"),
            InstallType::System => write!(f, "system"),
            InstallType::Developer => write!(f, "developer"),
        }
    }
}

/// An application installed on a target
///
/// Only produced by listing operations; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct InstalledApplication {
    bundle_id: String,
    bundle_name: String,
    install_path: String,
    install_type: InstallType,
}

impl InstalledApplication {
    pub fn new(
        bundle_id: impl Into<String>,
        bundle_name: impl Into<String>,
        install_path: impl Into<String>,
        install_type: InstallType,
    ) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            bundle_name: bundle_name.into(),
            install_path: install_path.into(),
            install_type,
        }
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn bundle_name(&self) -> &str {
        &self.bundle_name
    }

    pub fn install_path(&self) -> &str {
        &self.install_path
    }

    pub fn install_type(&self) -> InstallType {
        self.install_type
    }
}

// ─────────────────────────────────────────────────────────────────
// Launch Configuration
// ─────────────────────────────────────────────────────────────────

/// Where a launched process writes one of its output streams
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    #[default]
    Discard,
    /// Forward to the caller's own stream
    Inherit,
    File(PathBuf),
}

/// Output routing for a launched process
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct OutputRouting {
    #[serde(default)]
    pub stdout: OutputTarget,
    #[serde(default)]
    pub stderr: OutputTarget,
}

/// Policy applied when the application is already running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    FailIfRunning,
    RelaunchIfRunning,
    ForegroundIfRunning,
}

/// Everything needed to launch one application
///
/// Built once by the caller and passed by reference to launch operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LaunchConfiguration {
    bundle_id: String,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    #[serde(default)]
    output: OutputRouting,
    #[serde(default)]
    launch_mode: LaunchMode,
    #[serde(default)]
    wait_for_debugger: bool,
}

impl LaunchConfiguration {
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
            output: OutputRouting::default(),
            launch_mode: LaunchMode::default(),
            wait_for_debugger: false,
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_output(mut self, output: OutputRouting) -> Self {
        self.output = output;
        self
    }

    pub fn with_launch_mode(mut self, launch_mode: LaunchMode) -> Self {
        self.launch_mode = launch_mode;
        self
    }

    pub fn waiting_for_debugger(mut self) -> Self {
        self.wait_for_debugger = true;
        self
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn output(&self) -> &OutputRouting {
        &self.output
    }

    pub fn launch_mode(&self) -> LaunchMode {
        self.launch_mode
    }

    pub fn wait_for_debugger(&self) -> bool {
        self.wait_for_debugger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_string() {
        let target = Target::new("SIM-1", "iPhone 15", TargetKind::Simulator);
        assert_eq!(target.display_string(), "iPhone 15 (Simulator)");

        let target = target.with_os_version("iOS 17.2");
        assert_eq!(target.display_string(), "iPhone 15 (Simulator, iOS 17.2)");
    }

    #[test]
    fn test_target_id_ordering_and_display() {
        let a = TargetId::from("A");
        let b = TargetId::from("B".to_string());
        assert!(a < b);
        assert_eq!(a.to_string(), "A");
        assert_eq!(b.as_str(), "B");
    }

    #[test]
    fn test_installed_application_accessors() {
        let app = InstalledApplication::new(
            "com.example.app",
            "Example",
            "/data/Bundle/com.example.app",
            InstallType::Developer,
        );
        assert_eq!(app.bundle_id(), "com.example.app");
        assert_eq!(app.bundle_name(), "Example");
        assert_eq!(app.install_path(), "/data/Bundle/com.example.app");
        assert_eq!(app.install_type(), InstallType::Developer);
        assert_eq!(app.install_type().to_string(), "developer");
    }

    #[test]
    fn test_launch_configuration_builder() {
        let config = LaunchConfiguration::new("com.example.app")
            .with_arguments(["--verbose", "--seed=4"])
            .with_env("LOG_LEVEL", "debug")
            .with_launch_mode(LaunchMode::RelaunchIfRunning)
            .waiting_for_debugger();

        assert_eq!(config.bundle_id(), "com.example.app");
        assert_eq!(config.arguments(), ["--verbose", "--seed=4"]);
        assert_eq!(config.environment().get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert_eq!(config.launch_mode(), LaunchMode::RelaunchIfRunning);
        assert!(config.wait_for_debugger());
        assert_eq!(config.output(), &OutputRouting::default());
    }

    #[test]
    fn test_launch_configuration_arguments_keep_order() {
        let config = LaunchConfiguration::new("x").with_arguments(vec!["b", "a", "c"]);
        assert_eq!(config.arguments(), ["b", "a", "c"]);
    }
}
