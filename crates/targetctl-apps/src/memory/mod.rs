//! In-memory simulated target
//!
//! [`MemoryBackend`] implements [`ApplicationCommands`] against an in-process
//! model of one target: a set of installed applications and the processes
//! running on it. Bundles are resolved through a [`BundleCatalog`].
//!
//! With [`MemoryBackend::with_latency`], asynchronous operations complete on a
//! tokio task after the configured delay and apply no side effects if they
//! are cancelled first.

mod catalog;

pub use catalog::{Bundle, BundleCatalog};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use targetctl_core::prelude::*;
use targetctl_core::{
    CommandFuture, FutureValue, InstalledApplication, LaunchConfiguration, LaunchMode,
    OutputRouting, TargetId,
};

use crate::commands::ApplicationCommands;

const FIRST_PID: u32 = 1000;

/// Operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Install,
    Uninstall,
    IsInstalled,
    Launch,
    Kill,
    ListInstalled,
}

impl Operation {
    /// The error a backend reports when this operation fails for `reason`
    fn error(self, reason: &str) -> Error {
        match self {
            Operation::Install => Error::installation_failed(reason),
            Operation::Launch => Error::launch_failed(reason),
            Operation::Kill => Error::kill_failed(reason),
            Operation::Uninstall | Operation::IsInstalled | Operation::ListInstalled => {
                Error::backend(reason)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Install => "install",
            Operation::Uninstall => "uninstall",
            Operation::IsInstalled => "is-installed",
            Operation::Launch => "launch",
            Operation::Kill => "kill",
            Operation::ListInstalled => "list-installed",
        };
        write!(f, "{}", name)
    }
}

/// A process started by a launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub bundle_id: String,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub output: OutputRouting,
    /// Started suspended until a debugger attaches
    pub waiting_for_debugger: bool,
    pub started_at: DateTime<Local>,
}

#[derive(Debug)]
struct State {
    installed: BTreeMap<String, InstalledApplication>,
    running: BTreeMap<String, RunningProcess>,
    faults: HashMap<Operation, String>,
    next_pid: u32,
}

impl State {
    fn check_fault(&self, operation: Operation) -> Result<()> {
        match self.faults.get(&operation) {
            Some(reason) => Err(operation.error(reason)),
            None => Ok(()),
        }
    }

    fn spawn_process(&mut self, config: &LaunchConfiguration) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.running.insert(
            config.bundle_id().to_string(),
            RunningProcess {
                pid,
                bundle_id: config.bundle_id().to_string(),
                arguments: config.arguments().to_vec(),
                environment: config.environment().clone(),
                output: config.output().clone(),
                waiting_for_debugger: config.wait_for_debugger(),
                started_at: Local::now(),
            },
        );
        pid
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_locked<T>(state: &Mutex<State>, apply: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
    let mut guard = lock(state);
    apply(&mut guard)
}

/// Simulated target backend
pub struct MemoryBackend {
    target: TargetId,
    catalog: BundleCatalog,
    latency: Option<Duration>,
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("target", &self.target)
            .field("bundles", &self.catalog.len())
            .field("latency", &self.latency)
            .finish()
    }
}

impl MemoryBackend {
    pub fn new(target: impl Into<TargetId>, catalog: BundleCatalog) -> Self {
        Self {
            target: target.into(),
            catalog,
            latency: None,
            state: Arc::new(Mutex::new(State {
                installed: BTreeMap::new(),
                running: BTreeMap::new(),
                faults: HashMap::new(),
                next_pid: FIRST_PID,
            })),
        }
    }

    /// Complete asynchronous operations on a tokio task after `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Start with `app` already installed (e.g. system applications)
    pub fn with_installed(self, app: InstalledApplication) -> Self {
        lock(&self.state)
            .installed
            .insert(app.bundle_id().to_string(), app);
        self
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Make every later call of `operation` fail with `reason`
    pub fn inject_fault(&self, operation: Operation, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("[{}] Injecting {} fault: {}", self.target, operation, reason);
        lock(&self.state).faults.insert(operation, reason);
    }

    pub fn clear_fault(&self, operation: Operation) {
        lock(&self.state).faults.remove(&operation);
    }

    pub fn running_process(&self, bundle_id: &str) -> Option<RunningProcess> {
        lock(&self.state).running.get(bundle_id).cloned()
    }

    /// Running processes, ordered by bundle id
    pub fn running_processes(&self) -> Vec<RunningProcess> {
        lock(&self.state).running.values().cloned().collect()
    }

    /// Run `apply` against the target state, inline or after the configured latency
    fn run<T, F>(&self, description: String, apply: F) -> CommandFuture<T>
    where
        T: FutureValue,
        F: FnOnce(&mut State) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);

        let Some(latency) = self.latency else {
            let (future, resolver) = CommandFuture::pending(description);
            resolver.complete_with(apply_locked(&state, apply));
            return future;
        };

        if tokio::runtime::Handle::try_current().is_err() {
            warn!("[{}] {} needs a tokio runtime for simulated latency", self.target, description);
            return CommandFuture::failed(Error::backend(
                "simulated latency requires a tokio runtime",
            ));
        }

        CommandFuture::spawn(description, move |mut signal| async move {
            tokio::select! {
                _ = signal.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep(latency) => apply_locked(&state, apply),
            }
        })
    }
}

impl ApplicationCommands for MemoryBackend {
    fn install_application(&self, path: &str) -> CommandFuture<()> {
        let target = self.target.clone();
        let path = path.to_string();
        let bundle = self.catalog.lookup(&path).cloned();

        self.run(format!("install {} on {}", path, self.target), move |state| {
            state.check_fault(Operation::Install)?;
            let bundle = bundle.ok_or_else(|| {
                Error::installation_failed(format!("No installable bundle at {}", path))
            })?;

            let app = InstalledApplication::new(
                bundle.bundle_id.as_str(),
                bundle.bundle_name.as_str(),
                path.as_str(),
                bundle.install_type,
            );
            if state.installed.insert(bundle.bundle_id.clone(), app).is_some() {
                info!("[{}] Reinstalled {}", target, bundle.bundle_id);
            } else {
                info!("[{}] Installed {}", target, bundle.bundle_id);
            }
            Ok(())
        })
    }

    fn uninstall_application(&self, bundle_id: &str) -> CommandFuture<()> {
        let target = self.target.clone();
        let bundle_id = bundle_id.to_string();

        self.run(format!("uninstall {} from {}", bundle_id, self.target), move |state| {
            state.check_fault(Operation::Uninstall)?;
            if state.installed.remove(&bundle_id).is_none() {
                return Err(Error::application_not_found(bundle_id));
            }
            if let Some(process) = state.running.remove(&bundle_id) {
                debug!("[{}] Terminated pid {} during uninstall", target, process.pid);
            }
            info!("[{}] Uninstalled {}", target, bundle_id);
            Ok(())
        })
    }

    fn is_application_installed(&self, bundle_id: &str) -> Result<bool> {
        let state = lock(&self.state);
        state.check_fault(Operation::IsInstalled)?;
        Ok(state.installed.contains_key(bundle_id))
    }

    fn launch_application(&self, config: &LaunchConfiguration) -> Result<()> {
        let mut state = lock(&self.state);
        state.check_fault(Operation::Launch)?;

        let bundle_id = config.bundle_id();
        if !state.installed.contains_key(bundle_id) {
            return Err(Error::application_not_found(bundle_id));
        }

        if let Some(process) = state.running.get(bundle_id) {
            match config.launch_mode() {
                LaunchMode::FailIfRunning => {
                    return Err(Error::launch_failed(format!(
                        "{} is already running (pid {})",
                        bundle_id, process.pid
                    )));
                }
                LaunchMode::ForegroundIfRunning => {
                    debug!("[{}] {} already running, brought to foreground", self.target, bundle_id);
                    return Ok(());
                }
                LaunchMode::RelaunchIfRunning => {
                    debug!("[{}] Relaunching {} (was pid {})", self.target, bundle_id, process.pid);
                }
            }
        }

        let pid = state.spawn_process(config);
        info!("[{}] Launched {} as pid {}", self.target, bundle_id, pid);
        Ok(())
    }

    fn kill_application(&self, bundle_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.check_fault(Operation::Kill)?;

        match state.running.remove(bundle_id) {
            Some(process) => {
                info!("[{}] Killed {} (pid {})", self.target, bundle_id, process.pid);
                Ok(())
            }
            None => Err(Error::application_not_running(bundle_id)),
        }
    }

    fn installed_applications(&self) -> CommandFuture<Vec<InstalledApplication>> {
        self.run(format!("list applications on {}", self.target), |state| {
            state.check_fault(Operation::ListInstalled)?;
            Ok(state.installed.values().cloned().collect())
        })
    }
}
