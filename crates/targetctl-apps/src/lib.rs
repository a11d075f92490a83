//! # targetctl-apps - Application Management
//!
//! Install, uninstall, launch, kill and enumerate applications on targets.
//!
//! ## Public API
//!
//! ### Backend Contract (`commands`)
//! - [`ApplicationCommands`] - Operations every application backend implements
//! - [`ApplicationCommandsCapability`] - Registry marker routing to those backends
//!
//! ### Client (`client`)
//! - [`ApplicationCommandClient`] - Per-target and fan-out calls through the forwarder
//!
//! ### Simulated Target (`memory`)
//! - [`MemoryBackend`] - In-process target with latency and fault injection
//! - [`BundleCatalog`], [`Bundle`] - Host path to bundle metadata lookup
//!
//! ### Configuration (`config`)
//! - [`Settings`] - Contents of `.targetctl/config.toml`
//! - [`load_settings`], [`save_settings`], [`init_config_dir`]

pub mod client;
pub mod commands;
pub mod config;
pub mod memory;

pub use client::ApplicationCommandClient;
pub use commands::{ApplicationCommands, ApplicationCommandsCapability};
pub use config::{
    init_config_dir, load_settings, parse_settings, save_settings, CommandSettings,
    LoggingSettings, Settings,
};
pub use memory::{Bundle, BundleCatalog, MemoryBackend, Operation, RunningProcess};
