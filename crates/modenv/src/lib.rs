// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! modenv - Named Mod Environment Manager
//!
//! This crate provides the core library for keeping several named
//! environments of a game's mod setup and switching between them.
//!
//! # Overview
//!
//! An environment is a snapshot of which mods are disabled, which are held
//! back from updates, and which data and write directories are in use.
//! Activating an environment reconciles the live installation against that
//! snapshot: listed mods are switched off, every other installed mod is
//! switched on, and the held set is replaced. The active marker only moves
//! once all of that has been applied.
//!
//! # Example
//!
//! ```yaml
//! # ~/.config/modenv/envs.yaml
//! api: modenv/v0
//! active: default
//! environments:
//!   default:
//!     data_path: /opt/factorio/data
//!     write_path: /home/me/.factorio
//!     disabled: []
//!     held: [bobs_logistics]
//!   speedrun:
//!     data_path: /opt/factorio/data
//!     write_path: /home/me/.factorio
//!     disabled: [bobs_logistics, rso-mod]
//! ```

pub mod config;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod lock;
pub mod manager;
pub mod mod_list;
pub mod paths;
pub mod persist;
pub mod registry;
pub mod store;

use std::path::PathBuf;

pub use config::{Config, ConfigFile, HostConfig};
pub use discovery::DiscoveryOptions;
pub use environment::{Environment, DEFAULT_ENV};
pub use error::{Error, PathKind, Result};
pub use lock::StoreLock;
pub use manager::{
    ActivationPhase, ActivationReport, Confirm, DeleteReport, EnvironmentManager, ListEntry,
    ModChange, SnapshotKind, ToggleReport,
};
pub use mod_list::ModListRegistry;
pub use paths::{FactorioLayout, PathValidator};
pub use registry::{ModDescriptor, ModRegistry};
pub use store::EnvironmentStore;

/// Well-known filename for the environments store.
pub const STORE_FILENAME: &str = "envs.yaml";

/// Well-known filename for the host configuration.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Per-user directory holding [`STORE_FILENAME`] and [`CONFIG_FILENAME`].
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modenv"))
}
