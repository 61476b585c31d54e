// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for modenv operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with modenv Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of an environment's two install paths failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Data,
    Write,
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur during modenv operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Referenced environment is not in the store, or no store exists yet
    #[error("env {0} not found")]
    #[diagnostic(
        code(modenv::not_found),
        help("Run 'modenv env list' to see the available environments")
    )]
    NotFound(String),

    /// Attempt to remove the reserved default environment
    #[error("cannot delete the {0} env")]
    #[diagnostic(
        code(modenv::protected_environment),
        help("The default environment always exists; overwrite it with 'modenv env create default' instead")
    )]
    ProtectedEnvironment(String),

    /// A data or write path failed validation
    #[error("wrong {kind} path {path:?} on environment {environment}")]
    #[diagnostic(code(modenv::invalid_path), help("{}", path_help(*kind)))]
    InvalidPath {
        kind: PathKind,
        path: PathBuf,
        environment: String,
    },

    /// A path set in the base configuration failed validation
    #[error("The supplied {kind} path ({path:?}) does not seem to be correct")]
    #[diagnostic(
        code(modenv::invalid_configured_path),
        help("Check the {}_path variable in {}. {}", kind, config.display(), path_help(*kind))
    )]
    InvalidConfiguredPath {
        kind: PathKind,
        path: PathBuf,
        config: PathBuf,
    },

    /// A single malformed entry in the environments file
    #[error("Malformed environment {name}: {error}")]
    #[diagnostic(code(modenv::parse_error))]
    ParseError {
        name: String,
        #[source]
        error: serde_yaml::Error,
    },

    /// The environments file is not a readable document at all
    #[error("Invalid environments file {path:?}: {error}")]
    #[diagnostic(
        code(modenv::invalid_store),
        help("Fix or remove the file; it will be recreated from the current mod state")
    )]
    InvalidStore {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// A mod pattern matched nothing installed
    #[error("No mod found for {pattern}")]
    #[diagnostic(code(modenv::mod_not_found), help("{}", suggestion_message(similar)))]
    ModNotFound {
        pattern: String,
        similar: Vec<String>,
    },

    /// The user declined a confirmation
    #[error("aborting overwrite on env {0}")]
    #[diagnostic(code(modenv::aborted))]
    Aborted(String),

    /// Environment name is unusable
    #[error("Invalid environment name {0:?}")]
    #[diagnostic(
        code(modenv::invalid_name),
        help("Names must be non-empty and cannot start or end with whitespace")
    )]
    InvalidName(String),

    /// Another invocation holds the store lock
    #[error("Environments file {path:?} is locked by {holder}")]
    #[diagnostic(
        code(modenv::store_locked),
        help("Another modenv command is running. If not, remove the stale lock file")
    )]
    StoreLocked { path: PathBuf, holder: String },

    /// No usable install directory could be located
    #[error("Can not find the {kind} path")]
    #[diagnostic(
        code(modenv::discovery_failed),
        help("Set the {}_path variable in {}", kind, config.display())
    )]
    DiscoveryFailed { kind: PathKind, config: PathBuf },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(modenv::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write file
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(modenv::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Invalid YAML in the base configuration file
    #[error("Invalid config file {path:?}: {error}")]
    #[diagnostic(code(modenv::invalid_config))]
    InvalidConfig {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// Invalid JSON in a mod list
    #[error("Invalid mod list {path:?}: {error}")]
    #[diagnostic(code(modenv::invalid_mod_list))]
    InvalidModList {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },

    /// Serialization failure on save
    #[error("Failed to serialize {what}: {error}")]
    #[diagnostic(code(modenv::serialize_failed))]
    SerializeFailed {
        what: &'static str,
        #[source]
        error: serde_yaml::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(modenv::io_error))]
    Io(#[from] std::io::Error),
}

fn path_help(kind: PathKind) -> &'static str {
    match kind {
        PathKind::Data => "A data path must contain a base/info.json file",
        PathKind::Write => {
            "A write path must contain writeable 'config' and 'mods' subdirectories"
        }
    }
}

fn suggestion_message(similar: &[String]) -> String {
    if similar.is_empty() {
        "Check that the mod is installed and the name is correct".to_string()
    } else {
        format!("Did you mean one of: {}?", similar.join(", "))
    }
}
