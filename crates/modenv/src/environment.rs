// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The saved snapshot of mod and path state behind one environment name.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Name of the environment that always exists and cannot be removed.
pub const DEFAULT_ENV: &str = "default";

/// One named configuration snapshot.
///
/// A mod that is not listed in `disabled` is implicitly enabled while
/// this environment is active. `held` is independent of enablement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Environment {
    /// Application data directory (contains `base/info.json`).
    pub data_path: PathBuf,

    /// Writeable user directory (contains `config/` and `mods/`).
    pub write_path: PathBuf,

    /// Mods that must be off when this environment is active.
    #[serde(default)]
    pub disabled: BTreeSet<String>,

    /// Mods excluded from automatic updates.
    #[serde(default)]
    pub held: BTreeSet<String>,

    /// When the snapshot was last taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Environment {
    /// Build a freshly timestamped snapshot.
    pub fn snapshot<D, H>(data_path: PathBuf, write_path: PathBuf, disabled: D, held: H) -> Self
    where
        D: IntoIterator<Item = String>,
        H: IntoIterator<Item = String>,
    {
        Self {
            data_path,
            write_path,
            disabled: disabled.into_iter().collect(),
            held: held.into_iter().collect(),
            updated: Some(Utc::now()),
        }
    }

    /// Whether `mod_name` should be enabled while this environment is active.
    pub fn wants_enabled(&self, mod_name: &str) -> bool {
        !self.disabled.contains(mod_name)
    }
}

/// Check that `name` can be used as an environment key.
pub fn validate_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.trim() != name {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
