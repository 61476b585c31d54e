// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Base application configuration: install paths and held mods.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::{discover_data_path, discover_write_path, expand_home, DiscoveryOptions};
use crate::error::PathKind;
use crate::paths::{FactorioLayout, PathValidator};
use crate::Error;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Live, environment-independent settings of the host application.
pub trait HostConfig {
    /// The data directory currently in effect, validated.
    fn data_path(&self) -> crate::Result<PathBuf>;

    /// The write directory currently in effect, validated.
    fn write_path(&self) -> crate::Result<PathBuf>;

    /// Mods currently excluded from automatic updates.
    fn held(&self) -> BTreeSet<String>;

    /// Replace the whole held set.
    fn set_held(&mut self, held: BTreeSet<String>);

    /// Make the given install paths the ones in effect.
    fn set_paths(&mut self, data_path: &Path, write_path: &Path);
}

/// Serialized form of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Data directory; discovered when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,

    /// Write directory; discovered when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_path: Option<PathBuf>,

    /// Held mods.
    #[serde(default)]
    pub hold: BTreeSet<String>,
}

/// File backed [`HostConfig`] for a Factorio style install.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    file: ConfigFile,
    discovery: DiscoveryOptions,
}

impl Config {
    /// Load `path`, falling back to an empty configuration if it does not exist.
    pub fn load<P: Into<PathBuf>>(path: P) -> crate::Result<Self> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(yaml) if yaml.trim().is_empty() => ConfigFile::default(),
            Ok(yaml) => serde_yaml::from_str(&yaml).map_err(|error| Error::InvalidConfig {
                path: path.clone(),
                error,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
            Err(e) => {
                return Err(Error::ReadFailed {
                    path: path.clone(),
                    error: e,
                });
            }
        };
        Ok(Self::from_file(path, file))
    }

    /// Wrap an already parsed configuration.
    pub fn from_file<P: Into<PathBuf>>(path: P, file: ConfigFile) -> Self {
        Self {
            path: path.into(),
            file,
            discovery: DiscoveryOptions::default(),
        }
    }

    /// Override how unset paths are searched for.
    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    /// Persist the configuration atomically.
    pub fn save(&self) -> crate::Result<()> {
        let yaml = serde_yaml::to_string(&self.file).map_err(|error| Error::SerializeFailed {
            what: "config",
            error,
        })?;
        crate::persist::write_atomic(&self.path, yaml.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    fn resolve(&self, kind: PathKind) -> crate::Result<PathBuf> {
        let configured = match kind {
            PathKind::Data => self.file.data_path.as_deref(),
            PathKind::Write => self.file.write_path.as_deref(),
        };
        let is_valid = |path: &Path| match kind {
            PathKind::Data => FactorioLayout.is_data_path(path),
            PathKind::Write => FactorioLayout.is_write_path(path),
        };

        let found = match configured.filter(|raw| !raw.as_os_str().is_empty()) {
            Some(raw) => {
                let path = expand_home(raw)?;
                if !is_valid(&path) {
                    return Err(Error::InvalidConfiguredPath {
                        kind,
                        path,
                        config: self.path.clone(),
                    });
                }
                path
            }
            None => {
                let discovered = match kind {
                    PathKind::Data => discover_data_path(&FactorioLayout, &self.discovery),
                    PathKind::Write => discover_write_path(&FactorioLayout, &self.discovery),
                };
                let path = discovered.ok_or_else(|| Error::DiscoveryFailed {
                    kind,
                    config: self.path.clone(),
                })?;
                tracing::debug!("discovered {kind} path {}", path.display());
                path
            }
        };

        Ok(dunce::canonicalize(&found).unwrap_or(found))
    }
}

impl HostConfig for Config {
    fn data_path(&self) -> crate::Result<PathBuf> {
        self.resolve(PathKind::Data)
    }

    fn write_path(&self) -> crate::Result<PathBuf> {
        self.resolve(PathKind::Write)
    }

    fn held(&self) -> BTreeSet<String> {
        self.file.hold.clone()
    }

    fn set_held(&mut self, held: BTreeSet<String>) {
        self.file.hold = held;
    }

    fn set_paths(&mut self, data_path: &Path, write_path: &Path) {
        self.file.data_path = Some(data_path.to_path_buf());
        self.file.write_path = Some(write_path.to_path_buf());
    }
}
