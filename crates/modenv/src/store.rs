// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Durable storage of environments and the active marker.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::environment::{validate_name, Environment, DEFAULT_ENV};
use crate::Error;

#[cfg(test)]
#[path = "./store_test.rs"]
mod store_test;

/// API version for environment files.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum StoreApiVersion {
    #[default]
    #[serde(rename = "modenv/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: StoreApiVersion,
}

/// On-disk layout of a v0 environments file.
///
/// Entries stay as raw values so that one bad environment can be
/// skipped without losing the rest.
#[derive(Deserialize)]
struct StoreDocumentV0 {
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    environments: serde_yaml::Mapping,
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    api: StoreApiVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<&'a str>,
    environments: &'a IndexMap<String, Environment>,
}

/// Named environments plus the single active marker.
#[derive(Debug)]
pub struct EnvironmentStore {
    path: PathBuf,
    environments: IndexMap<String, Environment>,
    active: Option<String>,
    parse_errors: Vec<Error>,
}

impl EnvironmentStore {
    /// An empty, uninitialized store that will save to `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            environments: IndexMap::new(),
            active: None,
            parse_errors: Vec::new(),
        }
    }

    /// Load the store persisted at `path`.
    ///
    /// Fails with [`Error::NotFound`] when nothing has been saved there yet.
    /// Malformed environment entries, including ones whose name could not
    /// be saved back, are logged, skipped and kept in [`Self::parse_errors`].
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = match std::fs::read_to_string(path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(Error::ReadFailed {
                    path: path.to_path_buf(),
                    error: e,
                });
            }
        };
        Self::from_yaml(path, &yaml)
    }

    /// Parse a store from YAML text, remembering `path` for later saves.
    pub fn from_yaml<P: Into<PathBuf>>(path: P, yaml: &str) -> crate::Result<Self> {
        let path = path.into();
        let invalid = |error| Error::InvalidStore {
            path: path.clone(),
            error,
        };

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(invalid)?;
        if value.is_null() {
            // An empty file holds nothing worth keeping
            return Err(Error::NotFound(path.display().to_string()));
        }
        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(invalid)?;

        // Stage 2: Deserialize based on version
        let document: StoreDocumentV0 = match with_version.api {
            StoreApiVersion::V0 => serde_yaml::from_value(value).map_err(invalid)?,
        };

        let mut store = Self::new(path);
        for (key, entry) in document.environments {
            let name = match serde_yaml::from_value::<String>(key.clone()) {
                Ok(name) => name,
                Err(error) => {
                    store.skip_entry(display_key(&key), error);
                    continue;
                }
            };
            if let Err(error) = validate_name(&name) {
                tracing::warn!("skipping environment: {error}");
                store.parse_errors.push(error);
                continue;
            }
            match serde_yaml::from_value::<Environment>(entry) {
                Ok(env) => {
                    store.environments.insert(name, env);
                }
                Err(error) => store.skip_entry(name, error),
            }
        }

        store.active = match document.active {
            Some(name) if store.environments.contains_key(&name) => Some(name),
            requested => {
                let fallback = store.fallback_active();
                if let Some(requested) = requested {
                    tracing::warn!(
                        "active env {requested} is not in {}; using {}",
                        store.path.display(),
                        fallback.as_deref().unwrap_or("<none>"),
                    );
                }
                fallback
            }
        };

        tracing::debug!(
            path = %store.path.display(),
            environments = store.environments.len(),
            skipped = store.parse_errors.len(),
            "loaded environments"
        );
        Ok(store)
    }

    fn skip_entry(&mut self, name: String, error: serde_yaml::Error) {
        let error = Error::ParseError { name, error };
        tracing::warn!("skipping environment: {error}");
        self.parse_errors.push(error);
    }

    fn fallback_active(&self) -> Option<String> {
        if self.environments.contains_key(DEFAULT_ENV) {
            return Some(DEFAULT_ENV.to_string());
        }
        self.environments.keys().next().cloned()
    }

    /// Whether the store still lacks the default environment or an active marker.
    pub fn needs_bootstrap(&self) -> bool {
        self.active.is_none() || !self.environments.contains_key(DEFAULT_ENV)
    }

    /// Seed the `default` environment from live state and make it active.
    ///
    /// Only fills what is missing, so calling it again is a no-op.
    /// Returns whether anything changed.
    pub fn bootstrap<D, H>(
        &mut self,
        data_path: PathBuf,
        write_path: PathBuf,
        disabled: D,
        held: H,
    ) -> bool
    where
        D: IntoIterator<Item = String>,
        H: IntoIterator<Item = String>,
    {
        let mut changed = false;
        if !self.environments.contains_key(DEFAULT_ENV) {
            tracing::info!(
                "creating {} with the current mod state as '{DEFAULT_ENV}'",
                self.path.display()
            );
            let env = Environment::snapshot(data_path, write_path, disabled, held);
            self.environments.insert(DEFAULT_ENV.to_string(), env);
            changed = true;
        }
        if self.active.is_none() {
            self.active = Some(DEFAULT_ENV.to_string());
            changed = true;
        }
        changed
    }

    /// Render the store to YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        let document = StoreDocumentRef {
            api: StoreApiVersion::V0,
            active: self.active.as_deref(),
            environments: &self.environments,
        };
        serde_yaml::to_string(&document).map_err(|error| Error::SerializeFailed {
            what: "environments",
            error,
        })
    }

    /// Persist to [`Self::path`], replacing the previous file atomically.
    pub fn save(&self) -> crate::Result<()> {
        let yaml = self.to_yaml()?;
        crate::persist::write_atomic(&self.path, yaml.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "saved environments");
        Ok(())
    }

    /// File this store loads from and saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the active environment, unset before bootstrap.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Point the active marker at an existing environment.
    pub fn set_active(&mut self, name: &str) -> crate::Result<()> {
        if !self.environments.contains_key(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// Insert or replace an environment, returning the replaced entry.
    pub fn put<S: Into<String>>(
        &mut self,
        name: S,
        env: Environment,
    ) -> crate::Result<Option<Environment>> {
        let name = name.into();
        validate_name(&name)?;
        Ok(self.environments.insert(name, env))
    }

    /// Remove an environment.
    ///
    /// The default environment is protected. Removing the active one moves
    /// the marker to the default environment rather than leaving it dangling.
    pub fn remove(&mut self, name: &str) -> crate::Result<Environment> {
        if name == DEFAULT_ENV {
            return Err(Error::ProtectedEnvironment(name.to_string()));
        }
        let env = self
            .environments
            .shift_remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if self.active.as_deref() == Some(name) {
            self.active = self.fallback_active();
        }
        Ok(env)
    }

    /// Iterate environments in insertion order.
    ///
    /// The iterator is cheap to clone, so callers can walk it more than once.
    pub fn list(&self) -> impl Iterator<Item = (&str, &Environment)> + Clone + '_ {
        self.environments
            .iter()
            .map(|(name, env)| (name.as_str(), env))
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Entries that were skipped during [`Self::load`].
    pub fn parse_errors(&self) -> &[Error] {
        &self.parse_errors
    }
}

fn display_key(key: &serde_yaml::Value) -> String {
    serde_yaml::to_string(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}
