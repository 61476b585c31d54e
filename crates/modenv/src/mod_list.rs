// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! [`ModRegistry`] backed by a `mods/` directory and its `mod-list.json`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::registry::{ModDescriptor, ModRegistry};
use crate::Error;

#[cfg(test)]
#[path = "./mod_list_test.rs"]
mod mod_list_test;

/// Well-known filename for the enabled-state list inside `mods/`.
pub const MOD_LIST_FILENAME: &str = "mod-list.json";

#[derive(Debug, Default, Deserialize, Serialize)]
struct ModListFile {
    #[serde(default)]
    mods: Vec<ModListEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ModListEntry {
    name: String,
    enabled: bool,
    /// Fields written by the game that modenv does not interpret.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Mods installed under `<write-path>/mods`.
///
/// Every zip archive or directory in the mods directory is an installed
/// mod. Mods missing from `mod-list.json` count as enabled, which is how
/// the game treats freshly dropped in archives.
#[derive(Debug, Clone)]
pub struct ModListRegistry {
    mods_dir: PathBuf,
}

impl ModListRegistry {
    pub fn new(write_path: &Path) -> Self {
        Self {
            mods_dir: write_path.join("mods"),
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    fn mod_list_path(&self) -> PathBuf {
        self.mods_dir.join(MOD_LIST_FILENAME)
    }

    fn read_mod_list(&self) -> crate::Result<ModListFile> {
        let path = self.mod_list_path();
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|error| Error::InvalidModList { path, error }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ModListFile::default()),
            Err(e) => Err(Error::ReadFailed { path, error: e }),
        }
    }

    fn write_mod_list(&self, list: &ModListFile) -> crate::Result<()> {
        let path = self.mod_list_path();
        let json = serde_json::to_string_pretty(list)
            .map_err(|error| Error::InvalidModList {
                path: path.clone(),
                error,
            })?;
        crate::persist::write_atomic(&path, json.as_bytes())
    }

    /// Names of every mod present in the mods directory.
    fn installed(&self) -> crate::Result<BTreeSet<String>> {
        let entries = match std::fs::read_dir(&self.mods_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => {
                return Err(Error::ReadFailed {
                    path: self.mods_dir.clone(),
                    error: e,
                });
            }
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let stem = if entry.file_type()?.is_dir() {
                file_name
            } else if let Some(stem) = file_name.strip_suffix(".zip") {
                stem
            } else {
                continue;
            };
            names.insert(mod_name_from_stem(stem).to_string());
        }
        Ok(names)
    }
}

impl ModRegistry for ModListRegistry {
    fn list(&self) -> crate::Result<Vec<ModDescriptor>> {
        let list = self.read_mod_list()?;
        let mods = self
            .installed()?
            .into_iter()
            .map(|name| {
                let enabled = list
                    .mods
                    .iter()
                    .find(|entry| entry.name == name)
                    .is_none_or(|entry| entry.enabled);
                ModDescriptor { name, enabled }
            })
            .collect();
        Ok(mods)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> crate::Result<bool> {
        if !self.installed()?.contains(name) {
            return Err(Error::ModNotFound {
                pattern: name.to_string(),
                similar: Vec::new(),
            });
        }

        let mut list = self.read_mod_list()?;
        match list.mods.iter_mut().find(|entry| entry.name == name) {
            Some(entry) if entry.enabled == enabled => return Ok(false),
            Some(entry) => entry.enabled = enabled,
            None if enabled => return Ok(false),
            None => list.mods.push(ModListEntry {
                name: name.to_string(),
                enabled,
                extra: serde_json::Map::new(),
            }),
        }
        self.write_mod_list(&list)?;
        tracing::debug!(name, enabled, "updated {}", MOD_LIST_FILENAME);
        Ok(true)
    }

    fn use_write_path(&mut self, write_path: &Path) -> crate::Result<()> {
        self.mods_dir = write_path.join("mods");
        Ok(())
    }
}

/// Strip a trailing `_<version>` from an archive or directory name.
fn mod_name_from_stem(stem: &str) -> &str {
    match stem.rsplit_once('_') {
        Some((name, version))
            if !name.is_empty()
                && version.contains('.')
                && version.chars().all(|c| c.is_ascii_digit() || c == '.') =>
        {
            name
        }
        _ => stem,
    }
}
