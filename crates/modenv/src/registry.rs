// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Access to the live set of installed mods.

use std::path::Path;

use crate::Error;

#[cfg(test)]
#[path = "./registry_test.rs"]
mod registry_test;

/// How many near matches to offer when a pattern resolves to nothing.
const MAX_SUGGESTIONS: usize = 5;

/// An installed mod and whether it is currently switched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModDescriptor {
    pub name: String,
    pub enabled: bool,
}

/// Enumerates and mutates live mod state.
pub trait ModRegistry {
    /// Every installed mod, in a stable order.
    fn list(&self) -> crate::Result<Vec<ModDescriptor>>;

    /// Switch a mod on or off, returning whether its state changed.
    fn set_enabled(&mut self, name: &str, enabled: bool) -> crate::Result<bool>;

    /// Turn a user supplied pattern into an installed mod name.
    fn resolve_name(&self, pattern: &str) -> crate::Result<String> {
        let names: Vec<String> = self.list()?.into_iter().map(|m| m.name).collect();
        resolve_pattern(pattern, &names)
    }

    /// Re-point the registry at the mods living under `write_path`.
    fn use_write_path(&mut self, _write_path: &Path) -> crate::Result<()> {
        Ok(())
    }
}

/// Match `pattern` against `names`.
///
/// Tries, in order: an exact name, a case-insensitive name, a glob that
/// selects exactly one mod, and a case-insensitive substring that selects
/// exactly one mod.
pub fn resolve_pattern(pattern: &str, names: &[String]) -> crate::Result<String> {
    if let Some(name) = names.iter().find(|n| n.as_str() == pattern) {
        return Ok(name.clone());
    }

    let lowered = pattern.to_lowercase();
    let folded: Vec<&String> = names
        .iter()
        .filter(|n| n.to_lowercase() == lowered)
        .collect();
    if let [name] = folded.as_slice() {
        return Ok((*name).clone());
    }

    let is_glob = pattern.contains(|c: char| matches!(c, '*' | '?' | '['));
    if is_glob {
        if let Ok(glob) = glob::Pattern::new(pattern) {
            let options = glob::MatchOptions {
                case_sensitive: false,
                ..Default::default()
            };
            let matched: Vec<&String> = names
                .iter()
                .filter(|n| glob.matches_with(n, options))
                .collect();
            if let [name] = matched.as_slice() {
                return Ok((*name).clone());
            }
            if !matched.is_empty() {
                return Err(not_found(pattern, matched));
            }
        }
    }

    let containing: Vec<&String> = names
        .iter()
        .filter(|n| n.to_lowercase().contains(&lowered))
        .collect();
    match containing.as_slice() {
        [name] if !is_glob => Ok((*name).clone()),
        _ => Err(not_found(pattern, containing)),
    }
}

fn not_found(pattern: &str, candidates: Vec<&String>) -> Error {
    Error::ModNotFound {
        pattern: pattern.to_string(),
        similar: candidates
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect(),
    }
}
