// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Locating the application's data and write directories on disk.

use std::path::{Path, PathBuf};

use crate::paths::PathValidator;

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

/// Candidates tried relative to the starting directory.
const RELATIVE_CANDIDATES: &[&str] = &[
    ".",
    "factorio",
    "Factorio",
    "..",
    "../factorio",
    "../Factorio",
];

/// Options for discovery behavior.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Directory relative candidates are resolved against (default: $PWD).
    pub start_path: Option<PathBuf>,

    /// Extra candidates tried before the built-in ones.
    pub extra_paths: Vec<PathBuf>,

    /// Only consider `start_path` relatives and `extra_paths`.
    pub no_system_paths: bool,
}

/// All candidate install directories, in search order.
pub fn search_paths(options: &DiscoveryOptions) -> Vec<PathBuf> {
    let start = resolve_start_path(options.start_path.as_deref().unwrap_or(Path::new(".")));

    let mut paths = options.extra_paths.clone();
    paths.extend(RELATIVE_CANDIDATES.iter().map(|rel| start.join(rel)));
    if !options.no_system_paths {
        paths.extend(system_paths());
    }
    paths
}

/// Find the first candidate that is a valid data directory.
///
/// Each candidate is also tried with a trailing `data/`, which is where
/// the data lives inside a standalone install.
pub fn discover_data_path<V: PathValidator + ?Sized>(
    validator: &V,
    options: &DiscoveryOptions,
) -> Option<PathBuf> {
    search_paths(options).into_iter().find_map(|candidate| {
        if validator.is_data_path(&candidate) {
            return Some(candidate);
        }
        let nested = candidate.join("data");
        validator.is_data_path(&nested).then_some(nested)
    })
}

/// Find the first candidate that is a valid write directory.
pub fn discover_write_path<V: PathValidator + ?Sized>(
    validator: &V,
    options: &DiscoveryOptions,
) -> Option<PathBuf> {
    search_paths(options)
        .into_iter()
        .find(|candidate| validator.is_write_path(candidate))
}

/// Resolve a leading `~` against the home directory; other paths are returned as-is.
pub fn expand_home<P: AsRef<Path>>(raw: P) -> crate::Result<PathBuf> {
    let raw = raw.as_ref();
    let Ok(rel) = raw.strip_prefix("~") else {
        return Ok(raw.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| {
        crate::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Cannot resolve ~ without HOME",
        ))
    })?;
    Ok(home.join(rel))
}

/// Resolve starting path, preferring $PWD to preserve symlinks.
fn resolve_start_path(start_path: &Path) -> PathBuf {
    if start_path.is_absolute() {
        start_path.to_owned()
    } else {
        match std::env::var("PWD").ok() {
            Some(pwd) => PathBuf::from(pwd).join(start_path),
            None => std::env::current_dir()
                .unwrap_or_default()
                .join(start_path),
        }
    }
}

/// Well-known install locations for the current platform.
fn system_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(data) = dirs::data_dir() {
        paths.push(data.join("factorio"));
        paths.push(data.join("Factorio"));
        for steamapps in ["SteamApps", "steamapps"] {
            let game = data.join("Steam").join(steamapps).join("common").join("Factorio");
            if cfg!(target_os = "macos") {
                paths.push(game.join("factorio.app").join("Contents"));
            }
            paths.push(game);
        }
    }

    if cfg!(windows) {
        if let Some(roaming) = dirs::config_dir() {
            paths.push(roaming.join("factorio"));
        }
        paths.push(PathBuf::from(
            r"C:\Program Files (x86)\Steam\SteamApps\common\factorio",
        ));
    } else if let Some(home) = dirs::home_dir() {
        paths.push(home.join("factorio"));
        paths.push(home.join("Factorio"));
        paths.push(home.join(".factorio"));
        if cfg!(target_os = "macos") {
            paths.push(PathBuf::from("/Applications/factorio.app/Contents"));
        } else {
            paths.push(PathBuf::from("/usr/share/factorio"));
        }
    }

    paths
}
