// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Recognising usable application data and write directories.

use std::path::Path;

#[cfg(test)]
#[path = "./paths_test.rs"]
mod paths_test;

/// Decides whether a directory can serve as an install path.
pub trait PathValidator {
    /// A directory holding the application's read-only data.
    fn is_data_path(&self, path: &Path) -> bool;

    /// A directory the application (and modenv) can write config and mods into.
    fn is_write_path(&self, path: &Path) -> bool;
}

/// The on-disk layout of a Factorio installation.
///
/// Data directories carry `base/info.json`. Write directories carry
/// writeable `config/` and `mods/` subdirectories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorioLayout;

impl PathValidator for FactorioLayout {
    fn is_data_path(&self, path: &Path) -> bool {
        path.join("base").join("info.json").is_file()
    }

    fn is_write_path(&self, path: &Path) -> bool {
        ["config", "mods"]
            .iter()
            .all(|sub| is_writeable_dir(&path.join(sub)))
    }
}

fn is_writeable_dir(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}
