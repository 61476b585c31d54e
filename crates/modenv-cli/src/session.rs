// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Shared setup for commands that read or change the environments file.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use miette::Result;
use modenv::{
    Config, EnvironmentManager, EnvironmentStore, FactorioLayout, HostConfig, ModListRegistry,
    StoreLock,
};

use crate::StoreFlags;

#[cfg(test)]
#[path = "./session_test.rs"]
mod session_test;

pub type Manager = EnvironmentManager<ModListRegistry, FactorioLayout, Config>;

impl StoreFlags {
    pub fn config_path(&self) -> Result<PathBuf> {
        default_or(&self.config, modenv::CONFIG_FILENAME)
    }

    pub fn envs_path(&self) -> Result<PathBuf> {
        default_or(&self.envs_file, modenv::STORE_FILENAME)
    }
}

fn default_or(flag: &Option<PathBuf>, filename: &str) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.clone());
    }
    modenv::default_config_dir()
        .map(|dir| dir.join(filename))
        .ok_or_else(|| {
            miette::miette!(
                help = "Pass --config and --envs-file explicitly",
                "Could not determine a configuration directory for {}",
                filename
            )
        })
}

/// A locked, loaded environments file and the manager operating on it.
///
/// Nothing is written back unless [`Session::commit`] is called, so a
/// failed command leaves both files as they were.
pub struct Session {
    manager: Manager,
    bootstrapped: bool,
    _lock: StoreLock,
}

impl Session {
    pub fn open(flags: &StoreFlags) -> Result<Self> {
        let envs_path = flags.envs_path()?;
        let lock = StoreLock::acquire(&envs_path, Duration::from_secs(flags.lock_timeout))?;

        let config = Config::load(flags.config_path()?)?;
        let store = match EnvironmentStore::load(&envs_path) {
            Ok(store) => store,
            Err(modenv::Error::NotFound(_)) => EnvironmentStore::new(&envs_path),
            Err(err) => return Err(err.into()),
        };
        for err in store.parse_errors() {
            tracing::warn!("{err}");
        }

        // Mods are read from the live write path, the same one snapshots record.
        let registry = ModListRegistry::new(&config.write_path()?);

        let mut manager = EnvironmentManager::new(store, registry, FactorioLayout, config);
        let bootstrapped = manager.bootstrap()?;
        if bootstrapped {
            eprintln!(
                "Created {} with the current mods as env {}",
                envs_path.display().to_string().cyan(),
                modenv::DEFAULT_ENV.green()
            );
        }

        Ok(Self {
            manager,
            bootstrapped,
            _lock: lock,
        })
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    /// Persist the store and host configuration, then release the lock.
    pub fn commit(self) -> Result<()> {
        let (store, _, _, config) = self.manager.into_parts();
        store.save()?;
        config.save()?;
        Ok(())
    }

    /// Release the lock, writing only what a bootstrap created.
    pub fn close(self) -> Result<()> {
        if self.bootstrapped {
            return self.commit();
        }
        Ok(())
    }
}

/// Ask a yes/no question on the terminal.
///
/// Without a terminal the answer is no, unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        tracing::warn!("{prompt} (no terminal, answering no; pass --yes to overwrite)");
        return false;
    }

    print!("{prompt} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
