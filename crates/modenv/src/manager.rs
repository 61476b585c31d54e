// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Create, save, activate, delete and list environments against live mod state.

use std::collections::BTreeSet;

use crate::config::HostConfig;
use crate::environment::{Environment, DEFAULT_ENV};
use crate::error::PathKind;
use crate::paths::PathValidator;
use crate::registry::ModRegistry;
use crate::store::EnvironmentStore;
use crate::Error;

#[cfg(test)]
#[path = "./manager_test.rs"]
mod manager_test;

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Progress of a single [`EnvironmentManager::activate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPhase {
    Idle,
    Validating,
    Applying,
    Active,
    Failed,
}

impl ActivationPhase {
    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Validating)
                | (Self::Validating, Self::Applying)
                | (Self::Validating, Self::Failed)
                | (Self::Applying, Self::Active)
                | (Self::Applying, Self::Failed)
        )
    }

    fn advance(&mut self, next: Self, env: &str) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid activation transition {self:?} -> {next:?}"
        );
        tracing::debug!(env, from = ?*self, to = ?next, "activation phase");
        *self = next;
    }
}

/// The result of reconciling one installed mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModChange {
    pub name: String,
    /// The state the mod was put in.
    pub enabled: bool,
    /// False when the mod was already in that state.
    pub changed: bool,
}

impl std::fmt::Display for ModChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.enabled { "enabled" } else { "disabled" };
        if self.changed {
            write!(f, "{} is now {state}", self.name)
        } else {
            write!(f, "{} was already {state}", self.name)
        }
    }
}

/// What [`EnvironmentManager::activate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub name: String,
    pub phase: ActivationPhase,
    /// One entry per installed mod.
    pub changes: Vec<ModChange>,
    /// Disabled mods that are not installed and so could not be disabled.
    pub not_installed: Vec<String>,
    /// The held set now in effect.
    pub held: BTreeSet<String>,
}

impl ActivationReport {
    /// Number of mods whose state actually flipped.
    pub fn flipped(&self) -> usize {
        self.changes.iter().filter(|c| c.changed).count()
    }
}

/// Whether a snapshot went into a new or an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Created,
    Overwritten,
}

/// What [`EnvironmentManager::delete`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub name: String,
    /// Set when the deleted environment was active and default took over.
    pub fallback: Option<ActivationReport>,
}

/// What [`EnvironmentManager::enable`] or [`EnvironmentManager::disable`] did.
#[derive(Debug, Default)]
pub struct ToggleReport {
    pub changes: Vec<ModChange>,
    /// Patterns that could not be applied, with the reason.
    pub failures: Vec<(String, Error)>,
}

impl ToggleReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One row of [`EnvironmentManager::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry<'a> {
    pub name: &'a str,
    pub environment: &'a Environment,
    pub active: bool,
}

/// Orchestrates the store against live mod and path state.
pub struct EnvironmentManager<R, V, C> {
    store: EnvironmentStore,
    registry: R,
    validator: V,
    config: C,
}

impl<R, V, C> EnvironmentManager<R, V, C>
where
    R: ModRegistry,
    V: PathValidator,
    C: HostConfig,
{
    pub fn new(store: EnvironmentStore, registry: R, validator: V, config: C) -> Self {
        Self {
            store,
            registry,
            validator,
            config,
        }
    }

    pub fn store(&self) -> &EnvironmentStore {
        &self.store
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Give back the store and collaborators, e.g. to persist them.
    pub fn into_parts(self) -> (EnvironmentStore, R, V, C) {
        (self.store, self.registry, self.validator, self.config)
    }

    /// Seed a fresh store with `default` taken from live state.
    ///
    /// Does nothing (and touches no live state) for an initialized store.
    pub fn bootstrap(&mut self) -> crate::Result<bool> {
        if !self.store.needs_bootstrap() {
            return Ok(false);
        }
        let live = self.snapshot()?;
        Ok(self
            .store
            .bootstrap(live.data_path, live.write_path, live.disabled, live.held))
    }

    /// Capture the live paths, disabled mods and held mods.
    fn snapshot(&self) -> crate::Result<Environment> {
        let data_path = self.config.data_path()?;
        let write_path = self.config.write_path()?;
        let disabled = self
            .registry
            .list()?
            .into_iter()
            .filter(|m| !m.enabled)
            .map(|m| m.name);
        Ok(Environment::snapshot(
            data_path,
            write_path,
            disabled,
            self.config.held(),
        ))
    }

    /// Snapshot live state into `name`.
    ///
    /// An existing entry is only replaced after `confirm` agrees; otherwise
    /// this fails with [`Error::Aborted`] and nothing changes. The active
    /// environment is never changed.
    pub fn create(&mut self, name: &str, confirm: &mut dyn Confirm) -> crate::Result<SnapshotKind> {
        crate::environment::validate_name(name)?;
        let kind = if self.store.contains(name) {
            if !confirm.confirm(&format!("Overwrite env {name}?")) {
                return Err(Error::Aborted(name.to_string()));
            }
            SnapshotKind::Overwritten
        } else {
            SnapshotKind::Created
        };

        let env = self.snapshot()?;
        self.store.put(name, env)?;
        tracing::info!(env = name, ?kind, "stored snapshot");
        Ok(kind)
    }

    /// Re-snapshot live state into `name`, or into the active environment.
    ///
    /// Returns the name that was saved.
    pub fn save(&mut self, name: Option<&str>) -> crate::Result<String> {
        let name = match name.or(self.store.active()) {
            Some(name) => name.to_string(),
            None => return Err(Error::NotFound("<active>".to_string())),
        };
        if !self.store.contains(&name) {
            return Err(Error::NotFound(name));
        }

        let env = self.snapshot()?;
        self.store.put(name.as_str(), env)?;
        tracing::debug!(env = %name, "saved live state");
        Ok(name)
    }

    /// Remove `name` from the store.
    ///
    /// Deleting the active environment first activates `default`; if that
    /// activation fails the delete is abandoned and the entry is kept.
    pub fn delete(&mut self, name: &str) -> crate::Result<DeleteReport> {
        if name == DEFAULT_ENV {
            return Err(Error::ProtectedEnvironment(name.to_string()));
        }
        if !self.store.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }

        let fallback = if self.store.active() == Some(name) {
            tracing::info!("env {name} is active, switching to {DEFAULT_ENV} first");
            Some(self.activate(DEFAULT_ENV)?)
        } else {
            None
        };

        self.store.remove(name)?;
        tracing::info!(env = name, "removed");
        Ok(DeleteReport {
            name: name.to_string(),
            fallback,
        })
    }

    /// Apply `name` to the live installation and mark it active.
    ///
    /// Both paths are validated before anything is touched. Individual mod
    /// toggles are not rolled back if a later step fails, but each one is
    /// idempotent so activating again completes the job. The active marker
    /// only moves once everything has been applied.
    pub fn activate(&mut self, name: &str) -> crate::Result<ActivationReport> {
        let mut phase = ActivationPhase::Idle;
        let target = self
            .store
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        tracing::info!("activating env {name}");

        phase.advance(ActivationPhase::Validating, name);
        if let Err(err) = self.validate(name, &target) {
            phase.advance(ActivationPhase::Failed, name);
            return Err(err);
        }

        phase.advance(ActivationPhase::Applying, name);
        let applied = match self.apply(&target) {
            Ok(applied) => applied,
            Err(err) => {
                phase.advance(ActivationPhase::Failed, name);
                return Err(err);
            }
        };
        self.store.set_active(name)?;
        phase.advance(ActivationPhase::Active, name);

        let (changes, not_installed) = applied;
        Ok(ActivationReport {
            name: name.to_string(),
            phase,
            changes,
            not_installed,
            held: target.held,
        })
    }

    fn validate(&self, name: &str, target: &Environment) -> crate::Result<()> {
        if !self.validator.is_data_path(&target.data_path) {
            return Err(Error::InvalidPath {
                kind: PathKind::Data,
                path: target.data_path.clone(),
                environment: name.to_string(),
            });
        }
        if !self.validator.is_write_path(&target.write_path) {
            return Err(Error::InvalidPath {
                kind: PathKind::Write,
                path: target.write_path.clone(),
                environment: name.to_string(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, target: &Environment) -> crate::Result<(Vec<ModChange>, Vec<String>)> {
        let installed = match self
            .registry
            .use_write_path(&target.write_path)
            .and_then(|()| self.registry.list())
        {
            Ok(installed) => installed,
            Err(err) => {
                self.restore_registry();
                return Err(err);
            }
        };
        self.config.set_paths(&target.data_path, &target.write_path);

        let mut changes = Vec::with_capacity(installed.len());
        for m in &installed {
            let enabled = target.wants_enabled(&m.name);
            let changed = m.enabled != enabled && self.registry.set_enabled(&m.name, enabled)?;
            let change = ModChange {
                name: m.name.clone(),
                enabled,
                changed,
            };
            tracing::debug!("{change}");
            changes.push(change);
        }

        let not_installed: Vec<String> = target
            .disabled
            .iter()
            .filter(|name| !installed.iter().any(|m| &m.name == *name))
            .cloned()
            .collect();
        for name in &not_installed {
            tracing::warn!("{name} is not installed so cannot be disabled");
        }

        self.config.set_held(target.held.clone());
        Ok((changes, not_installed))
    }

    /// Point the registry back at the host's current write path.
    fn restore_registry(&mut self) {
        let restored = self
            .config
            .write_path()
            .and_then(|previous| self.registry.use_write_path(&previous));
        if let Err(err) = restored {
            tracing::warn!("failed to restore the mod registry: {err}");
        }
    }

    /// Environments in display order, flagged with whether each is active.
    pub fn list(&self) -> impl Iterator<Item = ListEntry<'_>> + Clone + '_ {
        let active = self.store.active();
        self.store.list().map(move |(name, environment)| ListEntry {
            name,
            environment,
            active: active == Some(name),
        })
    }

    /// Switch on the mods matching `patterns`.
    ///
    /// Each pattern is handled on its own; a pattern that matches nothing is
    /// recorded in the report and the rest still run.
    pub fn enable<S: AsRef<str>>(&mut self, patterns: &[S]) -> crate::Result<ToggleReport> {
        self.set_mods_enabled(patterns, true)
    }

    /// Switch off the mods matching `patterns`.
    pub fn disable<S: AsRef<str>>(&mut self, patterns: &[S]) -> crate::Result<ToggleReport> {
        self.set_mods_enabled(patterns, false)
    }

    /// Apply `enabled` to each pattern, then fold any flips into the active
    /// environment.
    fn set_mods_enabled<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        enabled: bool,
    ) -> crate::Result<ToggleReport> {
        let mut report = ToggleReport::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let outcome = self
                .registry
                .resolve_name(pattern)
                .and_then(|name| {
                    let changed = self.registry.set_enabled(&name, enabled)?;
                    Ok(ModChange {
                        name,
                        enabled,
                        changed,
                    })
                });
            match outcome {
                Ok(change) => report.changes.push(change),
                Err(err) => {
                    tracing::warn!("{pattern}: {err}");
                    report.failures.push((pattern.to_string(), err));
                }
            }
        }

        if self.store.active().is_some() && report.changes.iter().any(|c| c.changed) {
            self.save(None)?;
        }
        Ok(report)
    }
}
