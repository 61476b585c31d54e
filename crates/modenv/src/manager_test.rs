// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rstest::{fixture, rstest};

use super::*;
use crate::registry::ModDescriptor;

#[derive(Debug, Default)]
struct FakeRegistry {
    mods: BTreeMap<String, bool>,
    write_path: Option<PathBuf>,
    toggles: usize,
    /// Listing fails while pointed at this write path.
    unreadable: Option<PathBuf>,
}

impl FakeRegistry {
    fn with(mods: &[(&str, bool)]) -> Self {
        Self {
            mods: mods.iter().map(|(n, e)| (n.to_string(), *e)).collect(),
            ..Default::default()
        }
    }

    fn enabled(&self, name: &str) -> bool {
        self.mods[name]
    }
}

impl ModRegistry for FakeRegistry {
    fn list(&self) -> crate::Result<Vec<ModDescriptor>> {
        if self.write_path.is_some() && self.write_path == self.unreadable {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mods directory is unreadable",
            )));
        }
        Ok(self
            .mods
            .iter()
            .map(|(name, enabled)| ModDescriptor {
                name: name.clone(),
                enabled: *enabled,
            })
            .collect())
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> crate::Result<bool> {
        let Some(state) = self.mods.get_mut(name) else {
            return Err(Error::ModNotFound {
                pattern: name.to_string(),
                similar: Vec::new(),
            });
        };
        if *state == enabled {
            return Ok(false);
        }
        *state = enabled;
        self.toggles += 1;
        Ok(true)
    }

    fn use_write_path(&mut self, write_path: &Path) -> crate::Result<()> {
        self.write_path = Some(write_path.to_path_buf());
        Ok(())
    }
}

/// Accepts any path not under `/bad`.
#[derive(Debug, Default)]
struct FakeValidator;

impl PathValidator for FakeValidator {
    fn is_data_path(&self, path: &Path) -> bool {
        !path.starts_with("/bad")
    }

    fn is_write_path(&self, path: &Path) -> bool {
        !path.starts_with("/bad")
    }
}

#[derive(Debug)]
struct FakeHost {
    data_path: PathBuf,
    write_path: PathBuf,
    held: BTreeSet<String>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("/game/data"),
            write_path: PathBuf::from("/game/write"),
            held: BTreeSet::new(),
        }
    }
}

impl HostConfig for FakeHost {
    fn data_path(&self) -> crate::Result<PathBuf> {
        Ok(self.data_path.clone())
    }

    fn write_path(&self) -> crate::Result<PathBuf> {
        Ok(self.write_path.clone())
    }

    fn held(&self) -> BTreeSet<String> {
        self.held.clone()
    }

    fn set_held(&mut self, held: BTreeSet<String>) {
        self.held = held;
    }

    fn set_paths(&mut self, data_path: &Path, write_path: &Path) {
        self.data_path = data_path.to_path_buf();
        self.write_path = write_path.to_path_buf();
    }
}

type Manager = EnvironmentManager<FakeRegistry, FakeValidator, FakeHost>;

fn env(disabled: &[&str], held: &[&str]) -> Environment {
    Environment::snapshot(
        PathBuf::from("/game/data"),
        PathBuf::from("/game/write"),
        disabled.iter().map(|s| s.to_string()),
        held.iter().map(|s| s.to_string()),
    )
}

fn refuse(_: &str) -> bool {
    false
}

fn accept(_: &str) -> bool {
    true
}

/// `default` (nothing disabled) and `test` (foo disabled), with foo and bar
/// installed and enabled.
#[fixture]
fn manager() -> Manager {
    let mut store = EnvironmentStore::new("/cfg/envs.yaml");
    store.put(DEFAULT_ENV, env(&[], &[])).unwrap();
    store.put("test", env(&["foo"], &[])).unwrap();
    store.set_active(DEFAULT_ENV).unwrap();
    EnvironmentManager::new(
        store,
        FakeRegistry::with(&[("foo", true), ("bar", true)]),
        FakeValidator,
        FakeHost::default(),
    )
}

#[rstest]
fn test_activate_disables_listed_mods(mut manager: Manager) {
    let report = manager.activate("test").unwrap();

    assert_eq!(report.phase, ActivationPhase::Active);
    assert!(!manager.registry().enabled("foo"));
    assert!(manager.registry().enabled("bar"));
    assert_eq!(manager.store().active(), Some("test"));
    assert_eq!(report.flipped(), 1);
}

#[rstest]
fn test_activate_is_idempotent(mut manager: Manager) {
    manager.activate("test").unwrap();
    let mods_after_first = manager.registry().mods.clone();

    let second = manager.activate("test").unwrap();
    assert_eq!(second.flipped(), 0);
    assert!(second.changes.iter().all(|c| !c.changed));
    assert_eq!(manager.registry().mods, mods_after_first);
    assert_eq!(manager.registry().toggles, 1);
}

#[rstest]
#[case("test")]
#[case(DEFAULT_ENV)]
#[case("mixed")]
fn test_activate_matches_target_disabled_set(mut manager: Manager, #[case] name: &str) {
    manager
        .store
        .put("mixed", env(&["bar", "not-installed"], &["foo"]))
        .unwrap();
    manager.registry.mods.insert("baz".to_string(), false);

    manager.activate(name).unwrap();

    let target = manager.store().get(name).unwrap().clone();
    for m in manager.registry().list().unwrap() {
        assert_eq!(m.enabled, !target.disabled.contains(&m.name), "{}", m.name);
    }
    assert_eq!(manager.config().held, target.held);
}

#[rstest]
fn test_activate_reports_missing_mods(mut manager: Manager) {
    manager
        .store
        .put("ghost", env(&["foo", "ghost-mod"], &["bar"]))
        .unwrap();

    let report = manager.activate("ghost").unwrap();
    assert_eq!(report.not_installed, vec!["ghost-mod".to_string()]);
    assert_eq!(report.held, BTreeSet::from(["bar".to_string()]));
    assert_eq!(manager.store().active(), Some("ghost"));
}

#[rstest]
fn test_activate_unknown_keeps_active(mut manager: Manager) {
    assert!(matches!(
        manager.activate("nope"),
        Err(Error::NotFound(name)) if name == "nope"
    ));
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
}

#[rstest]
#[case("/bad/data", "/game/write", PathKind::Data)]
#[case("/game/data", "/bad/write", PathKind::Write)]
fn test_activate_bad_path_changes_nothing(
    mut manager: Manager,
    #[case] data: &str,
    #[case] write: &str,
    #[case] expected: PathKind,
) {
    let mut broken = env(&["foo", "bar"], &["foo"]);
    broken.data_path = PathBuf::from(data);
    broken.write_path = PathBuf::from(write);
    manager.store.put("broken", broken).unwrap();

    match manager.activate("broken") {
        Err(Error::InvalidPath {
            kind, environment, ..
        }) => {
            assert_eq!(kind, expected);
            assert_eq!(environment, "broken");
        }
        other => panic!("Expected InvalidPath, got: {:?}", other),
    }
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
    assert!(manager.registry().enabled("foo"));
    assert!(manager.registry().enabled("bar"));
    assert_eq!(manager.registry().toggles, 0);
    assert!(manager.registry().write_path.is_none());
    assert_eq!(manager.config().data_path, PathBuf::from("/game/data"));
    assert!(manager.config().held.is_empty());
}

#[rstest]
fn test_activate_points_host_at_paths(mut manager: Manager) {
    let mut other = env(&[], &[]);
    other.data_path = PathBuf::from("/other/data");
    other.write_path = PathBuf::from("/other/write");
    manager.store.put("other", other).unwrap();

    manager.activate("other").unwrap();
    assert_eq!(manager.config().data_path, PathBuf::from("/other/data"));
    assert_eq!(manager.config().write_path, PathBuf::from("/other/write"));
    assert_eq!(
        manager.registry().write_path,
        Some(PathBuf::from("/other/write"))
    );
}

#[rstest]
fn test_activate_failed_listing_keeps_host_paths(mut manager: Manager) {
    let mut other = env(&["foo"], &["bar"]);
    other.data_path = PathBuf::from("/other/data");
    other.write_path = PathBuf::from("/other/write");
    manager.store.put("other", other).unwrap();
    manager.registry.unreadable = Some(PathBuf::from("/other/write"));

    assert!(matches!(manager.activate("other"), Err(Error::Io(_))));
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
    assert_eq!(manager.config().data_path, PathBuf::from("/game/data"));
    assert_eq!(manager.config().write_path, PathBuf::from("/game/write"));
    assert!(manager.config().held.is_empty());
    assert_eq!(
        manager.registry().write_path,
        Some(PathBuf::from("/game/write"))
    );
    assert!(manager.registry().enabled("foo"));
}

#[rstest]
fn test_create_snapshots_live_state(mut manager: Manager) {
    manager.registry.mods.insert("bar".to_string(), false);
    manager.config.held = BTreeSet::from(["foo".to_string()]);

    let kind = manager.create("dev", &mut refuse).unwrap();
    assert_eq!(kind, SnapshotKind::Created);

    let dev = manager.store().get("dev").unwrap();
    assert_eq!(dev.disabled, BTreeSet::from(["bar".to_string()]));
    assert_eq!(dev.held, BTreeSet::from(["foo".to_string()]));
    assert_eq!(dev.data_path, PathBuf::from("/game/data"));
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
}

#[rstest]
fn test_create_existing_refused_is_aborted(mut manager: Manager) {
    manager.store.put("dev", env(&["foo"], &[])).unwrap();
    let before = manager.store().get("dev").cloned();

    let mut asked = Vec::new();
    let mut confirm = |prompt: &str| {
        asked.push(prompt.to_string());
        false
    };
    assert!(matches!(
        manager.create("dev", &mut confirm),
        Err(Error::Aborted(name)) if name == "dev"
    ));
    assert_eq!(asked, vec!["Overwrite env dev?".to_string()]);
    assert_eq!(manager.store().get("dev").cloned(), before);
}

#[rstest]
fn test_create_existing_confirmed_overwrites(mut manager: Manager) {
    let kind = manager.create("test", &mut accept).unwrap();
    assert_eq!(kind, SnapshotKind::Overwritten);
    assert!(manager.store().get("test").unwrap().disabled.is_empty());
}

#[rstest]
fn test_create_rejects_bad_name(mut manager: Manager) {
    assert!(matches!(
        manager.create(" padded", &mut accept),
        Err(Error::InvalidName(_))
    ));
}

#[rstest]
fn test_save_targets_active_by_default(mut manager: Manager) {
    manager.activate("test").unwrap();
    manager.registry.mods.insert("bar".to_string(), false);

    assert_eq!(manager.save(None).unwrap(), "test");
    let test = manager.store().get("test").unwrap();
    assert_eq!(
        test.disabled,
        BTreeSet::from(["bar".to_string(), "foo".to_string()])
    );
}

#[rstest]
fn test_save_unknown_name(mut manager: Manager) {
    assert!(matches!(manager.save(Some("nope")), Err(Error::NotFound(_))));
    assert!(!manager.store().contains("nope"));
}

#[rstest]
fn test_delete_default_is_protected(mut manager: Manager) {
    let before: Vec<String> = manager.list().map(|e| e.name.to_string()).collect();
    assert!(matches!(
        manager.delete(DEFAULT_ENV),
        Err(Error::ProtectedEnvironment(_))
    ));
    let after: Vec<String> = manager.list().map(|e| e.name.to_string()).collect();
    assert_eq!(before, after);
}

#[rstest]
fn test_delete_inactive(mut manager: Manager) {
    let report = manager.delete("test").unwrap();
    assert!(report.fallback.is_none());
    assert!(!manager.store().contains("test"));
    assert!(matches!(manager.delete("test"), Err(Error::NotFound(_))));
}

#[rstest]
fn test_delete_active_falls_back_to_default(mut manager: Manager) {
    manager.activate("test").unwrap();
    assert!(!manager.registry().enabled("foo"));

    let report = manager.delete("test").unwrap();
    let fallback = report.fallback.expect("Should have activated default");
    assert_eq!(fallback.name, DEFAULT_ENV);
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
    assert!(manager.registry().enabled("foo"));
    assert!(!manager.store().contains("test"));
}

#[rstest]
fn test_delete_active_keeps_entry_if_fallback_fails(mut manager: Manager) {
    manager.activate("test").unwrap();
    let mut broken_default = env(&[], &[]);
    broken_default.data_path = PathBuf::from("/bad/data");
    manager.store.put(DEFAULT_ENV, broken_default).unwrap();

    assert!(matches!(
        manager.delete("test"),
        Err(Error::InvalidPath { .. })
    ));
    assert!(manager.store().contains("test"));
    assert_eq!(manager.store().active(), Some("test"));
}

#[rstest]
fn test_list_is_restartable(manager: Manager) {
    let entries = manager.list();
    let first: Vec<(&str, bool)> = entries.clone().map(|e| (e.name, e.active)).collect();
    let second: Vec<(&str, bool)> = entries.map(|e| (e.name, e.active)).collect();
    assert_eq!(first, vec![(DEFAULT_ENV, true), ("test", false)]);
    assert_eq!(first, second);
}

#[rstest]
fn test_enable_already_enabled_is_noop(mut manager: Manager) {
    let before = manager.store().get(DEFAULT_ENV).cloned();

    let report = manager.enable(&["foo"]).unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.changes.len(), 1);
    assert!(!report.changes[0].changed);
    assert_eq!(report.changes[0].to_string(), "foo was already enabled");
    assert_eq!(manager.registry().toggles, 0);
    assert_eq!(manager.store().get(DEFAULT_ENV).cloned(), before);
}

#[rstest]
fn test_disable_updates_active_environment(mut manager: Manager) {
    let report = manager.disable(&["bar"]).unwrap();
    assert_eq!(report.changes[0].to_string(), "bar is now disabled");
    assert!(!manager.registry().enabled("bar"));
    assert_eq!(
        manager.store().get(DEFAULT_ENV).unwrap().disabled,
        BTreeSet::from(["bar".to_string()])
    );
}

#[rstest]
fn test_toggle_continues_past_unknown_patterns(mut manager: Manager) {
    let report = manager.disable(&["missing", "FOO", "b*"]).unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "missing");
    assert!(matches!(report.failures[0].1, Error::ModNotFound { .. }));
    assert_eq!(report.changes.len(), 2);
    assert!(!manager.registry().enabled("foo"));
    assert!(!manager.registry().enabled("bar"));
}

#[rstest]
fn test_bootstrap_seeds_default_once() {
    let mut host = FakeHost::default();
    host.held = BTreeSet::from(["bar".to_string()]);
    let mut manager = EnvironmentManager::new(
        EnvironmentStore::new("/cfg/envs.yaml"),
        FakeRegistry::with(&[("foo", false), ("bar", true)]),
        FakeValidator,
        host,
    );

    assert!(manager.bootstrap().unwrap());
    assert!(!manager.bootstrap().unwrap());
    assert_eq!(manager.store().active(), Some(DEFAULT_ENV));
    let default = manager.store().get(DEFAULT_ENV).unwrap();
    assert_eq!(default.disabled, BTreeSet::from(["foo".to_string()]));
    assert_eq!(default.held, BTreeSet::from(["bar".to_string()]));
}

#[rstest]
#[case(ActivationPhase::Idle, ActivationPhase::Validating, true)]
#[case(ActivationPhase::Validating, ActivationPhase::Failed, true)]
#[case(ActivationPhase::Applying, ActivationPhase::Active, true)]
#[case(ActivationPhase::Idle, ActivationPhase::Active, false)]
#[case(ActivationPhase::Active, ActivationPhase::Applying, false)]
#[case(ActivationPhase::Failed, ActivationPhase::Validating, false)]
fn test_activation_transitions(
    #[case] from: ActivationPhase,
    #[case] to: ActivationPhase,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_advance_to(to), allowed);
}
