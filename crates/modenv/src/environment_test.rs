// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use rstest::rstest;

use super::*;

#[rstest]
fn test_snapshot_collects_sets() {
    let env = Environment::snapshot(
        PathBuf::from("/data"),
        PathBuf::from("/write"),
        vec!["foo".to_string(), "bar".to_string(), "foo".to_string()],
        Vec::new(),
    );

    assert_eq!(env.disabled.len(), 2);
    assert!(env.held.is_empty());
    assert!(env.updated.is_some());
    assert!(!env.wants_enabled("foo"));
    assert!(env.wants_enabled("baz"));
}

#[rstest]
fn test_parse_without_optional_fields() {
    let yaml = r#"
data_path: /data
write_path: /write
"#;
    let env: Environment = serde_yaml::from_str(yaml).expect("Should parse minimal entry");
    assert!(env.disabled.is_empty());
    assert!(env.held.is_empty());
    assert!(env.updated.is_none());
}

#[rstest]
fn test_lists_are_native_sequences() {
    let env = Environment {
        data_path: PathBuf::from("/data"),
        write_path: PathBuf::from("/write"),
        disabled: ["it's,odd]".to_string()].into_iter().collect(),
        held: BTreeSet::new(),
        updated: None,
    };
    let yaml = serde_yaml::to_string(&env).unwrap();
    let parsed: Environment = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, env);
}

#[rstest]
#[case("default", true)]
#[case("dev-1.1", true)]
#[case("with space", true)]
#[case("", false)]
#[case(" padded", false)]
#[case("padded\t", false)]
fn test_validate_name(#[case] name: &str, #[case] ok: bool) {
    assert_eq!(validate_name(name).is_ok(), ok, "name {name:?}");
}
