//! Integration test: snapshot files diffed through the driver schema.
//!
//! Uses fixture files under `tests/fixtures/history/` to verify that stored
//! snapshots load from TOML and JSON, pick the right baseline, and produce
//! deltas explained by their position in the indentation hierarchy.

use confguard_core::{
    load_snapshot, AttributeDefinition, AttributeKind, ConfigDiffer, ConfigSnapshot, DeltaType,
    DiffError, DriverSchema,
};
use std::path::PathBuf;

fn history_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/history")
}

fn snapshot(file: &str) -> ConfigSnapshot {
    load_snapshot(&history_dir().join(file)).expect("fixture snapshot should load")
}

fn history() -> Vec<ConfigSnapshot> {
    ["r1-1.toml", "r1-2.json", "r2-1.toml"]
        .into_iter()
        .map(snapshot)
        .collect()
}

fn junos() -> DriverSchema {
    DriverSchema::new("JuniperJunos", "Juniper Junos")
        .attribute(
            AttributeDefinition::new("runningConfig", "Configuration", AttributeKind::LongText)
                .comparable(),
        )
        .attribute(AttributeDefinition::new("serial", "Serial number", AttributeKind::Text))
}

#[test]
fn change_is_located_in_the_hierarchy() {
    let result = ConfigDiffer::new()
        .diff(&junos(), &snapshot("r1-1.toml"), &snapshot("r1-2.json"), true)
        .expect("same driver should diff");

    assert_eq!(result.original_id, 101);
    assert_eq!(result.revised_id, 102);

    let deltas = result.deltas.expect("deltas were requested");
    assert_eq!(deltas.len(), 1, "only comparable attributes are diffed");
    let config = &deltas["Configuration"];
    assert_eq!(config.len(), 1);

    let delta = &config[0];
    assert_eq!(delta.diff_type, DeltaType::Change);
    assert_eq!(delta.original_lines, vec!["    ip 1.1.1.1".to_string()]);
    assert_eq!(delta.revised_lines, vec!["    ip 1.1.1.9".to_string()]);
    let path: Vec<(&str, usize)> = delta
        .hierarchy
        .iter()
        .map(|a| (a.text.as_str(), a.index))
        .collect();
    assert_eq!(path, vec![("router", 0), ("interface eth0", 1)]);
}

#[test]
fn latest_snapshot_diffs_against_its_predecessor() {
    let history = history();
    let latest = snapshot("r1-2.json");

    let result = ConfigDiffer::new()
        .diff_against_previous(&junos(), &history, &latest, true)
        .expect("same driver should diff");

    assert_eq!(result.original_id, 101);
    assert_eq!(result.delta_count(), 1);
}

#[test]
fn first_snapshot_diffs_as_insertions() {
    let history = history();
    let first = snapshot("r1-1.toml");

    let result = ConfigDiffer::new()
        .diff_against_previous(&junos(), &history, &first, true)
        .expect("baseline shares the driver");

    assert_eq!(result.original_id, 0);
    let deltas = result.deltas.expect("deltas were requested");
    let config = &deltas["Configuration"];
    assert!(config.iter().all(|d| d.diff_type == DeltaType::Insert));
    let inserted: usize = config.iter().map(|d| d.revised_lines.len()).sum();
    assert_eq!(inserted, 5);
}

#[test]
fn snapshots_of_different_drivers_are_rejected() {
    let err = ConfigDiffer::new()
        .diff(&junos(), &snapshot("r1-1.toml"), &snapshot("r2-1.toml"), true)
        .expect_err("drivers differ");

    assert!(matches!(err, DiffError::IncompatibleDrivers { .. }));
}
