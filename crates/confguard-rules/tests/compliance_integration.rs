//! Integration test: policy files evaluated over an inventory.
//!
//! Uses fixture files under `tests/fixtures/compliance/` to verify that the
//! full TOML → DTO → rules → Evaluator pipeline produces the expected
//! verdict for every (rule, device) pair.

use chrono::{TimeZone, Utc};
use confguard_core::{
    CheckResultStore, ComplianceReport, Config, DeviceId, Evaluator, InventoryLoader, ResultOption,
    RuleId,
};
use confguard_rules::load_policy_file;
use std::path::PathBuf;

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/compliance")
}

fn evaluate(config: Config) -> ComplianceReport {
    let root = fixture_root();
    let policies = config
        .evaluator
        .policies
        .iter()
        .flat_map(|file| {
            load_policy_file(&root.join(file), &config).expect("fixture policies should load")
        })
        .collect::<Vec<_>>();
    let devices = InventoryLoader::new(root.join(&config.evaluator.root))
        .registry(config.driver_registry())
        .load()
        .expect("fixture inventory should load");

    Evaluator::builder()
        .policies(policies)
        .devices(devices)
        .config(config)
        .at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
        .build()
        .expect("evaluator should build")
        .evaluate()
}

fn fixture_config() -> Config {
    Config::from_file(&fixture_root().join("confguard.toml")).expect("fixture config should parse")
}

fn verdict(report: &ComplianceReport, device: &str, rule: &str) -> ResultOption {
    report
        .results
        .iter()
        .find(|r| r.device_name == device && r.rule_name == rule)
        .unwrap_or_else(|| panic!("no result for {rule} on {device}"))
        .result
}

// ── Happy path ──

#[test]
fn every_pair_gets_the_expected_verdict() {
    let report = evaluate(fixture_config());

    // 5 rules of "hardening" on 3 devices, 1 rule of "junos" on core1.
    assert_eq!(
        report.results.len(),
        16,
        "unexpected results: {:#?}",
        report.results.iter().map(|r| r.format()).collect::<Vec<_>>()
    );
    assert_eq!(report.devices_checked, 3);
    assert_eq!(report.rules_checked, 6);

    let expected = [
        ("edge1", "vty-ssh-only", ResultOption::Conforming),
        ("edge1", "interface-descriptions", ResultOption::Conforming),
        ("edge1", "ntp-configured", ResultOption::Conforming),
        ("edge1", "banner-present", ResultOption::Disabled),
        ("edge2", "vty-ssh-only", ResultOption::Nonconforming),
        ("edge2", "interface-descriptions", ResultOption::Exempted),
        ("edge2", "ntp-configured", ResultOption::Nonconforming),
        ("core1", "vty-ssh-only", ResultOption::NotApplicable),
        ("core1", "interface-descriptions", ResultOption::NotApplicable),
        ("core1", "ntp-configured", ResultOption::NotApplicable),
        ("core1", "junos-remote-syslog", ResultOption::Conforming),
    ];
    for (device, rule, result) in expected {
        assert_eq!(verdict(&report, device, rule), result, "{rule} on {device}");
    }
}

#[test]
fn results_are_ordered_by_device_then_rule() {
    let report = evaluate(fixture_config());
    let first = &report.results[0];
    assert_eq!(first.device_name, "core1");
    assert_eq!(first.rule_name, "banner-present");
    let last = report.results.last().expect("results should not be empty");
    assert_eq!(last.device_name, "edge2");
    assert_eq!(last.rule_name, "vty-ssh-only");
}

#[test]
fn comments_explain_verdicts() {
    let report = evaluate(fixture_config());
    let ntp = report
        .results
        .iter()
        .find(|r| r.device_name == "edge2" && r.rule_name == "ntp-configured")
        .expect("ntp result on edge2");
    assert_eq!(ntp.comment, "No NTP server configured");

    let vty = report
        .results
        .iter()
        .find(|r| r.device_name == "core1" && r.rule_name == "vty-ssh-only")
        .expect("vty result on core1");
    assert_eq!(vty.comment, "The rule doesn't apply to the device's driver");
}

// ── Containment ──

#[test]
fn failing_script_only_affects_itself() {
    let report = evaluate(fixture_config());

    let invalid = report.by_result(ResultOption::InvalidRule);
    assert_eq!(invalid.len(), 3, "the reboot script fails on every device");
    assert!(invalid.iter().all(|r| r.rule_name == "reboot-attempt"));
    assert!(invalid.iter().all(|r| !r.comment.is_empty()));

    assert_eq!(verdict(&report, "edge1", "ntp-configured"), ResultOption::Conforming);
    assert!(report.has_failures());
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let parallel = evaluate(fixture_config());

    let mut config = fixture_config();
    config.evaluator.parallelism = Some(1);
    let sequential = evaluate(config);

    assert_eq!(parallel.results, sequential.results);
}

#[test]
fn python_and_rhai_scripts_agree() {
    let rhai = evaluate(fixture_config());

    let mut config = fixture_config();
    config.evaluator.policies = vec!["python.toml".into()];
    let python = evaluate(config);

    assert_eq!(python.results.len(), 3);
    for device in ["edge1", "edge2", "core1"] {
        assert_eq!(
            verdict(&python, device, "ntp-configured-py"),
            verdict(&rhai, device, "ntp-configured"),
            "{device}"
        );
    }
    let edge2 = python
        .results
        .iter()
        .find(|r| r.device_name == "edge2")
        .expect("python result on edge2");
    assert_eq!(edge2.comment, "No NTP server configured");
}

// ── Configuration ──

#[test]
fn configuration_can_disable_rules_by_name() {
    let mut config = fixture_config();
    config.rules.insert(
        "reboot-attempt".to_string(),
        confguard_core::RuleConfig {
            enabled: Some(false),
        },
    );
    let report = evaluate(config);

    assert!(report.by_result(ResultOption::InvalidRule).is_empty());
    assert_eq!(report.results.len(), 13);
}

#[test]
fn schema_drops_unchecked_attributes() {
    let config = fixture_config();
    let devices = InventoryLoader::new(fixture_root().join("inventory"))
        .registry(config.driver_registry())
        .load()
        .expect("fixture inventory should load");
    let edge1 = devices
        .iter()
        .find(|d| d.name == "edge1")
        .expect("edge1 should be loaded");

    assert!(edge1.config.contains_key("runningConfig"));
    assert!(!edge1.config.contains_key("iosVersion"));
}

#[test]
fn store_keeps_latest_result_per_pair() {
    let config = fixture_config();
    let root = fixture_root();
    let policies = load_policy_file(&root.join("policies.toml"), &config)
        .expect("fixture policies should load");
    let devices = InventoryLoader::new(root.join("inventory"))
        .load()
        .expect("fixture inventory should load");

    let mut store = CheckResultStore::new();
    let evaluator = Evaluator::builder()
        .policies(policies)
        .devices(devices)
        .build()
        .expect("evaluator should build");
    evaluator.evaluate_into(&mut store);
    evaluator.evaluate_into(&mut store);

    assert_eq!(store.len(), 16);
    let result = store
        .get(RuleId(10), DeviceId(2))
        .expect("vty result on edge2");
    assert_eq!(result.result, ResultOption::Nonconforming);
}
