//! Check command implementation.

use anyhow::{bail, Context, Result};
use confguard_core::{Evaluator, InventoryLoader, Policy};
use confguard_rules::load_policy_file;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config_resolver::{load_config, ConfigSource};
use crate::OutputFormat;

/// Options of the check command.
#[derive(Debug, Default)]
pub struct CheckOptions {
    pub format: OutputFormat,
    /// Policy files given on the command line. Empty means the configured ones.
    pub policies: Vec<PathBuf>,
    /// Comma-separated rule names.
    pub rules: Option<String>,
    pub exclude: Vec<String>,
}

/// Runs the check command. Returns `true` when any result is a failure.
pub fn run(path: &Path, options: CheckOptions, source: &ConfigSource) -> Result<bool> {
    let config = load_config(source)?;

    let policy_files: Vec<PathBuf> = if options.policies.is_empty() {
        config
            .evaluator
            .policies
            .iter()
            .map(|p| path.join(p))
            .collect()
    } else {
        options.policies
    };
    if policy_files.is_empty() {
        bail!("No policy files. Pass --policy or set `policies` under [evaluator].");
    }

    let mut policies: Vec<Policy> = Vec::new();
    for file in &policy_files {
        let loaded = load_policy_file(file, &config)
            .with_context(|| format!("Failed to load policies: {}", file.display()))?;
        policies.extend(loaded);
    }

    let inventory_root = path.join(&config.evaluator.root);
    let devices = InventoryLoader::new(&inventory_root)
        .excludes(config.evaluator.exclude.iter().cloned())
        .excludes(options.exclude)
        .registry(config.driver_registry())
        .load()
        .with_context(|| format!("Failed to load inventory: {}", inventory_root.display()))?;

    let known: HashSet<String> = policies
        .iter()
        .flat_map(Policy::rules)
        .map(|r| r.name().to_string())
        .collect();

    let mut builder = Evaluator::builder().policies(policies);
    if let Some(filter) = options.rules {
        let names: Vec<String> = filter
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
        for name in names.iter().filter(|n| !known.contains(n.as_str())) {
            tracing::warn!("Unknown rule: {}", name);
        }
        builder = builder.only_rules(names);
    }

    let evaluator = builder
        .devices(devices)
        .config(config)
        .build()
        .context("Failed to build evaluator")?;

    tracing::info!(
        "Checking {} device(s) against {} rule(s)",
        evaluator.device_count(),
        evaluator.rule_count()
    );

    let report = evaluator.evaluate();
    super::output::print(&report, options.format)?;

    Ok(report.has_failures())
}
