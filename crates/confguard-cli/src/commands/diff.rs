//! Diff command implementation.

use anyhow::{Context, Result};
use confguard_core::{load_snapshot, ConfigDiffResult, ConfigDiffer};
use std::path::Path;

use crate::config_resolver::{load_config, ConfigSource};
use crate::DiffFormat;

/// Runs the diff command.
pub fn run(
    original: &Path,
    revised: &Path,
    include_deltas: bool,
    format: DiffFormat,
    source: &ConfigSource,
) -> Result<()> {
    let result = compute(original, revised, include_deltas, source)?;
    print!("{}", super::output::render_diff(&result, format)?);
    Ok(())
}

fn compute(
    original: &Path,
    revised: &Path,
    include_deltas: bool,
    source: &ConfigSource,
) -> Result<ConfigDiffResult> {
    let config = load_config(source)?;
    let original = load_snapshot(original)
        .with_context(|| format!("Failed to load snapshot: {}", original.display()))?;
    let revised = load_snapshot(revised)
        .with_context(|| format!("Failed to load snapshot: {}", revised.display()))?;

    let registry = config.driver_registry();
    let schema = registry.get(&original.driver).with_context(|| {
        format!(
            "No schema for driver {}. Declare it under [[drivers]].",
            original.driver
        )
    })?;

    tracing::debug!(
        "Diffing snapshot {} against {} ({})",
        original.id,
        revised.id,
        schema.name
    );

    Ok(ConfigDiffer::new()
        .context_lines(config.diff.context_lines)
        .diff(schema, &original, &revised, include_deltas)?)
}
