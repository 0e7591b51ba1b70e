//! Init command implementation.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "confguard.toml";

const DEFAULT_CONFIG: &str = r#"# confguard configuration

[evaluator]
# Directory holding one TOML or JSON file per device
root = "inventory"

# Glob patterns to exclude from inventory discovery
exclude = []

# Policy files, relative to this directory
policies = ["policies.toml"]

# Worker threads (default: one per CPU, 1 = sequential)
# parallelism = 4

[script]
max_operations = 1000000
max_execution_time_ms = 5000
allow_nslookup = false

[text]
# Whether text rules strip control characters and trailing spaces
default_normalize = false

[diff]
context_lines = 3

[[drivers]]
name = "CiscoIOS12"
description = "Cisco IOS and IOS-XE"

[[drivers.attributes]]
name = "runningConfig"
title = "Running configuration"
type = "long-text"
comparable = true
checkable = true

# Rules can be disabled by name
# [rules.vty-ssh-only]
# enabled = false
"#;

/// Runs the init command and returns the path of the written file.
pub fn run(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)?;

    println!("Created {CONFIG_FILE}");
    println!("\nNext steps:");
    println!("  1. Add device files under inventory/");
    println!("  2. Write policies.toml (see: confguard list-rules)");
    println!("  3. Run: confguard check");

    Ok(config_path)
}
