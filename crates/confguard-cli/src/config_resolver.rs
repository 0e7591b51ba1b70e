//! Locating `confguard.toml`.
//!
//! The first hit wins: the `--config` flag, then `confguard.toml` or
//! `.confguard.toml` in the inventory directory, then `config.toml` in
//! `$CONFGUARD_CONFIG_DIR` (or `~/.confguard`). Without any, defaults apply.

use anyhow::{Context, Result};
use confguard_core::Config;
use std::path::{Path, PathBuf};

/// Where the configuration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given with `--config`.
    Explicit(PathBuf),
    /// `confguard.toml` or `.confguard.toml` next to the inventory.
    Project(PathBuf),
    /// `config.toml` in the global directory.
    Global(PathBuf),
    /// Nothing found; built-in defaults apply.
    Default,
}

const PROJECT_CONFIG_NAMES: &[&str] = &["confguard.toml", ".confguard.toml"];
const GLOBAL_CONFIG_NAME: &str = "config.toml";
const CONFIG_DIR_VAR: &str = "CONFGUARD_CONFIG_DIR";

/// Resolves the configuration file for an inventory directory.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    let global_dir = global_config_dir(std::env::var_os(CONFIG_DIR_VAR).map(PathBuf::from));
    resolve_with(project_dir, explicit, global_dir.as_deref())
}

fn resolve_with(project_dir: &Path, explicit: Option<&Path>, global_dir: Option<&Path>) -> ConfigSource {
    if let Some(p) = explicit {
        return ConfigSource::Explicit(p.to_path_buf());
    }

    if let Some(found) = PROJECT_CONFIG_NAMES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|candidate| candidate.is_file())
    {
        tracing::debug!("Found project config: {}", found.display());
        return ConfigSource::Project(found);
    }

    match global_dir.map(|dir| dir.join(GLOBAL_CONFIG_NAME)) {
        Some(found) if found.is_file() => {
            tracing::debug!("Found global config: {}", found.display());
            ConfigSource::Global(found)
        }
        _ => ConfigSource::Default,
    }
}

/// `$CONFGUARD_CONFIG_DIR` when set, else `~/.confguard`.
fn global_config_dir(overridden: Option<PathBuf>) -> Option<PathBuf> {
    overridden.or_else(|| home::home_dir().map(|h| h.join(".confguard")))
}

/// Loads the configuration a resolution points at, or defaults.
///
/// # Errors
///
/// Returns an error if the resolved file cannot be read or parsed.
pub fn load_config(source: &ConfigSource) -> Result<Config> {
    let path = match source {
        ConfigSource::Default => return Ok(Config::default()),
        ConfigSource::Global(p) => {
            tracing::info!("Using global config: {}", p.display());
            p
        }
        ConfigSource::Explicit(p) | ConfigSource::Project(p) => p,
    };
    Config::from_file(path).with_context(|| format!("Failed to load config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolution_walks_explicit_project_global_default() {
        let inventory = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let explicit = inventory.path().join("ci.toml");

        let resolve = |explicit: Option<&Path>| resolve_with(inventory.path(), explicit, Some(global.path()));

        assert_eq!(resolve(None), ConfigSource::Default);

        fs::write(global.path().join("config.toml"), "").unwrap();
        assert_eq!(resolve(None), ConfigSource::Global(global.path().join("config.toml")));

        fs::write(inventory.path().join(".confguard.toml"), "").unwrap();
        assert_eq!(resolve(None), ConfigSource::Project(inventory.path().join(".confguard.toml")));

        fs::write(inventory.path().join("confguard.toml"), "").unwrap();
        assert_eq!(resolve(None), ConfigSource::Project(inventory.path().join("confguard.toml")));

        // An explicit path is taken as given, even when it does not exist.
        assert_eq!(resolve(Some(&explicit)), ConfigSource::Explicit(explicit.clone()));
    }

    #[test]
    fn config_dir_variable_overrides_home() {
        let dir = PathBuf::from("/etc/confguard");
        assert_eq!(global_config_dir(Some(dir.clone())), Some(dir));
        if let Some(home) = home::home_dir() {
            assert_eq!(global_config_dir(None), Some(home.join(".confguard")));
        }
    }

    #[test]
    fn overridden_config_dir_feeds_resolution() {
        let inventory = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("config.toml"), "[diff]\ncontext_lines = 5\n").unwrap();

        let dir = global_config_dir(Some(shared.path().to_path_buf()));
        let source = resolve_with(inventory.path(), None, dir.as_deref());
        assert!(matches!(source, ConfigSource::Global(_)));
        assert_eq!(load_config(&source).unwrap().diff.context_lines, 5);
    }

    #[test]
    fn load_config_defaults_without_file() {
        let config = load_config(&ConfigSource::Default).unwrap();
        assert_eq!(config.diff.context_lines, 3);
    }

    #[test]
    fn load_config_reports_broken_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("confguard.toml");
        fs::write(&path, "[evaluator\n").unwrap();

        let err = load_config(&ConfigSource::Project(path)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load config"));
    }

    #[test]
    fn load_config_reads_inventory_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("confguard.toml");
        fs::write(&path, "[evaluator]\nroot = \"devices\"\n").unwrap();

        let config = load_config(&ConfigSource::Explicit(path)).unwrap();
        assert_eq!(config.evaluator.root, PathBuf::from("devices"));
    }
}
