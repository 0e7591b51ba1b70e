//! Policies defined in TOML files.
//!
//! # Architecture
//!
//! ```text
//! TOML text
//!   ↓ serde (DTO layer)
//! config_dto types
//!   ↓ validate + convert (PolicyLoader)
//! Vec<Policy> holding TextRule / ScriptRule boxes
//! ```

use std::path::{Path, PathBuf};

use confguard_core::{Config, Policy};

pub mod config_dto;
pub mod loader;

pub use loader::{LoadError, PolicyLoader};

/// Errors from reading, parsing and loading policy files.
#[derive(Debug, thiserror::Error)]
pub enum LoadPolicyError {
    /// The policy file could not be read.
    #[error("Failed to read policy file {}: {source}", path.display())]
    Io {
        /// Policy file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// TOML deserialization failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Validation failed.
    #[error("{0}")]
    Load(#[from] LoadError),
}

/// Parses TOML content into policies.
///
/// Returns `Ok(vec![])` if no `[[policies]]` section is present.
///
/// # Errors
///
/// Returns an error if TOML parsing or validation fails.
pub fn load_policies_from_toml(
    content: &str,
    loader: &PolicyLoader,
) -> Result<Vec<Policy>, LoadPolicyError> {
    let dto: config_dto::PolicyFileDto = toml::from_str(content)?;
    Ok(loader.load(dto)?)
}

/// Reads a policy file, applying the text defaults and script limits of `config`.
///
/// Script files are resolved relative to the policy file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_policy_file(path: &Path, config: &Config) -> Result<Vec<Policy>, LoadPolicyError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadPolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loader = PolicyLoader::new()
        .base_dir(loader::parent_dir(path))
        .text_defaults(config.text.clone())
        .script_limits(config.script.clone());
    let policies = load_policies_from_toml(&content, &loader)?;
    tracing::debug!(
        "Loaded {} policy(ies) from {}",
        policies.len(),
        path.display()
    );
    Ok(policies)
}
