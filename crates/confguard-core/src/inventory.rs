//! Loading of device records and configuration snapshots from disk.

use crate::device::DeviceRecord;
use crate::diff::ConfigSnapshot;
use crate::driver::DriverRegistry;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while loading inventory files.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// IO error reading a file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A file could not be deserialized.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// The file extension is neither `.toml` nor `.json`.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Two records share an identifier.
    #[error("Duplicate device id {id} in {path}")]
    DuplicateDevice {
        /// Duplicated identifier.
        id: u64,
        /// File holding the second record.
        path: PathBuf,
    },

    /// Glob pattern error.
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Reads a TOML or JSON file, picking the format from the extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialized.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, InventoryError> {
    let content = std::fs::read_to_string(path).map_err(|e| InventoryError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parse_error = |message: String| InventoryError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        _ => Err(InventoryError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Loads a configuration snapshot file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialized.
pub fn load_snapshot(path: &Path) -> Result<ConfigSnapshot, InventoryError> {
    read_document(path)
}

/// Discovers and loads device records under a directory.
#[derive(Debug, Clone)]
pub struct InventoryLoader {
    root: PathBuf,
    exclude_patterns: Vec<String>,
    registry: DriverRegistry,
}

impl InventoryLoader {
    /// Creates a loader for the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_patterns: Vec::new(),
            registry: DriverRegistry::new(),
        }
    }

    /// Adds an exclude glob pattern.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Adds multiple exclude glob patterns.
    #[must_use]
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Sets the driver registry used to hide non-checkable attributes.
    #[must_use]
    pub fn registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Loads every device record found under the root.
    ///
    /// Records whose driver has a registered schema keep only the
    /// configuration attributes the schema declares checkable.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, a file does not parse, or two
    /// records share an identifier.
    pub fn load(&self) -> Result<Vec<DeviceRecord>, InventoryError> {
        info!("Loading inventory from {}", self.root.display());

        let files = self.discover_files()?;
        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(files.len());

        for path in files {
            debug!("Loading device: {}", path.display());
            let mut device: DeviceRecord = read_document(&path)?;
            if !seen.insert(device.id) {
                return Err(InventoryError::DuplicateDevice {
                    id: device.id.0,
                    path,
                });
            }
            match self.registry.get(&device.driver) {
                Some(schema) => device.retain_config(|name| schema.is_checkable(name)),
                None if !self.registry.is_empty() => {
                    warn!("No schema for driver {} of {}", device.driver, device.name);
                }
                None => {}
            }
            devices.push(device);
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    /// Discovers all device files to load.
    fn discover_files(&self) -> Result<Vec<PathBuf>, InventoryError> {
        let mut files = Vec::new();

        for extension in ["toml", "json"] {
            let pattern = format!("{}/**/*.{extension}", self.root.display());
            for entry in glob::glob(&pattern)? {
                let path = entry.map_err(|e| InventoryError::Io {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                })?;

                if self.should_exclude(&path) {
                    debug!("Excluding: {}", path.display());
                    continue;
                }

                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Checks if a path should be excluded.
    fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        self.exclude_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern).is_ok_and(|p| p.matches(&path_str))
        })
    }
}
