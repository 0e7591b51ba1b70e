//! Hierarchy-aware diff of configuration snapshots.
//!
//! Each comparable attribute of two snapshots is split into lines and
//! diffed with Myers' algorithm. Every resulting delta carries a few lines
//! of surrounding context and the chain of parent lines it sits under, so a
//! change to `ip address` reads as a change inside `interface Gi0/0`.

use crate::device::AttributeValue;
use crate::driver::DriverSchema;
use crate::hierarchy::{breadcrumb, parents, Ancestor};
use crate::types::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Default number of context lines around a delta.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Errors that can occur when diffing snapshots.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// The snapshots come from devices managed by different drivers.
    #[error("Incompatible configurations: driver {original} vs {revised}")]
    IncompatibleDrivers {
        /// Driver of the original snapshot.
        original: String,
        /// Driver of the revised snapshot.
        revised: String,
    },

    /// The schema passed in does not describe the snapshots' driver.
    #[error("Schema for driver {schema} cannot describe {driver} configurations")]
    SchemaMismatch {
        /// Driver named by the schema.
        schema: String,
        /// Driver of the snapshots.
        driver: String,
    },
}

/// A stored configuration of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Snapshot identifier. Zero for a synthesized empty baseline.
    pub id: u64,
    /// Device the snapshot was taken from.
    pub device: DeviceId,
    /// Driver managing the device.
    pub driver: String,
    /// When the configuration was retrieved.
    pub change_date: DateTime<Utc>,
    /// Attribute values by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl ConfigSnapshot {
    /// Creates a snapshot without attributes.
    #[must_use]
    pub fn new(id: u64, device: DeviceId, driver: impl Into<String>, change_date: DateTime<Utc>) -> Self {
        Self {
            id,
            device,
            driver: driver.into(),
            change_date,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// An empty snapshot standing in for a device's missing previous configuration.
    #[must_use]
    pub fn empty_baseline(of: &Self) -> Self {
        Self::new(0, of.device, of.driver.clone(), DateTime::<Utc>::default())
    }

    /// Reads an attribute as text; a missing attribute reads as empty.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.attributes
            .get(name)
            .map(AttributeValue::to_text)
            .unwrap_or_default()
    }
}

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeltaType {
    /// Lines present only in the revised text.
    Insert,
    /// Lines present only in the original text.
    Delete,
    /// Lines replaced by other lines.
    Change,
}

/// One change between two texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDelta {
    /// Kind of change.
    pub diff_type: DeltaType,
    /// Zero-based start line in the original text.
    pub original_position: usize,
    /// Zero-based start line in the revised text.
    pub revised_position: usize,
    /// Removed or replaced lines.
    pub original_lines: Vec<String>,
    /// Added or replacing lines.
    pub revised_lines: Vec<String>,
    /// Up to N original lines before the change.
    pub pre_context: Vec<String>,
    /// Up to N original lines after the change.
    pub post_context: Vec<String>,
    /// Parent lines of the change in the original text, root first.
    pub hierarchy: Vec<Ancestor>,
}

/// Diff between two configuration snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDiffResult {
    /// Date of the original snapshot.
    pub original_date: DateTime<Utc>,
    /// Date of the revised snapshot.
    pub revised_date: DateTime<Utc>,
    /// Identifier of the original snapshot.
    pub original_id: u64,
    /// Identifier of the revised snapshot.
    pub revised_id: u64,
    /// Deltas by attribute title. Omitted when deltas were not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas: Option<BTreeMap<String, Vec<ConfigDelta>>>,
}

impl ConfigDiffResult {
    /// Total number of deltas across attributes.
    #[must_use]
    pub fn delta_count(&self) -> usize {
        self.deltas
            .as_ref()
            .map_or(0, |d| d.values().map(Vec::len).sum())
    }
}

/// Splits attribute text into lines. Empty text has no lines.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.replace('\r', "").lines().map(String::from).collect()
}

/// Computes the deltas between two texts.
#[must_use]
pub fn diff_lines(original: &[String], revised: &[String], context_lines: usize) -> Vec<ConfigDelta> {
    let parent_index = parents(original);

    capture_diff_slices(Algorithm::Myers, original, revised)
        .into_iter()
        .filter_map(|op| {
            let (diff_type, old_index, old_len, new_index, new_len) = match op {
                DiffOp::Equal { .. } => return None,
                DiffOp::Delete {
                    old_index,
                    old_len,
                    new_index,
                } => (DeltaType::Delete, old_index, old_len, new_index, 0),
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => (DeltaType::Insert, old_index, 0, new_index, new_len),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => (DeltaType::Change, old_index, old_len, new_index, new_len),
            };

            let end = old_index + old_len;
            let pre_start = old_index.saturating_sub(context_lines);
            let post_end = (end + context_lines).min(original.len());

            Some(ConfigDelta {
                diff_type,
                original_position: old_index,
                revised_position: new_index,
                original_lines: original[old_index..end].to_vec(),
                revised_lines: revised[new_index..new_index + new_len].to_vec(),
                pre_context: original[pre_start..old_index].to_vec(),
                post_context: original[end.min(original.len())..post_end].to_vec(),
                hierarchy: breadcrumb(original, &parent_index, old_index),
            })
        })
        .collect()
}

/// Diff engine for configuration snapshots.
#[derive(Debug, Clone)]
pub struct ConfigDiffer {
    context_lines: usize,
}

impl Default for ConfigDiffer {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl ConfigDiffer {
    /// Creates a differ with the default context size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of context lines around each delta.
    #[must_use]
    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Diffs two snapshots of the same driver.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::IncompatibleDrivers`] if the snapshots come from
    /// different drivers, and [`DiffError::SchemaMismatch`] if `schema` is
    /// not the schema of their driver. Nothing is computed in either case.
    pub fn diff(
        &self,
        schema: &DriverSchema,
        original: &ConfigSnapshot,
        revised: &ConfigSnapshot,
        include_deltas: bool,
    ) -> Result<ConfigDiffResult, DiffError> {
        if original.driver != revised.driver {
            return Err(DiffError::IncompatibleDrivers {
                original: original.driver.clone(),
                revised: revised.driver.clone(),
            });
        }
        if schema.name != original.driver {
            return Err(DiffError::SchemaMismatch {
                schema: schema.name.clone(),
                driver: original.driver.clone(),
            });
        }

        let deltas = include_deltas.then(|| {
            let mut by_title: BTreeMap<String, Vec<ConfigDelta>> = BTreeMap::new();
            for definition in schema.comparable() {
                let a = split_lines(&original.text(&definition.name));
                let b = split_lines(&revised.text(&definition.name));
                let deltas = diff_lines(&a, &b, self.context_lines);
                debug!(
                    "{} delta(s) on attribute {}",
                    deltas.len(),
                    definition.name
                );
                if !deltas.is_empty() {
                    by_title
                        .entry(definition.display_title().to_string())
                        .or_default()
                        .extend(deltas);
                }
            }
            by_title
        });

        Ok(ConfigDiffResult {
            original_date: original.change_date,
            revised_date: revised.change_date,
            original_id: original.id,
            revised_id: revised.id,
            deltas,
        })
    }

    /// Diffs a snapshot against the nearest earlier snapshot of the same device.
    ///
    /// When `history` holds no earlier snapshot, an empty baseline is used so
    /// that the first configuration of a device diffs as pure insertions.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigDiffer::diff`].
    pub fn diff_against_previous(
        &self,
        schema: &DriverSchema,
        history: &[ConfigSnapshot],
        revised: &ConfigSnapshot,
        include_deltas: bool,
    ) -> Result<ConfigDiffResult, DiffError> {
        let baseline;
        let original = match previous_snapshot(history, revised) {
            Some(previous) => previous,
            None => {
                baseline = ConfigSnapshot::empty_baseline(revised);
                &baseline
            }
        };
        self.diff(schema, original, revised, include_deltas)
    }
}

/// Finds the latest snapshot of the same device taken before `revised`.
#[must_use]
pub fn previous_snapshot<'a>(
    history: &'a [ConfigSnapshot],
    revised: &ConfigSnapshot,
) -> Option<&'a ConfigSnapshot> {
    history
        .iter()
        .filter(|s| s.device == revised.device && s.change_date < revised.change_date)
        .max_by_key(|s| s.change_date)
}

/// Diffs two snapshots with default settings.
///
/// # Errors
///
/// See [`ConfigDiffer::diff`].
pub fn diff(
    schema: &DriverSchema,
    original: &ConfigSnapshot,
    revised: &ConfigSnapshot,
    include_deltas: bool,
) -> Result<ConfigDiffResult, DiffError> {
    ConfigDiffer::new().diff(schema, original, revised, include_deltas)
}
