//! # confguard-core
//!
//! Core framework for network device configuration compliance.
//!
//! This crate provides the foundational traits and types for checking
//! device configurations against policies. It includes:
//!
//! - [`Rule`] trait and [`evaluate_rule`], the shared evaluation precedence
//! - [`parents`] and [`select_sections`] for indentation-structured text
//! - [`ConfigDiffer`] for hierarchy-aware configuration diffs
//! - [`Evaluator`] for running policies over an inventory of devices
//! - [`CheckResult`] and [`ComplianceReport`] for representing outcomes
//!
//! ## Example
//!
//! ```ignore
//! use confguard_core::{Evaluator, InventoryLoader};
//!
//! let devices = InventoryLoader::new("./inventory").load()?;
//! let evaluator = Evaluator::builder()
//!     .policy(my_policy)
//!     .devices(devices)
//!     .build()?;
//!
//! let report = evaluator.evaluate();
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod device;
mod diff;
mod driver;
mod evaluator;
mod hierarchy;
mod inventory;
mod logger;
mod priority;
mod rule;
mod section;
mod types;

pub use config::{
    Config, ConfigError, DiffConfig, EvaluatorConfig, RuleConfig, ScriptConfig, TextConfig,
    MAX_SCRIPT_TIME_MS,
};
pub use device::{
    AttributeValue, Device, DeviceData, DeviceExemption, DeviceRecord, Module, NetworkInterface,
};
pub use diff::{
    diff, diff_lines, previous_snapshot, split_lines, ConfigDelta, ConfigDiffResult, ConfigDiffer,
    ConfigSnapshot, DeltaType, DiffError, DEFAULT_CONTEXT_LINES,
};
pub use driver::{AttributeDefinition, AttributeKind, DriverRegistry, DriverSchema};
pub use evaluator::{Evaluator, EvaluatorBuilder, EvaluatorError};
pub use hierarchy::{breadcrumb, indent_of, parents, Ancestor};
pub use inventory::{load_snapshot, read_document, InventoryError, InventoryLoader};
pub use logger::{EvaluationLog, LogEntry, LogLevel};
pub use priority::{move_before, renumber, Prioritized, ReorderError, PRIORITY_STEP};
pub use rule::{
    evaluate_rule, evaluate_rule_at, Applicability, Policy, Prepared, Rule, RuleBox, Verdict,
};
pub use section::{find_sections, full_match_regex, select_sections, Section, TITLE_SEPARATOR};
pub use types::{
    CheckResult, CheckResultDiagnostic, CheckResultStore, ComplianceReport, DeviceId, Exemption,
    PolicyId, ResultOption, RuleId,
};
