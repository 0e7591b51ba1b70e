//! # confguard-rules
//!
//! Rule implementations and policy files for confguard.
//!
//! ## Rule kinds
//!
//! | Type | Rule | Description |
//! |------|------|-------------|
//! | `text` | [`TextRule`] | Literal or regex matching over configuration sections |
//! | `script` | [`ScriptRule`] | Rhai script with a `check(device)` entry point |
//! | `script`, `language = "python"` | [`PythonRule`] | Python script with the same entry point |
//!
//! ## Usage
//!
//! ```ignore
//! use confguard_core::{Config, Evaluator, InventoryLoader};
//! use confguard_rules::load_policy_file;
//!
//! let config = Config::default();
//! let policies = load_policy_file("policies.toml".as_ref(), &config)?;
//! let report = Evaluator::builder()
//!     .policies(policies)
//!     .devices(InventoryLoader::new("./inventory").load()?)
//!     .build()?
//!     .evaluate();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod kinds;
pub mod policy_file;
pub mod script;
mod text_rule;

#[cfg(test)]
mod test_support;

pub use error::RuleError;
pub use kinds::{all_kinds, script_template, RuleKind, SCRIPT_LANGUAGES};
pub use policy_file::{load_policies_from_toml, load_policy_file, LoadError, LoadPolicyError, PolicyLoader};
pub use script::{
    HostRecord, HostResolver, PythonRule, ScriptRule, SystemResolver, DEFAULT_PYTHON_SCRIPT,
    DEFAULT_SCRIPT,
};
pub use text_rule::{normalize_text, TextRule};

/// Re-export core types for convenience.
pub use confguard_core::{CheckResult, Policy, ResultOption, Rule};
