//! Core types for compliance results.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifier of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

/// Identifier of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

/// Identifier of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub u64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(RuleId, DeviceId, PolicyId);

/// Outcome of checking one rule against one device.
///
/// The numeric code returned by [`ResultOption::code`] is the stable wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultOption {
    /// The device complies with the rule.
    Conforming,
    /// The device does not comply with the rule.
    Nonconforming,
    /// The rule does not apply to the device.
    NotApplicable,
    /// The rule could not be evaluated (bad pattern, broken script).
    InvalidRule,
    /// The device holds an active exemption for the rule.
    Exempted,
    /// The rule is disabled.
    Disabled,
}

impl ResultOption {
    /// All options, in code order.
    pub const ALL: [Self; 6] = [
        Self::Conforming,
        Self::Nonconforming,
        Self::NotApplicable,
        Self::InvalidRule,
        Self::Exempted,
        Self::Disabled,
    ];

    /// Returns the stable numeric code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Conforming => 0,
            Self::Nonconforming => 1,
            Self::NotApplicable => 2,
            Self::InvalidRule => 3,
            Self::Exempted => 4,
            Self::Disabled => 5,
        }
    }

    /// Looks an option up by its numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.code() == code)
    }

    /// Returns the upper-case name used in reports and scripts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conforming => "CONFORMING",
            Self::Nonconforming => "NONCONFORMING",
            Self::NotApplicable => "NOTAPPLICABLE",
            Self::InvalidRule => "INVALIDRULE",
            Self::Exempted => "EXEMPTED",
            Self::Disabled => "DISABLED",
        }
    }

    /// Parses the upper-case name of an option.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == name)
    }

    /// Whether this outcome should fail a compliance run.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Nonconforming | Self::InvalidRule)
    }
}

impl fmt::Display for ResultOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-bounded exemption of a device from a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    /// Exempted rule.
    pub rule: RuleId,
    /// Exempted device.
    pub device: DeviceId,
    /// The exemption is inert from this instant on.
    pub expiration_date: DateTime<Utc>,
}

impl Exemption {
    /// Creates a new exemption.
    #[must_use]
    pub fn new(rule: RuleId, device: DeviceId, expiration_date: DateTime<Utc>) -> Self {
        Self {
            rule,
            device,
            expiration_date,
        }
    }

    /// Whether the exemption still applies at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration_date
    }
}

/// The last evaluation outcome of a rule on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Evaluated rule.
    pub rule: RuleId,
    /// Name of the evaluated rule.
    pub rule_name: String,
    /// Evaluated device.
    pub device: DeviceId,
    /// Name of the evaluated device.
    pub device_name: String,
    /// Outcome.
    pub result: ResultOption,
    /// Free-text explanation, empty when there is nothing to say.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// When the check ran.
    pub check_date: DateTime<Utc>,
}

impl CheckResult {
    /// Creates a new result without comment.
    #[must_use]
    pub fn new(
        rule: RuleId,
        rule_name: impl Into<String>,
        device: DeviceId,
        device_name: impl Into<String>,
        result: ResultOption,
        check_date: DateTime<Utc>,
    ) -> Self {
        Self {
            rule,
            rule_name: rule_name.into(),
            device,
            device_name: device_name.into(),
            result,
            comment: String::new(),
            check_date,
        }
    }

    /// Sets the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Formats the result for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = format!(
            "{} [{}] on {} [{}]: {}",
            self.rule_name, self.rule, self.device_name, self.device, self.result
        );
        if !self.comment.is_empty() {
            output.push_str(" - ");
            output.push_str(&self.comment);
        }
        output
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.device_name, self.result, self.rule_name)?;
        if !self.comment.is_empty() {
            write!(f, " {}", self.comment)?;
        }
        Ok(())
    }
}

/// Converts a failing result to a miette Diagnostic for rich display.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{device}: rule '{rule}' is {result}")]
pub struct CheckResultDiagnostic {
    device: String,
    rule: String,
    result: ResultOption,
    #[help]
    help: Option<String>,
}

impl From<&CheckResult> for CheckResultDiagnostic {
    fn from(r: &CheckResult) -> Self {
        Self {
            device: r.device_name.clone(),
            rule: r.rule_name.clone(),
            result: r.result,
            help: (!r.comment.is_empty()).then(|| r.comment.clone()),
        }
    }
}

/// Latest check results keyed by (rule, device).
///
/// Recording a result for a pair that already has one replaces it.
#[derive(Debug, Default, Clone)]
pub struct CheckResultStore {
    results: HashMap<(RuleId, DeviceId), CheckResult>,
}

impl CheckResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a result, returning the one it replaces.
    pub fn record(&mut self, result: CheckResult) -> Option<CheckResult> {
        self.results.insert((result.rule, result.device), result)
    }

    /// Returns the latest result of a rule on a device.
    #[must_use]
    pub fn get(&self, rule: RuleId, device: DeviceId) -> Option<&CheckResult> {
        self.results.get(&(rule, device))
    }

    /// Drops every result of a rule.
    pub fn forget_rule(&mut self, rule: RuleId) {
        self.results.retain(|(r, _), _| *r != rule);
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterates over stored results in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.values()
    }
}

/// Result of a batch compliance run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Every check result of the run.
    pub results: Vec<CheckResult>,
    /// Number of devices checked.
    pub devices_checked: usize,
    /// Number of rules evaluated.
    pub rules_checked: usize,
}

impl ComplianceReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any result is nonconforming or invalid.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.result.is_failure())
    }

    /// Returns results with the given outcome.
    #[must_use]
    pub fn by_result(&self, option: ResultOption) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| r.result == option).collect()
    }

    /// Counts results per outcome. Outcomes with no result are omitted.
    #[must_use]
    pub fn count_by_result(&self) -> BTreeMap<ResultOption, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.results {
            *counts.entry(r.result).or_insert(0) += 1;
        }
        counts
    }

    /// Formats a one-line summary such as `2 CONFORMING, 1 NONCONFORMING`.
    #[must_use]
    pub fn summary(&self) -> String {
        let counts = self.count_by_result();
        if counts.is_empty() {
            return "no results".to_string();
        }
        counts
            .iter()
            .map(|(option, n)| format!("{n} {option}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Formats the failing results as a multi-line report.
    #[must_use]
    pub fn format_failure_report(&self) -> String {
        use std::fmt::Write;

        let failing: Vec<&CheckResult> =
            self.results.iter().filter(|r| r.result.is_failure()).collect();

        let mut report = String::new();
        let _ = writeln!(
            report,
            "\n=== confguard: {} failing check(s) ===\n",
            failing.len()
        );
        for r in &failing {
            let _ = writeln!(report, "{}", r.format());
        }
        let _ = writeln!(
            report,
            "\nTotal: {} on {} device(s), {} rule(s)",
            self.summary(),
            self.devices_checked,
            self.rules_checked
        );

        report
    }

    /// Adds results from another report.
    pub fn extend(&mut self, other: Self) {
        self.results.extend(other.results);
        self.devices_checked += other.devices_checked;
        self.rules_checked = self.rules_checked.max(other.rules_checked);
    }
}
