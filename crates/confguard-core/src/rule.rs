//! Rule trait and the common evaluation skeleton.

use crate::device::Device;
use crate::logger::EvaluationLog;
use crate::types::{CheckResult, Exemption, PolicyId, ResultOption, RuleId};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Outcome of the variant-specific part of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Result option.
    pub result: ResultOption,
    /// Optional explanation.
    pub comment: String,
}

impl Verdict {
    /// Creates a verdict without comment.
    #[must_use]
    pub fn new(result: ResultOption) -> Self {
        Self {
            result,
            comment: String::new(),
        }
    }

    /// Creates a verdict with a comment.
    #[must_use]
    pub fn with_comment(result: ResultOption, comment: impl Into<String>) -> Self {
        Self {
            result,
            comment: comment.into(),
        }
    }
}

/// Whether a rule applies to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicability {
    /// The rule applies.
    Applicable,
    /// The rule does not apply, with the reason.
    NotApplicable(String),
}

/// A compliance rule.
///
/// Implementations provide their matching logic in [`Rule::check`]; the
/// shared precedence (disabled, invalid, exempted, not applicable) is applied
/// by [`evaluate_rule`]. Rules are shared between threads, so any state built
/// by [`Rule::prepare`] must be immutable once built.
///
/// # Example
///
/// ```ignore
/// use confguard_core::{Device, EvaluationLog, Rule, RuleId, Verdict, ResultOption};
///
/// struct HasHostname;
///
/// impl Rule for HasHostname {
///     fn id(&self) -> RuleId { RuleId(1) }
///     fn name(&self) -> &str { "has-hostname" }
///     fn kind(&self) -> &'static str { "custom" }
///
///     fn check(&self, device: &dyn Device, _log: &EvaluationLog) -> Verdict {
///         match device.item("hostname") {
///             Some(_) => Verdict::new(ResultOption::Conforming),
///             None => Verdict::new(ResultOption::Nonconforming),
///         }
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Returns the rule identifier.
    fn id(&self) -> RuleId;

    /// Returns the rule name.
    fn name(&self) -> &str;

    /// Returns the rule kind (e.g., "text", "script").
    fn kind(&self) -> &'static str;

    /// Returns the owning policy, if any.
    fn policy(&self) -> Option<PolicyId> {
        None
    }

    /// Re-parents the rule. Called by [`Policy::add_rule`].
    fn set_policy(&mut self, _policy: Option<PolicyId>) {}

    /// Whether the rule is enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns the rule-side exemptions.
    fn exemptions(&self) -> &[Exemption] {
        &[]
    }

    /// Drops the rule-side exemptions. Called by [`Policy::remove_rule`].
    fn clear_exemptions(&mut self) {}

    /// Prepares the rule, returning false if it cannot be evaluated.
    ///
    /// Implementations memoize the outcome (see [`Prepared`]).
    fn prepare(&self, _log: &EvaluationLog) -> bool {
        true
    }

    /// Checks whether the rule applies to the device.
    fn applicability(&self, _device: &dyn Device) -> Applicability {
        Applicability::Applicable
    }

    /// Result reported when [`Rule::check`] panics.
    fn failure_result(&self) -> ResultOption {
        ResultOption::InvalidRule
    }

    /// Runs the matching logic. Only called on enabled, prepared, applicable
    /// rules for devices that are not exempted.
    fn check(&self, device: &dyn Device, log: &EvaluationLog) -> Verdict;
}

/// Type alias for boxed Rule trait objects.
pub type RuleBox = Box<dyn Rule>;

/// Write-once cell holding the prepared state of a rule.
///
/// The first call to [`Prepared::get_or_prepare`] runs the preparation;
/// later calls, from any thread, see the same outcome.
#[derive(Debug)]
pub struct Prepared<T> {
    cell: OnceCell<Result<T, String>>,
}

impl<T> Default for Prepared<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> Prepared<T> {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prepared state, running `prepare` on first use.
    ///
    /// # Errors
    ///
    /// Returns the preparation error message, memoized as well.
    pub fn get_or_prepare<F>(&self, prepare: F) -> Result<&T, &str>
    where
        F: FnOnce() -> Result<T, String>,
    {
        self.cell.get_or_init(prepare).as_ref().map_err(String::as_str)
    }

    /// Returns the prepared state if preparation already succeeded.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get().and_then(|r| r.as_ref().ok())
    }

    /// Discards the prepared state after an edit.
    pub fn reset(&mut self) {
        self.cell = OnceCell::new();
    }
}

/// Evaluates a rule against a device now.
#[must_use]
pub fn evaluate_rule(rule: &dyn Rule, device: &dyn Device, log: &EvaluationLog) -> CheckResult {
    evaluate_rule_at(rule, device, log, Utc::now())
}

/// Evaluates a rule against a device at a given instant.
///
/// Precedence, first match wins: disabled, invalid, exempted, not
/// applicable, then the rule's own check. A panic inside the check is
/// reported as the rule's failure result.
#[must_use]
pub fn evaluate_rule_at(
    rule: &dyn Rule,
    device: &dyn Device,
    log: &EvaluationLog,
    now: DateTime<Utc>,
) -> CheckResult {
    let result = |option: ResultOption| {
        CheckResult::new(rule.id(), rule.name(), device.id(), device.name(), option, now)
    };

    if !rule.is_enabled() {
        debug!("Skipping disabled rule: {}", rule.name());
        return result(ResultOption::Disabled);
    }

    if !rule.prepare(log) {
        return result(ResultOption::InvalidRule);
    }

    let exempted = device.is_exempted(rule.id(), now)
        || rule
            .exemptions()
            .iter()
            .any(|e| e.device == device.id() && e.is_active(now));
    if exempted {
        log.debug(format!("Device {} is exempted from this rule.", device.name()));
        return result(ResultOption::Exempted);
    }

    if let Applicability::NotApplicable(reason) = rule.applicability(device) {
        return result(ResultOption::NotApplicable).with_comment(reason);
    }

    match catch_unwind(AssertUnwindSafe(|| rule.check(device, log))) {
        Ok(verdict) => result(verdict.result).with_comment(verdict.comment),
        Err(payload) => {
            let cause = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            warn!("Rule {} panicked on {}: {cause}", rule.name(), device.name());
            log.error(format!("Unexpected error while checking the rule: {cause}"));
            result(rule.failure_result()).with_comment("Evaluation error.")
        }
    }
}

/// A named set of rules applied to groups of devices.
pub struct Policy {
    /// Policy identifier.
    pub id: PolicyId,
    /// Policy name.
    pub name: String,
    /// Target device groups. Empty means every device.
    pub groups: Vec<String>,
    rules: Vec<RuleBox>,
}

impl Policy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new(id: PolicyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            groups: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Adds a target group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Adds a rule, re-parenting it to this policy.
    pub fn add_rule(&mut self, mut rule: RuleBox) {
        rule.set_policy(Some(self.id));
        self.rules.push(rule);
    }

    /// Removes a rule, along with its exemptions.
    pub fn remove_rule(&mut self, id: RuleId) -> Option<RuleBox> {
        let index = self.rules.iter().position(|r| r.id() == id)?;
        let mut rule = self.rules.remove(index);
        rule.set_policy(None);
        rule.clear_exemptions();
        Some(rule)
    }

    /// Returns the rules of the policy.
    #[must_use]
    pub fn rules(&self) -> &[RuleBox] {
        &self.rules
    }

    /// Looks a rule up by identifier.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&dyn Rule> {
        self.rules.iter().find(|r| r.id() == id).map(AsRef::as_ref)
    }

    /// Whether the policy targets the device.
    #[must_use]
    pub fn applies_to(&self, device: &dyn Device) -> bool {
        self.groups.is_empty() || device.groups().iter().any(|g| self.groups.contains(g))
    }
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policy")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
