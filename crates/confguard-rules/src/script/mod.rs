//! Script rules, written in Rhai or Python.
//!
//! This page covers [`ScriptRule`], the Rhai flavor. [`PythonRule`] offers
//! the same contract to Python scripts.
//!
//! A script defines `fn check(device)` and returns one of
//! `rule::CONFORMING`, `rule::NONCONFORMING` or `rule::NOTAPPLICABLE`,
//! or a `#{ result, comment }` map built with the `conforming(comment)`,
//! `nonconforming(comment)` and `not_applicable(comment)` helpers. The
//! helpers may also be called without a comment.
//!
//! The `device` argument offers three methods:
//!
//! - `get(key)`, `get(key, id)` and `get(key, index)` read device items;
//!   the two-argument forms pick one element of a list item such as
//!   `interfaces` or `modules`. Missing values read as `()`.
//! - `nslookup(host)` returns `#{ name, address }`, empty on failure.
//! - `findSections(text, pattern)` returns `[#{ title, body }, ...]`.
//!
//! The script is compiled once. Each evaluation runs in its own engine, so
//! one rule may be evaluated on many devices concurrently.

mod device_api;
mod python;
mod sandbox;

pub use device_api::{HostRecord, HostResolver, ScriptDevice, SystemResolver};
pub use python::{PythonRule, DEFAULT_PYTHON_SCRIPT};

use crate::error::RuleError;
use confguard_core::{
    Device, DeviceData, EvaluationLog, Exemption, PolicyId, Prepared, ResultOption, Rule, RuleId,
    ScriptConfig, Verdict,
};
use rhai::{Dynamic, EvalAltResult, Map, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Template for new script rules.
pub const DEFAULT_SCRIPT: &str = r#"// Called once per device. Return rule::CONFORMING, rule::NONCONFORMING
// or rule::NOTAPPLICABLE, or use conforming(comment), nonconforming(comment)
// and not_applicable(comment) to attach an explanation.
fn check(device) {
    let config = device.get("runningConfig");
    if type_of(config) == "()" {
        return not_applicable("No running configuration");
    }
    debug("Checking " + device.get("name"));
    if config.contains("transport input telnet") {
        return nonconforming("Telnet is enabled");
    }
    rule::CONFORMING
}
"#;

const TIMEOUT_COMMENT: &str = "The rule took too long to execute";

/// A rule whose check is a Rhai script.
pub struct ScriptRule {
    id: RuleId,
    name: String,
    enabled: bool,
    policy: Option<PolicyId>,
    exemptions: Vec<Exemption>,
    script: String,
    limits: ScriptConfig,
    resolver: Arc<dyn HostResolver>,
    prepared: Prepared<AST>,
}

impl ScriptRule {
    /// Creates an enabled rule running `script` with default limits.
    #[must_use]
    pub fn new(id: RuleId, name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            policy: None,
            exemptions: Vec::new(),
            script: script.into(),
            limits: ScriptConfig::default(),
            resolver: Arc::new(SystemResolver),
            prepared: Prepared::new(),
        }
    }

    /// Creates a rule from [`DEFAULT_SCRIPT`].
    #[must_use]
    pub fn with_default_script(id: RuleId, name: impl Into<String>) -> Self {
        Self::new(id, name, DEFAULT_SCRIPT)
    }

    /// Sets the sandbox limits.
    #[must_use]
    pub fn limits(mut self, limits: ScriptConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the `nslookup` backend.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Enables or disables the rule.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds an exemption.
    #[must_use]
    pub fn exemption(mut self, exemption: Exemption) -> Self {
        self.exemptions.push(exemption);
        self
    }

    /// Returns the script source.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Replaces the script source.
    pub fn set_script(&mut self, script: impl Into<String>) {
        self.script = script.into();
        self.prepared.reset();
    }

    fn compile(&self) -> Result<AST, RuleError> {
        let engine = sandbox::engine(&self.limits);
        let user = engine
            .compile(&self.script)
            .map_err(|e| RuleError::ScriptParse(e.to_string()))?;
        let has_entry_point = user
            .iter_functions()
            .any(|f| f.name == "check" && f.params.len() == 1);
        if !has_entry_point {
            return Err(RuleError::MissingEntryPoint);
        }
        let preamble = engine
            .compile(sandbox::PREAMBLE)
            .map_err(|e| RuleError::ScriptParse(e.to_string()))?;
        Ok(preamble.merge(&user))
    }

    fn interpret(value: Dynamic, log: &EvaluationLog) -> Verdict {
        let type_name = value.type_name();
        let (result, comment) = if value.is_string() {
            (value.into_string().unwrap_or_default(), String::new())
        } else if let Some(map) = value.try_cast::<Map>() {
            let text = |key: &str| {
                map.get(key)
                    .filter(|v| !v.is_unit())
                    .map(ToString::to_string)
                    .unwrap_or_default()
            };
            (text("result"), text("comment"))
        } else {
            log.error(format!("The script returned a value of type '{type_name}'"));
            return Verdict::new(ResultOption::InvalidRule);
        };

        verdict(&result, comment, log)
    }
}

/// Maps a returned result name to a verdict. Anything but the three script
/// results is an invalid rule.
fn verdict(result: &str, comment: String, log: &EvaluationLog) -> Verdict {
    match ResultOption::parse(result).filter(|r| sandbox::SCRIPT_RESULTS.contains(r)) {
        Some(option) => Verdict::with_comment(option, comment),
        None => {
            log.error(format!("Invalid result value '{result}'"));
            Verdict::new(ResultOption::InvalidRule)
        }
    }
}

impl fmt::Debug for ScriptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Rule for ScriptRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "script"
    }

    fn policy(&self) -> Option<PolicyId> {
        self.policy
    }

    fn set_policy(&mut self, policy: Option<PolicyId>) {
        self.policy = policy;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn exemptions(&self) -> &[Exemption] {
        &self.exemptions
    }

    fn clear_exemptions(&mut self) {
        self.exemptions.clear();
    }

    fn prepare(&self, log: &EvaluationLog) -> bool {
        let prepared = self.prepared.get_or_prepare(|| {
            self.compile().map_err(|e| {
                warn!("Script rule {} is invalid: {e}", self.name);
                e.to_string()
            })
        });
        match prepared {
            Ok(_) => true,
            Err(reason) => {
                log.warn(reason);
                false
            }
        }
    }

    fn check(&self, device: &dyn Device, log: &EvaluationLog) -> Verdict {
        let Some(ast) = self.prepared.get() else {
            return Verdict::new(ResultOption::InvalidRule);
        };

        let engine = sandbox::engine_for_call(&self.limits, log);
        let resolver = self
            .limits
            .allow_nslookup
            .then(|| Arc::clone(&self.resolver));
        let handle = ScriptDevice::new(DeviceData::capture(device), resolver, log.clone());
        let mut scope = Scope::new();

        match engine.call_fn::<Dynamic>(&mut scope, ast, "check", (handle,)) {
            Ok(value) => Self::interpret(value, log),
            Err(err) => match err.as_ref() {
                EvalAltResult::ErrorTerminated(..) => {
                    log.error(TIMEOUT_COMMENT);
                    Verdict::with_comment(ResultOption::InvalidRule, TIMEOUT_COMMENT)
                }
                _ => {
                    log.error(format!("Error while evaluating the script: {err}"));
                    Verdict::with_comment(ResultOption::InvalidRule, "Script error.")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confguard_core::{evaluate_rule, CheckResult, DeviceId, DeviceRecord, Module, NetworkInterface};

    struct FixedResolver;

    impl HostResolver for FixedResolver {
        fn resolve(&self, host: &str) -> Option<HostRecord> {
            (host == "ntp.example.net").then(|| HostRecord {
                name: host.to_string(),
                address: "192.0.2.10".to_string(),
            })
        }
    }

    fn device() -> DeviceRecord {
        DeviceRecord::new(DeviceId(7), "edge1", "CiscoIOS12")
            .with_config(
                "runningConfig",
                "hostname edge1\ninterface Gi0/0\n description WAN\ninterface Gi0/1\n shutdown\n",
            )
            .with_interface(NetworkInterface {
                name: "Gi0/0".to_string(),
                description: "WAN".to_string(),
                ..NetworkInterface::default()
            })
            .with_interface(NetworkInterface {
                name: "Gi0/1".to_string(),
                ..NetworkInterface::default()
            })
            .with_module(Module {
                slot: "1".to_string(),
                part_number: "WS-X4748".to_string(),
                serial_number: "SN123".to_string(),
            })
    }

    fn run(script: &str) -> (CheckResult, EvaluationLog) {
        let rule = ScriptRule::new(RuleId(1), "script", script).resolver(Arc::new(FixedResolver));
        let log = EvaluationLog::new();
        (evaluate_rule(&rule, &device(), &log), log)
    }

    #[test]
    fn returns_verdict_constants() {
        let (result, _) = run("fn check(device) { rule::NONCONFORMING }");
        assert_eq!(result.result, ResultOption::Nonconforming);
        let (result, _) = run(r#"fn check(device) { "NOTAPPLICABLE" }"#);
        assert_eq!(result.result, ResultOption::NotApplicable);
    }

    #[test]
    fn helpers_attach_comments() {
        let (result, _) = run(r#"fn check(device) { nonconforming("Telnet is enabled") }"#);
        assert_eq!(result.result, ResultOption::Nonconforming);
        assert_eq!(result.comment, "Telnet is enabled");
    }

    #[test]
    fn helpers_without_comment() {
        let (result, _) = run("fn check(device) { conforming() }");
        assert_eq!(result.result, ResultOption::Conforming);
        assert_eq!(result.comment, "");
        let (result, _) = run("fn check(device) { nonconforming() }");
        assert_eq!(result.result, ResultOption::Nonconforming);
        let (result, _) = run("fn check(device) { not_applicable() }");
        assert_eq!(result.result, ResultOption::NotApplicable);
    }

    #[test]
    fn default_script_runs() {
        let rule = ScriptRule::with_default_script(RuleId(1), "default");
        let log = EvaluationLog::new();
        let result = evaluate_rule(&rule, &device(), &log);
        assert_eq!(result.result, ResultOption::Conforming);
        assert!(log.render().contains("edge1"));

        let bare = DeviceRecord::new(DeviceId(8), "bare", "CiscoIOS12");
        let result = evaluate_rule(&rule, &bare, &EvaluationLog::new());
        assert_eq!(result.result, ResultOption::NotApplicable);
    }

    #[test]
    fn reads_device_items() {
        let script = r#"
            fn check(device) {
                if device.get("name") != "edge1" { return nonconforming("name"); }
                if device.get("type") != "CiscoIOS12" { return nonconforming("type"); }
                if device.get("interfaces", "Gi0/0").description != "WAN" { return nonconforming("by id"); }
                if device.get("interfaces", 1).name != "Gi0/1" { return nonconforming("by index"); }
                if device.get("modules", "1").serialNumber != "SN123" { return nonconforming("module"); }
                if type_of(device.get("interfaces", "Gi9/9")) != "()" { return nonconforming("missing id"); }
                if type_of(device.get("interfaces", 5)) != "()" { return nonconforming("missing index"); }
                if type_of(device.get("nope")) != "()" { return nonconforming("missing key"); }
                rule::CONFORMING
            }
        "#;
        let (result, log) = run(script);
        assert_eq!(result.result, ResultOption::Conforming, "{} {}", result.comment, log.render());
    }

    #[test]
    fn finds_sections() {
        let script = r#"
            fn check(device) {
                let sections = device.findSections(device.get("runningConfig"), "interface .*");
                for section in sections {
                    if !section.body.contains("description") {
                        return nonconforming(section.title + " has no description");
                    }
                }
                rule::CONFORMING
            }
        "#;
        let (result, _) = run(script);
        assert_eq!(result.result, ResultOption::Nonconforming);
        assert_eq!(result.comment, "interface Gi0/1 has no description");
    }

    #[test]
    fn invalid_section_pattern_throws() {
        let (result, log) = run(r#"fn check(device) { device.findSections("x", "[bad"); rule::CONFORMING }"#);
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("Invalid pattern"));
    }

    #[test]
    fn nslookup_uses_the_resolver() {
        let script = r#"
            fn check(device) {
                let ok = device.nslookup("ntp.example.net");
                let ko = device.nslookup("unknown.example.net");
                if ok.address == "192.0.2.10" && ko.address == "" { rule::CONFORMING } else { rule::NONCONFORMING }
            }
        "#;
        let (result, _) = run(script);
        assert_eq!(result.result, ResultOption::Conforming);
    }

    #[test]
    fn nslookup_can_be_disabled() {
        let limits = ScriptConfig {
            allow_nslookup: false,
            ..ScriptConfig::default()
        };
        let rule = ScriptRule::new(
            RuleId(1),
            "lookup",
            r#"fn check(device) { if device.nslookup("ntp.example.net").address == "" { rule::CONFORMING } else { rule::NONCONFORMING } }"#,
        )
        .limits(limits)
        .resolver(Arc::new(FixedResolver));
        let log = EvaluationLog::new();
        assert_eq!(evaluate_rule(&rule, &device(), &log).result, ResultOption::Conforming);
        assert!(log.render().contains("disabled"));
    }

    #[test]
    fn structural_problems_are_invalid() {
        for script in [
            "fn check(device) { ",
            "fn verify(device) { rule::CONFORMING }",
            "fn check(device, extra) { rule::CONFORMING }",
        ] {
            let (result, log) = run(script);
            assert_eq!(result.result, ResultOption::InvalidRule, "{script}");
            assert!(!log.is_empty(), "{script}");
        }
    }

    #[test]
    fn invalid_script_warns_the_process_once() {
        let rule = ScriptRule::new(RuleId(1), "broken", "fn check(device) { ");
        let logs = [EvaluationLog::new(), EvaluationLog::new()];
        let warnings = crate::test_support::count_warnings(|| {
            for log in &logs {
                evaluate_rule(&rule, &device(), log);
            }
        });
        assert_eq!(warnings, 1);
        assert!(logs.iter().all(|log| !log.is_empty()));
    }

    #[test]
    fn top_level_errors_surface_at_evaluation() {
        let rule = ScriptRule::new(
            RuleId(1),
            "top",
            r#"throw "boom"; fn check(device) { rule::CONFORMING }"#,
        );
        assert!(rule.prepare(&EvaluationLog::new()));

        let log = EvaluationLog::new();
        let result = evaluate_rule(&rule, &device(), &log);
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("boom"));
    }

    #[test]
    fn thrown_errors_and_bad_values_are_invalid() {
        let (result, log) = run(r#"fn check(device) { throw "no way"; }"#);
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("no way"));

        let (result, log) = run(r#"fn check(device) { "MAYBE" }"#);
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("MAYBE"));

        let (result, _) = run(r#"fn check(device) { "DISABLED" }"#);
        assert_eq!(result.result, ResultOption::InvalidRule);

        let (result, _) = run("fn check(device) { 42 }");
        assert_eq!(result.result, ResultOption::InvalidRule);
    }

    #[test]
    fn runaway_scripts_time_out() {
        let limits = ScriptConfig {
            max_operations: 0,
            max_execution_time_ms: 50,
            ..ScriptConfig::default()
        };
        let rule = ScriptRule::new(RuleId(1), "spin", "fn check(device) { loop { } }").limits(limits);
        let result = evaluate_rule(&rule, &device(), &EvaluationLog::new());
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert_eq!(result.comment, "The rule took too long to execute");
    }

    #[test]
    fn evaluation_is_repeatable() {
        let rule = ScriptRule::new(
            RuleId(1),
            "repeat",
            r#"fn check(device) { if device.get("name") == "edge1" { rule::CONFORMING } else { rule::NONCONFORMING } }"#,
        );
        let first = evaluate_rule(&rule, &device(), &EvaluationLog::new());
        let second = evaluate_rule(&rule, &device(), &EvaluationLog::new());
        assert_eq!(first.result, second.result);
        assert_eq!(first.result, ResultOption::Conforming);
    }

    #[test]
    fn editing_recompiles() {
        let mut rule = ScriptRule::new(RuleId(1), "edit", "fn nothing() {}");
        assert_eq!(
            evaluate_rule(&rule, &device(), &EvaluationLog::new()).result,
            ResultOption::InvalidRule
        );
        rule.set_script("fn check(device) { rule::CONFORMING }");
        assert_eq!(
            evaluate_rule(&rule, &device(), &EvaluationLog::new()).result,
            ResultOption::Conforming
        );
    }
}
