//! Script rules written in Python.
//!
//! The contract matches the Rhai flavor: the script defines `check(device)`
//! and returns `CONFORMING`, `NONCONFORMING` or `NOTAPPLICABLE` (also
//! reachable as `result_option.CONFORMING` and so on), or a
//! `{"result": ..., "comment": ...}` dict built with `conforming()`,
//! `nonconforming()` and `not_applicable()`. `device.get(key, id=None)`,
//! `device.nslookup(host)` and `device.findSections(text, pattern)` behave
//! like their Rhai counterparts, returning `None` for missing values.
//!
//! Every load and every evaluation starts a fresh interpreter, without the
//! standard library, on a worker thread. Imports, file access and dynamic
//! code evaluation are removed from the builtins. A worker that overruns
//! the time budget is abandoned and the rule reports a timeout.

use super::device_api::{self, HostResolver, SystemResolver};
use super::{verdict, TIMEOUT_COMMENT};
use crate::error::RuleError;
use confguard_core::{
    AttributeValue, Device, DeviceData, DeviceId, EvaluationLog, Exemption, PolicyId, Prepared,
    ResultOption, Rule, RuleId, ScriptConfig, Verdict,
};
use rustpython_vm::builtins::PyBaseExceptionRef;
use rustpython_vm::compiler::Mode;
use rustpython_vm::scope::Scope;
use rustpython_vm::{Interpreter, PyObjectRef, PyResult, VirtualMachine};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Template for new Python rules.
pub const DEFAULT_PYTHON_SCRIPT: &str = r#"# Called once per device. Return result_option.CONFORMING,
# result_option.NONCONFORMING or result_option.NOTAPPLICABLE, or use
# conforming(comment), nonconforming(comment) and not_applicable(comment)
# to attach an explanation.
def check(device):
    config = device.get("runningConfig")
    if config is None:
        return not_applicable("No running configuration")
    debug("Checking " + device.get("name"))
    if "transport input telnet" in config:
        return nonconforming("Telnet is enabled")
    return result_option.CONFORMING
"#;

/// Runs ahead of every script, in the same globals.
const PREAMBLE: &str = r#"
CONFORMING = "CONFORMING"
NONCONFORMING = "NONCONFORMING"
NOTAPPLICABLE = "NOTAPPLICABLE"


class _ResultOption:
    CONFORMING = CONFORMING
    NONCONFORMING = NONCONFORMING
    NOTAPPLICABLE = NOTAPPLICABLE


result_option = _ResultOption()


def conforming(comment=""):
    return {"result": CONFORMING, "comment": comment}


def nonconforming(comment=""):
    return {"result": NONCONFORMING, "comment": comment}


def not_applicable(comment=""):
    return {"result": NOTAPPLICABLE, "comment": comment}


def print(*values, sep=" ", end="\n"):
    _log_info(sep.join(str(value) for value in values))


def debug(message):
    _log_debug(str(message))


class _Device:
    def get(self, key, id=None):
        if id is None:
            return _get(key)
        if isinstance(id, int) and not isinstance(id, bool):
            return _get_at(key, id)
        return _get_by_id(key, str(id))

    def nslookup(self, host):
        return _nslookup(str(host))

    def findSections(self, text, pattern):
        return _find_sections(str(text), str(pattern))


def _entry_point_arity():
    code = getattr(globals().get("check"), "__code__", None)
    return getattr(code, "co_argcount", -1)


def _describe(error):
    return type(error).__name__ + ": " + str(error)


def _call_check():
    try:
        value = check(_Device())
    except Exception as error:
        return ["error", "", _describe(error)]
    if isinstance(value, str):
        return ["ok", value, ""]
    if isinstance(value, dict):
        result = value.get("result")
        comment = value.get("comment")
        return [
            "ok",
            "" if result is None else str(result),
            "" if comment is None else str(comment),
        ]
    return ["type", type(value).__name__, ""]


import sys as _sys
import builtins as _builtins

_sys.setrecursionlimit(_recursion_limit)
for _name in list(_sys.modules):
    if _name not in ("sys", "builtins"):
        del _sys.modules[_name]
for _name in ("__import__", "open", "exec", "eval", "compile", "input", "breakpoint", "exit", "quit", "help"):
    if hasattr(_builtins, _name):
        delattr(_builtins, _name)
del _sys, _builtins, _name
"#;

const RULE_FILE: &str = "<rule>";

/// Frames used by the helpers around `check`.
const HELPER_FRAMES: usize = 8;

const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// A rule whose check is a Python script.
pub struct PythonRule {
    id: RuleId,
    name: String,
    enabled: bool,
    policy: Option<PolicyId>,
    exemptions: Vec<Exemption>,
    script: Arc<str>,
    limits: ScriptConfig,
    resolver: Arc<dyn HostResolver>,
    prepared: Prepared<()>,
}

impl PythonRule {
    /// Creates an enabled rule running `script` with default limits.
    #[must_use]
    pub fn new(id: RuleId, name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            policy: None,
            exemptions: Vec::new(),
            script: Arc::from(script.into()),
            limits: ScriptConfig::default(),
            resolver: Arc::new(SystemResolver),
            prepared: Prepared::new(),
        }
    }

    /// Creates a rule from [`DEFAULT_PYTHON_SCRIPT`].
    #[must_use]
    pub fn with_default_script(id: RuleId, name: impl Into<String>) -> Self {
        Self::new(id, name, DEFAULT_PYTHON_SCRIPT)
    }

    /// Sets the time budget and call depth. The other limits only apply to Rhai.
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
        self.script = Arc::from(script.into());
        self.prepared.reset();
    }

    fn environment(&self, data: DeviceData, log: EvaluationLog) -> Environment {
        Environment {
            data: Arc::new(data),
            resolver: self
                .limits
                .allow_nslookup
                .then(|| Arc::clone(&self.resolver)),
            log,
            recursion_limit: self.limits.max_call_levels + HELPER_FRAMES,
        }
    }

    /// Compiles the script, runs its top level and looks for `check(device)`.
    ///
    /// A top level that raises still counts as loaded: the error is reported
    /// by every evaluation.
    fn load(&self) -> Result<(), RuleError> {
        let source = Arc::clone(&self.script);
        let env = self.environment(empty_device(), EvaluationLog::new());
        let loaded = isolated(&self.limits, move || {
            Interpreter::without_stdlib(Default::default()).enter(|vm| {
                let scope = start(vm, &env)
                    .map_err(|e| RuleError::Interpreter(describe(vm, None, &e)))?;
                let code = vm
                    .compile(&source, Mode::Exec, RULE_FILE.to_owned())
                    .map_err(|e| RuleError::ScriptParse(e.to_string()))?;
                if vm.run_code_obj(code, scope.clone()).is_err() {
                    return Ok(());
                }
                let arity = call(vm, &scope, "_entry_point_arity", Vec::new())
                    .and_then(|value| value.try_into_value::<i64>(vm))
                    .map_err(|e| RuleError::Interpreter(describe(vm, Some(&scope), &e)))?;
                if arity == 1 {
                    Ok(())
                } else {
                    Err(RuleError::MissingEntryPoint)
                }
            })
        });
        match loaded {
            Ok(result) => result,
            Err(Interrupted::TimedOut) => Err(RuleError::Timeout),
            Err(Interrupted::Crashed(reason)) => Err(RuleError::Interpreter(reason)),
        }
    }
}

impl fmt::Debug for PythonRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Rule for PythonRule {
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
            self.load().map_err(|e| {
                warn!("Python rule {} is invalid: {e}", self.name);
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
        if self.prepared.get().is_none() {
            return Verdict::new(ResultOption::InvalidRule);
        }

        let source = Arc::clone(&self.script);
        let env = self.environment(DeviceData::capture(device), log.clone());
        let outcome = isolated(&self.limits, move || {
            Interpreter::without_stdlib(Default::default()).enter(|vm| run_check(vm, &source, &env))
        });

        match outcome {
            Ok(Outcome::Returned { result, comment }) => verdict(&result, comment, log),
            Ok(Outcome::WrongType(type_name)) => {
                log.error(format!("The script returned a value of type '{type_name}'"));
                Verdict::new(ResultOption::InvalidRule)
            }
            Ok(Outcome::Raised(message)) => {
                log.error(format!("Error while evaluating the script: {message}"));
                Verdict::with_comment(ResultOption::InvalidRule, "Script error.")
            }
            Err(Interrupted::TimedOut) => {
                warn!("Python rule {} overran its budget, abandoning the worker", self.name);
                log.error(TIMEOUT_COMMENT);
                Verdict::with_comment(ResultOption::InvalidRule, TIMEOUT_COMMENT)
            }
            Err(Interrupted::Crashed(reason)) => {
                log.error(format!("Error while evaluating the script: {reason}"));
                Verdict::with_comment(ResultOption::InvalidRule, "Script error.")
            }
        }
    }
}

/// What one interpreter run hands back.
#[derive(Debug)]
enum Outcome {
    Returned { result: String, comment: String },
    WrongType(String),
    Raised(String),
}

#[derive(Debug)]
enum Interrupted {
    TimedOut,
    Crashed(String),
}

/// Owned inputs of one interpreter run.
struct Environment {
    data: Arc<DeviceData>,
    resolver: Option<Arc<dyn HostResolver>>,
    log: EvaluationLog,
    recursion_limit: usize,
}

/// Runs `job` on a worker thread and waits at most the time budget.
fn isolated<T, F>(limits: &ScriptConfig, job: F) -> Result<T, Interrupted>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("confguard-python".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            // The receiver is gone when the budget ran out.
            sender.send(job()).ok();
        })
        .map_err(|e| Interrupted::Crashed(format!("Unable to start the interpreter: {e}")))?;

    match receiver.recv_timeout(limits.execution_time()) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => Err(Interrupted::TimedOut),
        Err(RecvTimeoutError::Disconnected) => Err(Interrupted::Crashed(
            "The interpreter stopped unexpectedly".to_string(),
        )),
    }
}

fn run_check(vm: &VirtualMachine, source: &str, env: &Environment) -> Outcome {
    let scope = match start(vm, env) {
        Ok(scope) => scope,
        Err(e) => return Outcome::Raised(describe(vm, None, &e)),
    };
    let code = match vm.compile(source, Mode::Exec, RULE_FILE.to_owned()) {
        Ok(code) => code,
        Err(e) => return Outcome::Raised(e.to_string()),
    };
    if let Err(e) = vm.run_code_obj(code, scope.clone()) {
        return Outcome::Raised(describe(vm, Some(&scope), &e));
    }

    let parts = call(vm, &scope, "_call_check", Vec::new())
        .and_then(|value| value.try_into_value::<Vec<String>>(vm));
    match parts {
        Ok(parts) => match <[String; 3]>::try_from(parts) {
            Ok([kind, result, comment]) if kind == "ok" => Outcome::Returned { result, comment },
            Ok([kind, type_name, _]) if kind == "type" => Outcome::WrongType(type_name),
            Ok([_, _, message]) => Outcome::Raised(message),
            Err(_) => Outcome::Raised("Unexpected helper result".to_string()),
        },
        Err(e) => Outcome::Raised(describe(vm, Some(&scope), &e)),
    }
}

/// Creates the globals: native bridges first, then the preamble.
fn start(vm: &VirtualMachine, env: &Environment) -> PyResult<Scope> {
    let scope = vm.new_scope_with_builtins();
    let globals = &scope.globals;

    let data = Arc::clone(&env.data);
    let get = vm.new_function("_get", move |key: String, vm: &VirtualMachine| -> PyResult {
        data.item(&key).map_or_else(|| Ok(vm.ctx.none()), |value| to_python(value, vm))
    });
    globals.set_item("_get", get.into(), vm)?;

    let data = Arc::clone(&env.data);
    let get_at = vm.new_function(
        "_get_at",
        move |key: String, index: i64, vm: &VirtualMachine| -> PyResult {
            device_api::element_at(&data, &key, index)
                .map_or_else(|| Ok(vm.ctx.none()), |value| to_python(value, vm))
        },
    );
    globals.set_item("_get_at", get_at.into(), vm)?;

    let data = Arc::clone(&env.data);
    let get_by_id = vm.new_function(
        "_get_by_id",
        move |key: String, id: String, vm: &VirtualMachine| -> PyResult {
            device_api::element_by_id(&data, &key, &id)
                .map_or_else(|| Ok(vm.ctx.none()), |value| to_python(value, vm))
        },
    );
    globals.set_item("_get_by_id", get_by_id.into(), vm)?;

    let resolver = env.resolver.clone();
    let log = env.log.clone();
    let nslookup = vm.new_function(
        "_nslookup",
        move |host: String, vm: &VirtualMachine| -> PyResult {
            let record = device_api::lookup_host(resolver.as_deref(), &host, &log);
            let dict = vm.ctx.new_dict();
            dict.set_item("name", vm.ctx.new_str(record.name.as_str()).into(), vm)?;
            dict.set_item("address", vm.ctx.new_str(record.address.as_str()).into(), vm)?;
            Ok(dict.into())
        },
    );
    globals.set_item("_nslookup", nslookup.into(), vm)?;

    let find_sections = vm.new_function(
        "_find_sections",
        |text: String, pattern: String, vm: &VirtualMachine| -> PyResult {
            let sections =
                device_api::sections(&text, &pattern).map_err(|e| vm.new_value_error(e))?;
            let mut items = Vec::with_capacity(sections.len());
            for section in sections {
                let dict = vm.ctx.new_dict();
                dict.set_item("title", vm.ctx.new_str(section.title.as_str()).into(), vm)?;
                dict.set_item("body", vm.ctx.new_str(section.body.as_str()).into(), vm)?;
                items.push(dict.into());
            }
            Ok(vm.ctx.new_list(items).into())
        },
    );
    globals.set_item("_find_sections", find_sections.into(), vm)?;

    let log = env.log.clone();
    let log_info = vm.new_function("_log_info", move |text: String, vm: &VirtualMachine| {
        log.info(text);
        vm.ctx.none()
    });
    globals.set_item("_log_info", log_info.into(), vm)?;

    let log = env.log.clone();
    let log_debug = vm.new_function("_log_debug", move |text: String, vm: &VirtualMachine| {
        log.debug(text);
        vm.ctx.none()
    });
    globals.set_item("_log_debug", log_debug.into(), vm)?;

    globals.set_item("_recursion_limit", vm.ctx.new_int(env.recursion_limit).into(), vm)?;

    let preamble = vm
        .compile(PREAMBLE, Mode::Exec, "<preamble>".to_owned())
        .map_err(|e| vm.new_runtime_error(e.to_string()))?;
    vm.run_code_obj(preamble, scope.clone())?;
    Ok(scope)
}

fn call(vm: &VirtualMachine, scope: &Scope, name: &str, args: Vec<PyObjectRef>) -> PyResult {
    scope.globals.get_item(name, vm)?.call(args, vm)
}

/// `Type: message` for a raised exception.
fn describe(vm: &VirtualMachine, scope: Option<&Scope>, error: &PyBaseExceptionRef) -> String {
    scope
        .and_then(|scope| {
            call(vm, scope, "_describe", vec![error.clone().into()])
                .and_then(|text| text.try_into_value::<String>(vm))
                .ok()
        })
        .unwrap_or_else(|| "Python error".to_string())
}

fn to_python(value: &AttributeValue, vm: &VirtualMachine) -> PyResult {
    Ok(match value {
        AttributeValue::Flag(flag) => vm.ctx.new_bool(*flag).into(),
        AttributeValue::Integer(number) => vm.ctx.new_int(*number).into(),
        AttributeValue::Float(number) => vm.ctx.new_float(*number).into(),
        AttributeValue::Text(text) => vm.ctx.new_str(text.as_str()).into(),
        AttributeValue::List(items) => {
            let items = items
                .iter()
                .map(|item| to_python(item, vm))
                .collect::<PyResult<Vec<_>>>()?;
            vm.ctx.new_list(items).into()
        }
        AttributeValue::Map(entries) => {
            let dict = vm.ctx.new_dict();
            for (key, value) in entries {
                dict.set_item(key.as_str(), to_python(value, vm)?, vm)?;
            }
            dict.into()
        }
    })
}

fn empty_device() -> DeviceData {
    DeviceData {
        id: DeviceId(0),
        name: String::new(),
        driver: String::new(),
        items: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::HostRecord;
    use confguard_core::{evaluate_rule, CheckResult, DeviceRecord, Module, NetworkInterface};

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
        let rule = PythonRule::new(RuleId(1), "python", script).resolver(Arc::new(FixedResolver));
        let log = EvaluationLog::new();
        (evaluate_rule(&rule, &device(), &log), log)
    }

    #[test]
    fn returns_verdict_constants() {
        let (result, _) = run("def check(device):\n    return NONCONFORMING\n");
        assert_eq!(result.result, ResultOption::Nonconforming);
        let (result, _) = run("def check(device):\n    return result_option.NOTAPPLICABLE\n");
        assert_eq!(result.result, ResultOption::NotApplicable);
        let (result, _) = run("def check(device):\n    return \"CONFORMING\"\n");
        assert_eq!(result.result, ResultOption::Conforming);
    }

    #[test]
    fn helpers_attach_comments() {
        let (result, _) = run("def check(device):\n    return nonconforming(\"Telnet is enabled\")\n");
        assert_eq!(result.result, ResultOption::Nonconforming);
        assert_eq!(result.comment, "Telnet is enabled");

        let (result, _) = run("def check(device):\n    return conforming()\n");
        assert_eq!(result.result, ResultOption::Conforming);
        assert_eq!(result.comment, "");
    }

    #[test]
    fn default_script_runs() {
        let rule = PythonRule::with_default_script(RuleId(1), "default");
        let log = EvaluationLog::new();
        let result = evaluate_rule(&rule, &device(), &log);
        assert_eq!(result.result, ResultOption::Conforming, "{}", log.render());
        assert!(log.render().contains("Checking edge1"));

        let bare = DeviceRecord::new(DeviceId(8), "bare", "CiscoIOS12");
        let result = evaluate_rule(&rule, &bare, &EvaluationLog::new());
        assert_eq!(result.result, ResultOption::NotApplicable);
    }

    #[test]
    fn reads_device_items() {
        let script = r#"
def check(device):
    if device.get("name") != "edge1":
        return nonconforming("name")
    if device.get("interfaces", "Gi0/0")["description"] != "WAN":
        return nonconforming("by id")
    if device.get("interfaces", 1)["name"] != "Gi0/1":
        return nonconforming("by index")
    if device.get("modules", "1")["serialNumber"] != "SN123":
        return nonconforming("module")
    if device.get("interfaces", "Gi9/9") is not None:
        return nonconforming("missing id")
    if device.get("interfaces", 5) is not None:
        return nonconforming("missing index")
    if device.get("nope") is not None:
        return nonconforming("missing key")
    print("all", "good")
    return CONFORMING
"#;
        let (result, log) = run(script);
        assert_eq!(result.result, ResultOption::Conforming, "{} {}", result.comment, log.render());
        assert!(log.render().contains("[INFO] all good"), "{}", log.render());
    }

    #[test]
    fn finds_sections() {
        let script = r#"
def check(device):
    for section in device.findSections(device.get("runningConfig"), "interface .*"):
        if "description" not in section["body"]:
            return nonconforming(section["title"] + " has no description")
    return CONFORMING
"#;
        let (result, _) = run(script);
        assert_eq!(result.result, ResultOption::Nonconforming);
        assert_eq!(result.comment, "interface Gi0/1 has no description");

        let (result, log) = run("def check(device):\n    device.findSections(\"x\", \"[bad\")\n    return CONFORMING\n");
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("Invalid pattern"));
    }

    #[test]
    fn nslookup_uses_the_resolver() {
        let script = r#"
def check(device):
    ok = device.nslookup("ntp.example.net")
    ko = device.nslookup("unknown.example.net")
    if ok["address"] == "192.0.2.10" and ko["address"] == "":
        return CONFORMING
    return NONCONFORMING
"#;
        let (result, _) = run(script);
        assert_eq!(result.result, ResultOption::Conforming);
    }

    #[test]
    fn sandbox_blocks_imports_and_files() {
        for body in ["import os", "open(\"/etc/hostname\")", "eval(\"1 + 1\")"] {
            let script = format!("def check(device):\n    {body}\n    return CONFORMING\n");
            let (result, log) = run(&script);
            assert_eq!(result.result, ResultOption::InvalidRule, "{body}");
            assert!(log.render().contains("Error"), "{body}: {}", log.render());
        }
    }

    #[test]
    fn structural_problems_are_invalid() {
        for script in [
            "def check(device)\n    return CONFORMING\n",
            "def verify(device):\n    return CONFORMING\n",
            "def check(device, extra):\n    return CONFORMING\n",
            "check = 5\n",
        ] {
            let rule = PythonRule::new(RuleId(1), "broken", script);
            let log = EvaluationLog::new();
            assert!(!rule.prepare(&log), "{script}");
            assert_eq!(
                evaluate_rule(&rule, &device(), &log).result,
                ResultOption::InvalidRule,
                "{script}"
            );
            assert!(!log.is_empty(), "{script}");
        }
    }

    #[test]
    fn top_level_errors_surface_at_evaluation() {
        let rule = PythonRule::new(
            RuleId(1),
            "top",
            "raise ValueError(\"boom\")\n\ndef check(device):\n    return CONFORMING\n",
        );
        assert!(rule.prepare(&EvaluationLog::new()));

        let log = EvaluationLog::new();
        let result = evaluate_rule(&rule, &device(), &log);
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert_eq!(result.comment, "Script error.");
        assert!(log.render().contains("ValueError: boom"), "{}", log.render());
    }

    #[test]
    fn raised_errors_and_bad_values_are_invalid() {
        let (result, log) = run("def check(device):\n    raise RuntimeError(\"no way\")\n");
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("no way"));

        let (result, log) = run("def check(device):\n    return \"MAYBE\"\n");
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("MAYBE"));

        let (result, log) = run("def check(device):\n    return 42\n");
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert!(log.render().contains("'int'"), "{}", log.render());
    }

    #[test]
    fn runaway_scripts_time_out() {
        let limits = ScriptConfig {
            max_execution_time_ms: 1_000,
            ..ScriptConfig::default()
        };
        let rule = PythonRule::new(
            RuleId(1),
            "spin",
            "def check(device):\n    while True:\n        pass\n",
        )
        .limits(limits);
        let result = evaluate_rule(&rule, &device(), &EvaluationLog::new());
        assert_eq!(result.result, ResultOption::InvalidRule);
        assert_eq!(result.comment, "The rule took too long to execute");
    }

    #[test]
    fn editing_reloads() {
        let mut rule = PythonRule::new(RuleId(1), "edit", "def nothing():\n    pass\n");
        assert_eq!(
            evaluate_rule(&rule, &device(), &EvaluationLog::new()).result,
            ResultOption::InvalidRule
        );
        rule.set_script("def check(device):\n    return CONFORMING\n");
        assert_eq!(
            evaluate_rule(&rule, &device(), &EvaluationLog::new()).result,
            ResultOption::Conforming
        );
    }
}
