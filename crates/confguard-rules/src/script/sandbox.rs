//! Interpreter construction.

use super::device_api;
use confguard_core::{EvaluationLog, ResultOption, ScriptConfig};
use once_cell::sync::Lazy;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::packages::{Package, StandardPackage};
use rhai::{Dynamic, Engine, Module};
use std::time::Instant;

/// Helpers compiled ahead of every script.
pub(crate) const PREAMBLE: &str = r#"
fn conforming(comment) { #{ result: rule::CONFORMING, comment: comment } }
fn nonconforming(comment) { #{ result: rule::NONCONFORMING, comment: comment } }
fn not_applicable(comment) { #{ result: rule::NOTAPPLICABLE, comment: comment } }
fn conforming() { conforming("") }
fn nonconforming() { nonconforming("") }
fn not_applicable() { not_applicable("") }
"#;

/// Verdicts a script may return.
pub(crate) const SCRIPT_RESULTS: [ResultOption; 3] = [
    ResultOption::Conforming,
    ResultOption::Nonconforming,
    ResultOption::NotApplicable,
];

static STANDARD: Lazy<StandardPackage> = Lazy::new(StandardPackage::new);

/// Builds a sandboxed engine: standard library only, no module imports,
/// no `eval`, bounded by `limits`.
pub(crate) fn engine(limits: &ScriptConfig) -> Engine {
    let mut engine = Engine::new_raw();
    STANDARD.register_into_engine(&mut engine);
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");
    engine
        .set_max_operations(limits.max_operations)
        .set_max_call_levels(limits.max_call_levels)
        .set_max_string_size(limits.max_string_size)
        .set_max_array_size(limits.max_array_size)
        .set_max_map_size(limits.max_map_size);

    let mut verdicts = Module::new();
    for option in SCRIPT_RESULTS {
        verdicts.set_var(option.as_str(), option.as_str().to_string());
    }
    engine.register_static_module("rule", verdicts.into());

    device_api::register(&mut engine);
    engine
}

/// Builds the engine for one evaluation, wired to its log and deadline.
pub(crate) fn engine_for_call(limits: &ScriptConfig, log: &EvaluationLog) -> Engine {
    let mut engine = engine(limits);

    let deadline = Instant::now() + limits.execution_time();
    engine.on_progress(move |_| (Instant::now() >= deadline).then_some(Dynamic::UNIT));

    let print_log = log.clone();
    engine.on_print(move |text| print_log.info(text));
    let debug_log = log.clone();
    engine.on_debug(move |text, _source, position| {
        if position.is_none() {
            debug_log.debug(text);
        } else {
            debug_log.debug(format!("{text} ({position})"));
        }
    });

    engine
}
