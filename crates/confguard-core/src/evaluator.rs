//! Batch evaluation of policies against devices.

use crate::config::Config;
use crate::device::{Device, DeviceRecord};
use crate::logger::EvaluationLog;
use crate::rule::{evaluate_rule_at, Policy, Rule};
use crate::types::{CheckResult, CheckResultStore, ComplianceReport, ResultOption};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during batch evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The worker pool could not be created.
    #[error("Failed to start evaluation workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Builder for configuring an [`Evaluator`].
#[derive(Default)]
pub struct EvaluatorBuilder {
    policies: Vec<Policy>,
    devices: Vec<DeviceRecord>,
    config: Option<Config>,
    rule_filter: Option<HashSet<String>>,
    parallelism: Option<usize>,
    now: Option<DateTime<Utc>>,
}

impl EvaluatorBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a policy.
    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Adds multiple policies.
    #[must_use]
    pub fn policies<I: IntoIterator<Item = Policy>>(mut self, policies: I) -> Self {
        self.policies.extend(policies);
        self
    }

    /// Adds a device.
    #[must_use]
    pub fn device(mut self, device: DeviceRecord) -> Self {
        self.devices.push(device);
        self
    }

    /// Adds multiple devices.
    #[must_use]
    pub fn devices<I: IntoIterator<Item = DeviceRecord>>(mut self, devices: I) -> Self {
        self.devices.extend(devices);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Restricts evaluation to the named rules.
    #[must_use]
    pub fn only_rules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the number of worker threads. `1` evaluates sequentially.
    #[must_use]
    pub fn parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    /// Evaluates as of a fixed instant instead of the current time.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Builds the evaluator.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created.
    pub fn build(self) -> Result<Evaluator, EvaluatorError> {
        let config = self.config.unwrap_or_default();
        let threads = self
            .parallelism
            .or(config.evaluator.parallelism)
            .unwrap_or(0);

        let pool = if threads == 1 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("confguard-eval-{i}"))
                    .build()?,
            )
        };

        Ok(Evaluator {
            policies: self.policies,
            devices: self.devices,
            config,
            rule_filter: self.rule_filter,
            pool,
            now: self.now,
        })
    }
}

/// Runs every applicable (rule, device) pair of a set of policies.
///
/// Use [`Evaluator::builder()`] to construct an instance.
pub struct Evaluator {
    policies: Vec<Policy>,
    devices: Vec<DeviceRecord>,
    config: Config,
    rule_filter: Option<HashSet<String>>,
    pool: Option<rayon::ThreadPool>,
    now: Option<DateTime<Utc>>,
}

impl Evaluator {
    /// Creates a new builder for configuring an evaluator.
    #[must_use]
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Returns the number of rules across policies.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|p| p.rules().len()).sum()
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn is_selected(&self, rule: &dyn Rule) -> bool {
        if !self.config.is_rule_enabled(rule.name()) {
            debug!("Skipping rule disabled by configuration: {}", rule.name());
            return false;
        }
        self.rule_filter
            .as_ref()
            .map_or(true, |names| names.contains(rule.name()))
    }

    /// Evaluates all policies and returns the report.
    ///
    /// Results are ordered by device name, then rule name.
    #[must_use]
    pub fn evaluate(&self) -> ComplianceReport {
        let now = self.now.unwrap_or_else(Utc::now);
        info!(
            "Starting evaluation of {} rule(s) on {} device(s)",
            self.rule_count(),
            self.devices.len()
        );

        let pairs: Vec<(&dyn Rule, &DeviceRecord)> = self
            .policies
            .iter()
            .flat_map(|policy| {
                self.devices
                    .iter()
                    .filter(move |device| policy.applies_to(*device))
                    .flat_map(move |device| {
                        policy.rules().iter().map(move |rule| (&**rule, device))
                    })
            })
            .filter(|(rule, _)| self.is_selected(*rule))
            .collect();

        let check = |(rule, device): (&dyn Rule, &DeviceRecord)| -> CheckResult {
            let log = EvaluationLog::new();
            let result = evaluate_rule_at(rule, device, &log, now);
            if result.result == ResultOption::InvalidRule && !log.is_empty() {
                debug!(
                    "Evaluation log of {} on {}:\n{}",
                    rule.name(),
                    device.name(),
                    log.render()
                );
            }
            result
        };

        let mut results: Vec<CheckResult> = match &self.pool {
            Some(pool) => pool.install(|| pairs.into_par_iter().map(check).collect()),
            None => pairs.into_iter().map(check).collect(),
        };

        results.sort_by(|a, b| {
            a.device_name
                .cmp(&b.device_name)
                .then_with(|| a.rule_name.cmp(&b.rule_name))
        });

        let rules_checked = results
            .iter()
            .map(|r| r.rule)
            .collect::<HashSet<_>>()
            .len();
        let devices_checked = results
            .iter()
            .map(|r| r.device)
            .collect::<HashSet<_>>()
            .len();

        let report = ComplianceReport {
            results,
            devices_checked,
            rules_checked,
        };
        info!("Evaluation complete: {}", report.summary());
        report
    }

    /// Evaluates all policies and records the outcomes into `store`.
    pub fn evaluate_into(&self, store: &mut CheckResultStore) -> ComplianceReport {
        let report = self.evaluate();
        for result in &report.results {
            store.record(result.clone());
        }
        report
    }
}
