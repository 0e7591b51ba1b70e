//! DTO → policies conversion with validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use confguard_core::{
    DeviceId, Exemption, Policy, PolicyId, RuleBox, RuleId, ScriptConfig, TextConfig,
};

use super::config_dto::{ExemptionDto, PolicyFileDto, RuleDto, ScriptRuleDto, TextRuleDto};
use crate::kinds::SCRIPT_LANGUAGES;
use crate::script::{PythonRule, ScriptRule};
use crate::text_rule::TextRule;

/// Errors during DTO → policy conversion.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// An exemption date does not parse.
    #[error("{context}: invalid date `{value}`, expected RFC 3339 or YYYY-MM-DD")]
    InvalidDate {
        /// Where the error occurred (e.g., "policies[0].rules[1].exemptions[0].expires").
        context: String,
        /// The invalid value.
        value: String,
    },

    /// The script language is not supported.
    #[error("{context}: unsupported script language `{value}`, expected: rhai, python")]
    UnsupportedLanguage {
        /// Where the error occurred.
        context: String,
        /// The invalid value.
        value: String,
    },

    /// The `script` and `file` fields are both set or both missing.
    #[error("{context}: exactly one of `script` or `file` must be set")]
    AmbiguousScript {
        /// The rule that has the conflict.
        context: String,
    },

    /// A script file could not be read.
    #[error("{context}: cannot read script file {}: {source}", path.display())]
    ScriptFile {
        /// Where the error occurred.
        context: String,
        /// Resolved script path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Cross-reference errors such as duplicate identifiers.
    #[error("policy validation errors:\n{}", format_errors(.0))]
    CrossRef(Vec<String>),
}

fn format_errors(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Converts policy DTOs into policies with their rules.
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    base_dir: PathBuf,
    text: TextConfig,
    script: ScriptConfig,
}

impl PolicyLoader {
    /// Creates a loader resolving script files relative to the current directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves script files relative to `dir`.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Sets text rule defaults.
    #[must_use]
    pub fn text_defaults(mut self, text: TextConfig) -> Self {
        self.text = text;
        self
    }

    /// Sets script sandbox limits.
    #[must_use]
    pub fn script_limits(mut self, script: ScriptConfig) -> Self {
        self.script = script;
        self
    }

    /// Converts a `PolicyFileDto` to policies.
    ///
    /// # Errors
    ///
    /// Returns the first conversion error, or every duplicate identifier.
    pub fn load(&self, dto: PolicyFileDto) -> Result<Vec<Policy>, LoadError> {
        check_unique_ids(&dto)?;

        dto.policies
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let ctx = format!("policies[{i}]");
                let rules = p
                    .rules
                    .into_iter()
                    .enumerate()
                    .map(|(j, r)| self.convert_rule(r, &format!("{ctx}.rules[{j}]")))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut policy = Policy::new(PolicyId(p.id), p.name);
                policy.groups = p.groups;
                for rule in rules {
                    policy.add_rule(rule);
                }
                Ok(policy)
            })
            .collect()
    }

    fn convert_rule(&self, dto: RuleDto, ctx: &str) -> Result<RuleBox, LoadError> {
        match dto {
            RuleDto::Text(text) => self.convert_text(text, ctx),
            RuleDto::Script(script) => self.convert_script(script, ctx),
        }
    }

    fn convert_text(&self, dto: TextRuleDto, ctx: &str) -> Result<RuleBox, LoadError> {
        let id = RuleId(dto.id);
        let mut rule = TextRule::new(id, dto.name)
            .enabled(dto.enabled)
            .field(dto.field)
            .context(dto.context)
            .text(dto.text)
            .reg_exp(dto.reg_exp)
            .match_all(dto.match_all)
            .any_block(dto.any_block)
            .invert(dto.invert)
            .normalize(dto.normalize.unwrap_or(self.text.default_normalize));
        if let Some(driver) = dto.driver {
            rule = rule.driver_filter(driver);
        }
        for exemption in convert_exemptions(id, &dto.exemptions, ctx)? {
            rule = rule.exemption(exemption);
        }
        Ok(Box::new(rule))
    }

    fn convert_script(&self, dto: ScriptRuleDto, ctx: &str) -> Result<RuleBox, LoadError> {
        let language = dto.language.to_ascii_lowercase();
        if !SCRIPT_LANGUAGES.contains(&language.as_str()) {
            return Err(LoadError::UnsupportedLanguage {
                context: format!("{ctx}.language"),
                value: dto.language,
            });
        }

        let source = match (dto.script, dto.file) {
            (Some(script), None) => script,
            (None, Some(file)) => {
                let path = self.base_dir.join(file);
                std::fs::read_to_string(&path).map_err(|source| LoadError::ScriptFile {
                    context: format!("{ctx}.file"),
                    path,
                    source,
                })?
            }
            _ => {
                return Err(LoadError::AmbiguousScript {
                    context: ctx.to_string(),
                })
            }
        };

        let id = RuleId(dto.id);
        let exemptions = convert_exemptions(id, &dto.exemptions, ctx)?;
        if language == "python" {
            let rule = exemptions.into_iter().fold(
                PythonRule::new(id, dto.name, source)
                    .enabled(dto.enabled)
                    .limits(self.script.clone()),
                PythonRule::exemption,
            );
            return Ok(Box::new(rule));
        }
        let rule = exemptions.into_iter().fold(
            ScriptRule::new(id, dto.name, source)
                .enabled(dto.enabled)
                .limits(self.script.clone()),
            ScriptRule::exemption,
        );
        Ok(Box::new(rule))
    }
}

fn check_unique_ids(dto: &PolicyFileDto) -> Result<(), LoadError> {
    let mut errors = Vec::new();
    let mut policies = HashSet::new();
    let mut rules = HashSet::new();

    for policy in &dto.policies {
        if !policies.insert(policy.id) {
            errors.push(format!("duplicate policy id {}", policy.id));
        }
        for rule in &policy.rules {
            let id = match rule {
                RuleDto::Text(r) => r.id,
                RuleDto::Script(r) => r.id,
            };
            if !rules.insert(id) {
                errors.push(format!("duplicate rule id {id}"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::CrossRef(errors))
    }
}

fn convert_exemptions(
    rule: RuleId,
    exemptions: &[ExemptionDto],
    ctx: &str,
) -> Result<Vec<Exemption>, LoadError> {
    exemptions
        .iter()
        .enumerate()
        .map(|(k, e)| {
            let expires = parse_date(&e.expires).ok_or_else(|| LoadError::InvalidDate {
                context: format!("{ctx}.exemptions[{k}].expires"),
                value: e.expires.clone(),
            })?;
            Ok(Exemption::new(rule, DeviceId(e.device), expires))
        })
        .collect()
}

/// Parses an RFC 3339 timestamp, or a date taken as midnight UTC.
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Resolves the directory script files of `policy_file` are relative to.
pub(crate) fn parent_dir(policy_file: &Path) -> PathBuf {
    policy_file
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf)
}
