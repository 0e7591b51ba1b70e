//! Structural text rule: literal or regex matching over configuration sections.

use confguard_core::{
    full_match_regex, select_sections, Applicability, Device, DriverRegistry, EvaluationLog,
    Exemption, PolicyId, Prepared, ResultOption, Rule, RuleId, Verdict,
};
use crate::error::RuleError;
use regex::Regex;
use tracing::warn;

/// Checks that sections of a configuration attribute contain (or do not
/// contain) a text or pattern.
///
/// The attribute named by `field` is split into blocks by the `context`
/// chain (one regex per line, each matching a whole line that opens a
/// nested section). Every block is then tested against `text`:
///
/// | `reg_exp` | `match_all` | block matches when            |
/// |-----------|-------------|-------------------------------|
/// | yes       | yes         | the whole block matches       |
/// | yes       | no          | the pattern is found in it    |
/// | no        | yes         | the block equals `text`       |
/// | no        | no          | the block contains `text`     |
///
/// `invert` flips each block outcome. Without `any_block` every block must
/// match; with it the first matching block makes the device conforming.
/// When no block is found the device is conforming.
#[derive(Debug)]
pub struct TextRule {
    id: RuleId,
    name: String,
    enabled: bool,
    policy: Option<PolicyId>,
    exemptions: Vec<Exemption>,
    field: String,
    context: String,
    text: String,
    reg_exp: bool,
    match_all: bool,
    any_block: bool,
    invert: bool,
    normalize: bool,
    driver_filter: Option<String>,
    prepared: Prepared<Matcher>,
}

#[derive(Debug)]
struct Matcher {
    context: Vec<Regex>,
    pattern: Option<Regex>,
}

impl TextRule {
    /// Creates an enabled rule with an empty pattern.
    #[must_use]
    pub fn new(id: RuleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            policy: None,
            exemptions: Vec::new(),
            field: String::new(),
            context: String::new(),
            text: String::new(),
            reg_exp: false,
            match_all: false,
            any_block: false,
            invert: false,
            normalize: false,
            driver_filter: None,
            prepared: Prepared::new(),
        }
    }

    /// Sets the configuration attribute to read.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.set_field(field);
        self
    }

    /// Sets the context chain, one regex per line.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.set_context(context);
        self
    }

    /// Sets the text or pattern to look for.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Treats `text` as a regular expression.
    #[must_use]
    pub fn reg_exp(mut self, reg_exp: bool) -> Self {
        self.reg_exp = reg_exp;
        self.prepared.reset();
        self
    }

    /// Requires whole-block matches instead of partial ones.
    #[must_use]
    pub fn match_all(mut self, match_all: bool) -> Self {
        self.match_all = match_all;
        self.prepared.reset();
        self
    }

    /// Passes on the first matching block instead of requiring all.
    #[must_use]
    pub fn any_block(mut self, any_block: bool) -> Self {
        self.any_block = any_block;
        self
    }

    /// Inverts each block outcome.
    #[must_use]
    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Strips vertical tabs, form feeds and trailing spaces before matching.
    #[must_use]
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Restricts the rule to devices of one driver.
    #[must_use]
    pub fn driver_filter(mut self, driver: impl Into<String>) -> Self {
        let driver = driver.into();
        self.driver_filter = (!driver.is_empty()).then_some(driver);
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

    /// Changes the attribute to read.
    pub fn set_field(&mut self, field: impl Into<String>) {
        self.field = field.into();
        self.prepared.reset();
    }

    /// Changes the context chain.
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
        self.prepared.reset();
    }

    /// Changes the text or pattern. Carriage returns are dropped.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into().replace('\r', "");
        self.prepared.reset();
    }

    /// Returns the text or pattern.
    #[must_use]
    pub fn get_text(&self) -> &str {
        &self.text
    }

    /// Returns the driver filter, if any.
    #[must_use]
    pub fn get_driver_filter(&self) -> Option<&str> {
        self.driver_filter.as_deref()
    }

    /// Describes the driver filter for display.
    ///
    /// Empty without a filter, `"Unknown driver"` when the registry does
    /// not know the driver.
    #[must_use]
    pub fn driver_description(&self, registry: &DriverRegistry) -> String {
        match &self.driver_filter {
            None => String::new(),
            Some(driver) => registry
                .get(driver)
                .map_or_else(|| "Unknown driver".to_string(), |d| d.description.clone()),
        }
    }

    fn build_matcher(&self) -> Result<Matcher, RuleError> {
        let compile = |pattern: &str, anchored: bool| {
            let compiled = if anchored {
                full_match_regex(pattern)
            } else {
                Regex::new(pattern)
            };
            compiled.map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        };

        let context = self
            .context
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| compile(line, true))
            .collect::<Result<Vec<_>, _>>()?;

        if self.field.is_empty() {
            return Err(RuleError::MissingField);
        }

        let pattern = if self.reg_exp {
            Some(compile(&self.text, self.match_all)?)
        } else {
            None
        };

        Ok(Matcher { context, pattern })
    }

    fn does_match(&self, matcher: &Matcher, block: &str) -> bool {
        let found = match &matcher.pattern {
            Some(pattern) => pattern.is_match(block),
            None if self.match_all => block == self.text,
            None => block.contains(&self.text),
        };
        found ^ self.invert
    }
}

/// Drops vertical tabs, form feeds and carriage returns, and trailing spaces
/// at the end of lines.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '\x0B' | '\x0C' | '\r'))
        .collect();
    let mut lines: Vec<&str> = cleaned.split('\n').collect();
    let last = lines.len() - 1;
    for line in &mut lines[..last] {
        *line = line.trim_end_matches(' ');
    }
    lines.join("\n")
}

impl Rule for TextRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "text"
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
            self.build_matcher().map_err(|e| {
                warn!("Text rule {} is invalid: {e}", self.name);
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

    fn applicability(&self, device: &dyn Device) -> Applicability {
        match &self.driver_filter {
            Some(driver) if driver != device.driver() => Applicability::NotApplicable(
                "The rule doesn't apply to the device's driver".to_string(),
            ),
            _ => Applicability::Applicable,
        }
    }

    fn check(&self, device: &dyn Device, log: &EvaluationLog) -> Verdict {
        let Some(matcher) = self.prepared.get() else {
            return Verdict::new(ResultOption::InvalidRule);
        };

        let Some(value) = device.item(&self.field) else {
            log.info(format!("No such field '{}' on this device", self.field));
            return Verdict::with_comment(ResultOption::NotApplicable, "No such field.");
        };

        let mut content = value.to_text().replace('\r', "");
        if self.normalize {
            content = normalize_text(&content);
        }

        let blocks = select_sections(&content, &matcher.context);
        log.debug(format!("Found {} block(s) matching the context.", blocks.len()));

        for (number, block) in blocks.iter().enumerate() {
            let matched = self.does_match(matcher, &block.body);
            if !matched && !self.any_block {
                log.debug(format!(
                    "Non matching block, number {} (in [{}])",
                    number + 1,
                    block.title
                ));
                return Verdict::new(ResultOption::Nonconforming);
            }
            if matched && self.any_block {
                log.debug(format!(
                    "Matching block, number {} (in [{}])",
                    number + 1,
                    block.title
                ));
                return Verdict::new(ResultOption::Conforming);
            }
        }

        Verdict::new(ResultOption::Conforming)
    }
}
