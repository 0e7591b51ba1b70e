//! TOML deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization.
//! They are converted to policies and rules by the loader.

use serde::Deserialize;

/// Raw TOML representation of a policy file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyFileDto {
    /// Policy definitions.
    #[serde(rename = "policies", default)]
    pub policies: Vec<PolicyDto>,
}

/// TOML representation of a `[[policies]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDto {
    /// Policy identifier.
    pub id: u64,
    /// Policy name.
    pub name: String,
    /// Targeted device groups. Empty targets every device.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Rules of the policy.
    #[serde(default)]
    pub rules: Vec<RuleDto>,
}

/// TOML representation of a `[[policies.rules]]` entry, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleDto {
    /// Structural text rule.
    Text(TextRuleDto),
    /// Script rule.
    Script(ScriptRuleDto),
}

/// Text rule parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TextRuleDto {
    /// Rule identifier.
    pub id: u64,
    /// Rule name.
    pub name: String,
    /// Whether the rule is enabled (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Attribute to read (e.g. "runningConfig").
    pub field: String,
    /// Context chain, one regex per line.
    #[serde(default)]
    pub context: String,
    /// Text or pattern to look for.
    pub text: String,
    /// Treat `text` as a regex.
    #[serde(default)]
    pub reg_exp: bool,
    /// Whole-block matching.
    #[serde(default)]
    pub match_all: bool,
    /// Pass on the first matching block.
    #[serde(default)]
    pub any_block: bool,
    /// Invert block outcomes.
    #[serde(default)]
    pub invert: bool,
    /// Normalize whitespace (default from `[text] default_normalize`).
    #[serde(default)]
    pub normalize: Option<bool>,
    /// Only apply to devices of this driver.
    #[serde(default)]
    pub driver: Option<String>,
    /// Exempted devices.
    #[serde(default)]
    pub exemptions: Vec<ExemptionDto>,
}

/// Script rule parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRuleDto {
    /// Rule identifier.
    pub id: u64,
    /// Rule name.
    pub name: String,
    /// Whether the rule is enabled (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Script language, `rhai` or `python` (default: "rhai").
    #[serde(default = "default_language")]
    pub language: String,
    /// Inline script source (mutually exclusive with `file`).
    #[serde(default)]
    pub script: Option<String>,
    /// Script file, relative to the policy file (mutually exclusive with `script`).
    #[serde(default)]
    pub file: Option<String>,
    /// Exempted devices.
    #[serde(default)]
    pub exemptions: Vec<ExemptionDto>,
}

/// TOML representation of an exemption.
#[derive(Debug, Clone, Deserialize)]
pub struct ExemptionDto {
    /// Exempted device identifier.
    pub device: u64,
    /// Expiration, RFC 3339 or `YYYY-MM-DD`.
    pub expires: String,
}

fn default_enabled() -> bool {
    true
}

fn default_language() -> String {
    "rhai".to_string()
}
