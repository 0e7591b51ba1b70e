//! The rule kinds a policy file may declare.

use crate::script::{DEFAULT_PYTHON_SCRIPT, DEFAULT_SCRIPT};

/// Rule kinds, as written in the `type` key of `[[policies.rules]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Structural text matching over configuration sections.
    Text,
    /// Rhai or Python script with a `check(device)` entry point.
    Script,
}

/// Values of the `language` key of script rules. The first is the default.
pub const SCRIPT_LANGUAGES: [&str; 2] = ["rhai", "python"];

/// Returns the starting script for a language, if it is supported.
#[must_use]
pub fn script_template(language: &str) -> Option<&'static str> {
    match language.to_ascii_lowercase().as_str() {
        "rhai" => Some(DEFAULT_SCRIPT),
        "python" => Some(DEFAULT_PYTHON_SCRIPT),
        _ => None,
    }
}

impl RuleKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 2] = [Self::Text, Self::Script];

    /// Returns the `type` value of this kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Script => "script",
        }
    }

    /// Returns a one-line description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Text => "Literal or regex matching over configuration sections",
            Self::Script => "Rhai or Python script returning a verdict for each device",
        }
    }

    /// Returns the keys accepted by this kind, besides `type`, `id`, `name`,
    /// `enabled` and `exemptions`.
    #[must_use]
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Text => &[
                "field",
                "context",
                "text",
                "reg_exp",
                "match_all",
                "any_block",
                "invert",
                "normalize",
                "driver",
            ],
            Self::Script => &["language", "script", "file"],
        }
    }

    /// Returns a starting point for a new rule of this kind.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::Text => TEXT_TEMPLATE,
            Self::Script => DEFAULT_SCRIPT,
        }
    }

    /// Looks a kind up by its `type` value.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

const TEXT_TEMPLATE: &str = r#"[[policies.rules]]
type = "text"
id = 1
name = "vty-ssh-only"
field = "runningConfig"
context = "line vty .*"
text = " transport input ssh"
"#;

/// Returns every rule kind.
#[must_use]
pub fn all_kinds() -> &'static [RuleKind] {
    &RuleKind::ALL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_file::{load_policies_from_toml, PolicyLoader};

    #[test]
    fn names_round_trip() {
        for kind in all_kinds() {
            assert_eq!(RuleKind::parse(kind.name()), Some(*kind));
        }
        assert_eq!(RuleKind::parse("python"), None);
    }

    #[test]
    fn every_script_language_has_a_template() {
        for language in SCRIPT_LANGUAGES {
            assert!(script_template(language).is_some(), "{language}");
        }
        assert_eq!(script_template("Python"), Some(DEFAULT_PYTHON_SCRIPT));
        assert_eq!(script_template("lua"), None);
    }

    #[test]
    fn text_template_loads() {
        let content = format!("[[policies]]\nid = 1\nname = \"p\"\n\n{}", RuleKind::Text.template());
        let policies = load_policies_from_toml(&content, &PolicyLoader::new()).unwrap();
        assert_eq!(policies[0].rules().len(), 1);
    }
}
