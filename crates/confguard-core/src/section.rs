//! Extraction of indentation-delimited configuration sections.

use crate::hierarchy::indent_of;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separator between the levels of a section title.
pub const TITLE_SEPARATOR: &str = " > ";

/// A block of configuration text opened by a matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Path of matched lines leading to this block, joined with `" > "`.
    pub title: String,
    /// Lines indented deeper than the matching line, joined with `\n`.
    pub body: String,
}

impl Section {
    /// Creates a new section.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// A section spanning a whole document, with an empty title.
    #[must_use]
    pub fn whole(text: impl Into<String>) -> Self {
        Self::new("", text)
    }
}

/// Compiles a pattern so that it only matches an entire line or block.
///
/// # Errors
///
/// Returns the regex error if the pattern does not compile.
pub fn full_match_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

struct OpenSection {
    depth: usize,
    title: String,
    body: Vec<String>,
}

impl OpenSection {
    fn close(self) -> Section {
        Section::new(self.title, self.body.join("\n"))
    }
}

/// Finds the sections of `text` opened by lines fully matching `pattern`.
///
/// A line matching `pattern` at indentation `d` opens a section. Following
/// lines indented deeper than `d` form its body. The first line indented at
/// `d` or less closes it, and may itself open the next section.
///
/// `pattern` is expected to be anchored (see [`full_match_regex`]) and is
/// tested against the raw line, leading spaces included. Nested levels
/// therefore usually start with ` *` or `\s*`.
#[must_use]
pub fn find_sections(text: &str, pattern: &Regex, path_prefix: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut open: Option<OpenSection> = None;

    for line in text.lines() {
        let depth = indent_of(line);

        if let Some(current) = open.as_mut() {
            if depth > current.depth {
                current.body.push(line.to_string());
                continue;
            }
        }
        if let Some(done) = open.take() {
            sections.push(done.close());
        }

        if pattern.is_match(line) {
            let trimmed = line.trim();
            let title = if path_prefix.is_empty() {
                trimmed.to_string()
            } else {
                format!("{path_prefix}{TITLE_SEPARATOR}{trimmed}")
            };
            open = Some(OpenSection {
                depth,
                title,
                body: Vec::new(),
            });
        }
    }

    if let Some(done) = open {
        sections.push(done.close());
    }

    sections
}

/// Applies a chain of context patterns level by level.
///
/// Each pattern selects sections within the bodies found by the previous one.
/// An empty chain yields the whole text as a single section.
#[must_use]
pub fn select_sections(text: &str, chain: &[Regex]) -> Vec<Section> {
    let mut blocks = vec![Section::whole(text)];

    for pattern in chain {
        blocks = blocks
            .iter()
            .flat_map(|block| find_sections(&block.body, pattern, &block.title))
            .collect();
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING: &str = "hostname router1\n\
interface Gi0/0\n \
description uplink\n \
ip address 10.0.0.1 255.255.255.0\n\
!\n\
interface Gi0/1\n \
shutdown\n\
!\n\
line vty 0 4\n \
password something\n \
transport input ssh\n";

    fn re(p: &str) -> Regex {
        full_match_regex(p).unwrap()
    }

    #[test]
    fn finds_top_level_sections() {
        let sections = find_sections(RUNNING, &re("interface .*"), "");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "interface Gi0/0");
        assert_eq!(
            sections[0].body,
            " description uplink\n ip address 10.0.0.1 255.255.255.0"
        );
        assert_eq!(sections[1].title, "interface Gi0/1");
        assert_eq!(sections[1].body, " shutdown");
    }

    #[test]
    fn closing_line_can_open_next_section() {
        let text = "interface A\n x\ninterface B\n y";
        let sections = find_sections(text, &re("interface .*"), "");
        assert_eq!(
            sections,
            vec![
                Section::new("interface A", " x"),
                Section::new("interface B", " y"),
            ]
        );
    }

    #[test]
    fn indented_line_needs_leading_space_in_pattern() {
        let text = "router bgp 1\n vrf A\n  x";
        assert!(find_sections(text, &re("vrf .*"), "").is_empty());
        assert_eq!(find_sections(text, &re(" *vrf .*"), "").len(), 1);
    }

    #[test]
    fn pattern_must_match_whole_line() {
        let sections = find_sections(RUNNING, &re("interface"), "");
        assert!(sections.is_empty());
    }

    #[test]
    fn title_uses_prefix() {
        let sections = find_sections(" vrf A\n  x", &re(" *vrf .*"), "router bgp 1");
        assert_eq!(sections[0].title, "router bgp 1 > vrf A");
        assert_eq!(sections[0].body, "  x");
    }

    #[test]
    fn section_at_end_of_text_is_flushed() {
        let sections = find_sections("a\nline vty 0 4\n password x", &re("line vty .*"), "");
        assert_eq!(sections, vec![Section::new("line vty 0 4", " password x")]);
    }

    #[test]
    fn empty_section_body() {
        let sections = find_sections("interface A\ninterface B", &re("interface .*"), "");
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|s| s.body.is_empty()));
    }

    #[test]
    fn empty_chain_is_whole_document() {
        let sections = select_sections(RUNNING, &[]);
        assert_eq!(sections, vec![Section::whole(RUNNING)]);
    }

    #[test]
    fn chain_descends_levels() {
        let text = "router bgp 65000\n \
address-family ipv4 vrf RED\n  \
neighbor 1.1.1.1 activate\n \
address-family ipv4 vrf BLUE\n  \
neighbor 2.2.2.2 activate\n\
router ospf 1\n \
address-family ipv4 vrf RED\n  \
area 0";
        let chain = vec![re("router bgp .*"), re(r"\s*address-family ipv4 vrf .*")];
        let sections = select_sections(text, &chain);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].title,
            "router bgp 65000 > address-family ipv4 vrf RED"
        );
        assert_eq!(sections[0].body, "  neighbor 1.1.1.1 activate");
        assert_eq!(
            sections[1].title,
            "router bgp 65000 > address-family ipv4 vrf BLUE"
        );
    }

    #[test]
    fn chain_without_match_yields_nothing() {
        let sections = select_sections(RUNNING, &[re("router bgp .*")]);
        assert!(sections.is_empty());
    }
}
