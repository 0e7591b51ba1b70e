//! Indentation hierarchy of line-oriented configuration text.
//!
//! Device configurations are trees of indented blocks. The only structure
//! this module knows about is the count of leading spaces on each line.

/// Returns the number of leading space characters of a line.
///
/// Tabs are not expanded; only `' '` counts towards the depth.
#[must_use]
pub fn indent_of(line: &str) -> usize {
    line.bytes().take_while(|b| *b == b' ').count()
}

/// Computes the structural parent of every line.
///
/// The parent of line `i` is the nearest preceding line whose indentation is
/// strictly smaller than that of line `i`, or `None` at top level.
///
/// # Example
///
/// ```
/// use confguard_core::parents;
///
/// let lines = ["a", "  b", "    c", "  d", "e"];
/// assert_eq!(parents(&lines), vec![None, Some(0), Some(1), Some(0), None]);
/// ```
#[must_use]
pub fn parents<S: AsRef<str>>(lines: &[S]) -> Vec<Option<usize>> {
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut result = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let indent = indent_of(line.as_ref());
        while stack.last().is_some_and(|(top, _)| *top >= indent) {
            stack.pop();
        }
        result.push(stack.last().map(|(_, parent)| *parent));
        stack.push((indent, index));
    }

    result
}

/// One ancestor line of a configuration line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ancestor {
    /// Trimmed text of the ancestor line.
    pub text: String,
    /// Zero-based index of the ancestor line.
    pub index: usize,
}

impl Ancestor {
    /// Creates a new ancestor entry.
    #[must_use]
    pub fn new(text: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            index,
        }
    }
}

/// Returns the ancestors of `index`, ordered from the root to the direct parent.
///
/// An out-of-range `index` has no ancestors.
#[must_use]
pub fn breadcrumb<S: AsRef<str>>(
    lines: &[S],
    parents: &[Option<usize>],
    index: usize,
) -> Vec<Ancestor> {
    let mut chain = Vec::new();
    let mut current = parents.get(index).copied().flatten();

    while let Some(parent) = current {
        let Some(line) = lines.get(parent) else {
            break;
        };
        chain.push(Ancestor::new(line.as_ref().trim(), parent));
        current = parents.get(parent).copied().flatten();
    }

    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_counts_spaces_only() {
        assert_eq!(indent_of("no indent"), 0);
        assert_eq!(indent_of("   three"), 3);
        assert_eq!(indent_of("\ttab"), 0);
        assert_eq!(indent_of(""), 0);
    }

    #[test]
    fn parents_of_nested_lines() {
        let lines = ["a", "  b", "    c", "  d", "e"];
        assert_eq!(parents(&lines), vec![None, Some(0), Some(1), Some(0), None]);
    }

    #[test]
    fn parents_with_uneven_dedent() {
        // "  d" has indent 2, less than "   c" (3) but more than "a" (0)
        let lines = ["a", "    b", "   c", "  d"];
        assert_eq!(parents(&lines), vec![None, Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn siblings_share_a_parent() {
        let lines = [
            "interface Gi0/0",
            " description uplink",
            " ip address 10.0.0.1 255.255.255.0",
            "!",
        ];
        assert_eq!(parents(&lines), vec![None, Some(0), Some(0), None]);
    }

    #[test]
    fn empty_input() {
        let lines: [&str; 0] = [];
        assert!(parents(&lines).is_empty());
    }

    #[test]
    fn breadcrumb_is_root_first() {
        let lines = [
            "router",
            "  interface eth0",
            "    ip 1.1.1.1",
            "  interface eth1",
        ];
        let parents = parents(&lines);
        assert_eq!(
            breadcrumb(&lines, &parents, 2),
            vec![Ancestor::new("router", 0), Ancestor::new("interface eth0", 1)]
        );
        assert!(breadcrumb(&lines, &parents, 0).is_empty());
    }

    #[test]
    fn breadcrumb_out_of_range_is_empty() {
        let lines = ["a", "  b"];
        let parents = parents(&lines);
        assert!(breadcrumb(&lines, &parents, 7).is_empty());
    }
}
