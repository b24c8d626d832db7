//! Word-boundary vocabulary matching.

use regex::{Regex, RegexBuilder};

/// A compiled set of terms matched on word boundaries.
#[derive(Debug, Clone)]
pub struct TermSet {
    pattern: Regex,
}

impl TermSet {
    /// Case-insensitive term set.
    pub fn new(terms: &[&str]) -> Self {
        Self::build(terms, true)
    }

    /// Term set that only matches the exact casing given.
    pub fn case_sensitive(terms: &[&str]) -> Self {
        Self::build(terms, false)
    }

    fn build(terms: &[&str], case_insensitive: bool) -> Self {
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(case_insensitive)
            .build()
            .expect("escaped term alternation is a valid regex");
        Self { pattern }
    }

    pub fn is_present(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }

    pub fn count(&self, content: &str) -> usize {
        self.pattern.find_iter(content).count()
    }

    /// Every occurrence as `(byte_offset, matched_text)`.
    pub fn occurrences<'a>(&'a self, content: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        self.pattern.find_iter(content).map(|m| (m.start(), m.as_str()))
    }

    /// First occurrence, if any.
    pub fn first<'a>(&self, content: &'a str) -> Option<(usize, &'a str)> {
        self.pattern.find(content).map(|m| (m.start(), m.as_str()))
    }
}

/// 1-based line number containing `offset`.
pub fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Human-readable location label for `offset`.
pub fn location_of(content: &str, offset: usize) -> String {
    format!("line {}", line_of(content, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_on_word_boundaries_only() {
        let terms = TermSet::new(&["log", "set up"]);
        assert!(terms.is_present("We LOG every call"));
        assert!(!terms.is_present("the catalog is large"));
        assert!(terms.is_present("then set up the host"));
        assert_eq!(terms.count("log, log and blog"), 2);
    }

    #[test]
    fn test_case_sensitive_set() {
        let markers = TermSet::case_sensitive(&["TODO"]);
        assert!(markers.is_present("TODO: finish"));
        assert!(!markers.is_present("a todo list"));
    }

    #[test]
    fn test_line_numbers() {
        let content = "one\ntwo\nthree";
        let (offset, _) = TermSet::new(&["three"]).first(content).unwrap();
        assert_eq!(line_of(content, offset), 3);
        assert_eq!(location_of(content, 0), "line 1");
    }
}
