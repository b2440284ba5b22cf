//! Detecting explicit section references in queries and matching them
//! against rendered documents.

use std::sync::LazyLock;

use regex::Regex;

static SECTION_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:section\s*)?(\d{1,3})").expect("section reference regex")
});

/// Extract the section number a query refers to, if any.
///
/// This is a loose scan: the first run of one to three digits, optionally
/// preceded by the word "section" in any case. A longer number yields its
/// first three digits, and digits that are not a section (a year, say) are
/// picked up too.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::section::parse_section_reference;
///
/// assert_eq!(parse_section_reference("What does Section 69 say?").as_deref(), Some("69"));
/// assert_eq!(parse_section_reference("punishment under 303").as_deref(), Some("303"));
/// assert_eq!(parse_section_reference("what is theft?"), None);
/// ```
pub fn parse_section_reference(query: &str) -> Option<String> {
    SECTION_REFERENCE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Matcher for documents that cite one section number.
///
/// Matches the word `Section` (exact case) followed by the number, allowing a
/// colon and whitespace in between so the rendered `"BNS Section: 69"` header
/// matches as well as `"Section 69"` in body text. The number must not be
/// followed by another digit: `"Section 123"` does not match `12`.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::section::SectionMatcher;
///
/// let matcher = SectionMatcher::new("69");
/// assert!(matcher.matches("BNS Section: 69\nSubject: ..."));
/// assert!(!matcher.matches("BNS Section: 690\nSubject: ..."));
/// ```
#[derive(Debug, Clone)]
pub struct SectionMatcher {
    number: String,
    pattern: Regex,
}

impl SectionMatcher {
    /// Build a matcher for `number`.
    pub fn new(number: &str) -> Self {
        let pattern = Regex::new(&format!(r"Section:?\s*{}(?:\D|$)", regex::escape(number)))
            .expect("escaped section pattern");
        Self {
            number: number.to_string(),
            pattern,
        }
    }

    /// The section number being matched.
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Whether `text` cites this section.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}
