//! Fragment lookup by node display name.
//!
//! Node labels in the graph are short and user-editable while template
//! section titles are longer and descriptive, so lookup runs in two passes:
//!
//! 1. exact, case-sensitive name match;
//! 2. case-insensitive containment in either direction (the candidate
//!    contains the key, or the key contains the candidate).
//!
//! The first candidate in document order wins in both passes.

use crate::section::{Section, SectionKind};

/// Whether `key` fuzzily matches `candidate` (pass 2 only).
///
/// An empty key never matches a named candidate; an unnamed whole-document
/// section matches any key.
pub fn fuzzy_match(key: &str, candidate: &str) -> bool {
    let key = key.trim().to_lowercase();
    let candidate = candidate.trim().to_lowercase();
    if key.is_empty() || candidate.is_empty() {
        return false;
    }
    candidate.contains(&key) || key.contains(&candidate)
}

/// Locate a section among `candidates` by display name.
pub fn locate_in<'a, I>(key: &str, candidates: I) -> Option<&'a Section>
where
    I: IntoIterator<Item = &'a Section>,
    I::IntoIter: Clone,
{
    let candidates = candidates.into_iter();

    if let Some(exact) = candidates.clone().find(|s| s.name == key) {
        return Some(exact);
    }

    candidates
        .into_iter()
        .find(|s| s.kind == SectionKind::Document || fuzzy_match(key, &s.name))
}

/// Locate a section by display name.
pub fn locate<'a>(key: &str, sections: &'a [Section]) -> Option<&'a Section> {
    locate_in(key, sections)
}

/// Find the primary fragment owned by `display_name`.
///
/// ```rust
/// use qstudio_source::{find, parse};
///
/// let parsed = parse("## STEP 1 : Chemistry Map\nmol = build(x)\n");
/// assert_eq!(find("Chemistry", &parsed.sections), Some("mol = build(x)\n"));
/// assert_eq!(find("Execute", &parsed.sections), None);
/// ```
pub fn find<'a>(display_name: &str, sections: &'a [Section]) -> Option<&'a str> {
    locate(display_name, sections).map(|s| s.primary_body.as_str())
}
