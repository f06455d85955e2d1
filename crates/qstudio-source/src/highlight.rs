//! Source line ranges owned by graph nodes, for UI emphasis.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::locator::locate_in;
use crate::parser::parse;
use crate::section::{ParsedSource, Section, StepRole};

/// A 0-based, inclusive line range plus the enclosing step number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// First highlighted line (the section's marker line).
    pub start_line: usize,
    /// Last highlighted line (trailing blank lines excluded).
    pub end_line: usize,
    /// Number of the nearest enclosing STEP marker.
    pub step: Option<u32>,
}

/// What to look up.
#[derive(Debug, Clone, Copy)]
pub struct HighlightQuery<'a> {
    /// Role matching the node's kind; narrows the first lookup pass.
    pub role: Option<StepRole>,
    /// Node category (e.g. "Estimator"), tried when the label finds nothing.
    pub category: Option<&'a str>,
    /// Node display label.
    pub label: &'a str,
}

impl<'a> HighlightQuery<'a> {
    /// Query by label only.
    pub fn label(label: &'a str) -> Self {
        Self {
            role: None,
            category: None,
            label,
        }
    }

    /// Narrow the first pass to sections with this role.
    pub fn with_role(mut self, role: StepRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Fall back to this category when the label is not found.
    pub fn with_category(mut self, category: &'a str) -> Self {
        self.category = Some(category);
        self
    }
}

/// Resolve a highlight against a freshly parsed source.
pub fn resolve(query: &HighlightQuery<'_>, source: &str) -> Option<Highlight> {
    resolve_parsed(query, &parse(source), source)
}

/// Resolve a highlight against an already parsed source.
///
/// `source` must be the text `parsed` came from. Sources without markers
/// never highlight: the whole-document fallback is for reconciliation only.
pub fn resolve_parsed(
    query: &HighlightQuery<'_>,
    parsed: &ParsedSource,
    source: &str,
) -> Option<Highlight> {
    let section = find_section(query, &parsed.sections)?;
    let (start_line, end_line) = line_range(source, &section.span);
    Some(Highlight {
        start_line,
        end_line,
        step: section.step,
    })
}

fn find_section<'a>(query: &HighlightQuery<'_>, sections: &'a [Section]) -> Option<&'a Section> {
    if let Some(role) = query.role {
        let same_role = sections.iter().filter(move |s| s.role == role);
        if let Some(found) = locate_in(query.label, same_role) {
            return Some(found);
        }
    }

    if let Some(found) = locate_in(query.label, sections) {
        return Some(found);
    }

    query
        .category
        .filter(|c| !c.trim().is_empty())
        .and_then(|category| locate_in(category, sections))
}

/// Convert a byte span into a 0-based inclusive line range.
pub fn line_range(source: &str, span: &Range<usize>) -> (usize, usize) {
    let start_line = count_newlines(&source[..span.start]);
    let trimmed_len = source[span.clone()].trim_end().len();
    if trimmed_len == 0 {
        return (start_line, start_line);
    }
    let end_line = count_newlines(&source[..span.start + trimmed_len]);
    (start_line, end_line)
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Highlight resolver that reuses the parse of the last source it saw.
#[derive(Debug, Default)]
pub struct HighlightResolver {
    cached: Option<(String, ParsedSource)>,
}

impl HighlightResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `query` against `source`, reparsing only when the text changed.
    pub fn resolve(&mut self, query: &HighlightQuery<'_>, source: &str) -> Option<Highlight> {
        let stale = self
            .cached
            .as_ref()
            .is_none_or(|(cached, _)| cached != source);
        if stale {
            self.cached = Some((source.to_string(), parse(source)));
        }
        let (text, parsed) = self.cached.as_ref()?;
        resolve_parsed(query, parsed, text)
    }

    /// Drop the cached parse.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
