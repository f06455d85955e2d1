//! Section types produced by the parser.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// The stage of the program a STEP block belongs to, inferred from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Backend configuration boilerplate (`STEP 0` in the stock templates).
    Config,
    /// Problem mapping and circuit construction.
    Mapping,
    /// Transpilation / circuit optimization.
    Optimization,
    /// Execution on a primitive.
    Execution,
    /// Post-processing of results.
    PostProcessing,
    /// Title did not match any known stage.
    Unknown,
}

impl StepRole {
    /// Infer a role from a step title.
    pub fn from_title(title: &str) -> Self {
        let title = title.to_lowercase();
        // Order matters: "Optimize Circuit" must not land in Mapping.
        if title.contains("config") {
            StepRole::Config
        } else if title.contains("post") {
            StepRole::PostProcessing
        } else if title.contains("optimi") || title.contains("transpil") {
            StepRole::Optimization
        } else if title.contains("execut") || title.contains("run") {
            StepRole::Execution
        } else if title.contains("map") || title.contains("circuit") || title.contains("problem")
        {
            StepRole::Mapping
        } else {
            StepRole::Unknown
        }
    }

    /// Canonical step title used when composing sources.
    pub fn title(self) -> &'static str {
        match self {
            StepRole::Config => "Backend Config",
            StepRole::Mapping => "Mapping the problem",
            StepRole::Optimization => "Optimize Circuit",
            StepRole::Execution => "Execute",
            StepRole::PostProcessing => "Post-process",
            StepRole::Unknown => "Misc",
        }
    }
}

impl fmt::Display for StepRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepRole::Config => "config",
            StepRole::Mapping => "mapping",
            StepRole::Optimization => "optimization",
            StepRole::Execution => "execution",
            StepRole::PostProcessing => "post-processing",
            StepRole::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Which marker opened a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Opened by `## STEP <n> : <title>`.
    Step,
    /// Opened by `###[<name>]`.
    Node,
    /// Synthetic whole-document section for sources without markers.
    Document,
}

/// A named, contiguous slice of the source owned by one node.
///
/// Spans are byte offsets into the text the section was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section title, matched against node display names.
    pub name: String,
    /// Marker that opened the section.
    pub kind: SectionKind,
    /// Whether `name` came from the marker (false: best-effort title).
    pub titled: bool,
    /// Number of the nearest enclosing STEP marker.
    pub step: Option<u32>,
    /// Role of the enclosing step.
    pub role: StepRole,
    /// The marker line, including its terminator.
    pub marker_line: String,
    /// Text after the marker line up to the next marker or end of document.
    pub primary_body: String,
    /// Text strictly between the nested input markers, if present.
    pub input_body: Option<String>,
    /// Marker line plus body.
    pub span: Range<usize>,
    /// Body only.
    pub body_span: Range<usize>,
    /// Input interior only.
    pub input_span: Option<Range<usize>>,
}

impl Section {
    /// Full text of the section (marker line followed by the body).
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.marker_line.len() + self.primary_body.len());
        text.push_str(&self.marker_line);
        text.push_str(&self.primary_body);
        text
    }

    /// Whether the section carries a nested input region.
    pub fn has_input(&self) -> bool {
        self.input_body.is_some()
    }
}

/// Recoverable irregularities found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A marker without a title; the section got a best-effort name.
    UntitledSection { line: usize, assigned: String },
    /// An input region was opened but the section ended first.
    UnclosedInput { section: String, line: usize },
    /// An input end marker without a matching start.
    StrayInputEnd { line: usize },
    /// A second input region inside one section (only the first is used).
    ExtraInputRegion { section: String, line: usize },
    /// An input marker before the first section marker.
    InputOutsideSection { line: usize },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::UntitledSection { line, assigned } => {
                write!(f, "line {line}: untitled section, using '{assigned}'")
            }
            ParseWarning::UnclosedInput { section, line } => {
                write!(f, "line {line}: input region in '{section}' is never closed")
            }
            ParseWarning::StrayInputEnd { line } => {
                write!(f, "line {line}: input end marker without a start")
            }
            ParseWarning::ExtraInputRegion { section, line } => {
                write!(f, "line {line}: extra input region in '{section}' ignored")
            }
            ParseWarning::InputOutsideSection { line } => {
                write!(f, "line {line}: input marker outside any section")
            }
        }
    }
}

/// Result of scanning a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSource {
    /// Text before the first section marker.
    pub preamble: String,
    /// Sections in document order.
    pub sections: Vec<Section>,
    /// Irregularities found while scanning.
    pub warnings: Vec<ParseWarning>,
    /// Whole-document section, present only when no markers were found.
    pub(crate) whole: Option<Section>,
}

impl ParsedSource {
    /// Reassemble the original text from preamble and sections.
    pub fn assemble(&self) -> String {
        let mut out = self.preamble.clone();
        for section in &self.sections {
            out.push_str(&section.marker_line);
            out.push_str(&section.primary_body);
        }
        out
    }

    /// Whether no section markers were found.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections to match against: the parsed sections, or a single unnamed
    /// section covering the whole document when there are none.
    pub fn effective_sections(&self) -> &[Section] {
        match &self.whole {
            Some(whole) if self.sections.is_empty() => std::slice::from_ref(whole),
            _ => &self.sections,
        }
    }

    /// Section names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Section owning the given byte offset.
    pub fn section_at(&self, offset: usize) -> Option<&Section> {
        self.sections.iter().find(|s| s.span.contains(&offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_inference() {
        assert_eq!(StepRole::from_title("IBM Quantum Config"), StepRole::Config);
        assert_eq!(StepRole::from_title("Mapping the problem"), StepRole::Mapping);
        assert_eq!(StepRole::from_title("Map"), StepRole::Mapping);
        assert_eq!(
            StepRole::from_title("Optimize Circuit"),
            StepRole::Optimization
        );
        assert_eq!(StepRole::from_title("Execute"), StepRole::Execution);
        assert_eq!(
            StepRole::from_title("Post-process"),
            StepRole::PostProcessing
        );
        assert_eq!(StepRole::from_title("Chemistry"), StepRole::Unknown);
    }

    #[test]
    fn test_canonical_titles_round_trip() {
        for role in [
            StepRole::Config,
            StepRole::Mapping,
            StepRole::Optimization,
            StepRole::Execution,
            StepRole::PostProcessing,
        ] {
            assert_eq!(StepRole::from_title(role.title()), role);
        }
    }
}
