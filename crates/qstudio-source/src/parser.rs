//! Single-pass section scanner.

use std::ops::Range;

use tracing::trace;

use crate::marker::{self, MarkerLine};
use crate::section::{ParseWarning, ParsedSource, Section, SectionKind, StepRole};

/// Parse a source document into ordered, non-overlapping sections.
///
/// Never fails: malformed input produces warnings, not errors.
///
/// ```rust
/// use qstudio_source::parse;
///
/// let src = "## STEP 1 : Map\nmol = build(x)\n## STEP 2 : Execute\nrun(mol)\n";
/// let parsed = parse(src);
/// assert_eq!(parsed.sections.len(), 2);
/// assert_eq!(parsed.sections[0].name, "Map");
/// assert_eq!(parsed.sections[0].primary_body, "mol = build(x)\n");
/// assert_eq!(parsed.assemble(), src);
/// ```
pub fn parse(text: &str) -> ParsedSource {
    let mut scanner = Scanner::new(text);
    let mut offset = 0;

    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        let end = offset + line.len();
        offset = end;

        let content = line.trim_end_matches(['\n', '\r']);
        let Some(marker) = marker::classify(content) else {
            continue;
        };

        match marker {
            MarkerLine::Step { number, title } => {
                scanner.close(start);
                let role = StepRole::from_title(title);
                scanner.step = Some((number, role));
                let name = scanner.title_or_fallback(title, line_no, || format!("Step {number}"));
                scanner.open(SectionKind::Step, name, start..end);
            }
            MarkerLine::Node { name } => {
                scanner.close(start);
                let index = scanner.sections.len() + 1;
                let name = scanner.title_or_fallback(name, line_no, || format!("Section {index}"));
                scanner.open(SectionKind::Node, name, start..end);
            }
            MarkerLine::InputStart => scanner.input_start(end, line_no),
            MarkerLine::InputEnd => scanner.input_end(start, line_no),
        }
    }

    scanner.finish()
}

/// A section whose end has not been seen yet.
struct OpenSection {
    name: (String, bool),
    kind: SectionKind,
    step: Option<u32>,
    role: StepRole,
    marker: Range<usize>,
    input_start: Option<(usize, usize)>,
    input: Option<Range<usize>>,
}

struct Scanner<'a> {
    text: &'a str,
    step: Option<(u32, StepRole)>,
    current: Option<OpenSection>,
    sections: Vec<Section>,
    warnings: Vec<ParseWarning>,
    first_marker: Option<usize>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            step: None,
            current: None,
            sections: Vec::new(),
            warnings: Vec::new(),
            first_marker: None,
        }
    }

    fn title_or_fallback(
        &mut self,
        title: &str,
        line_no: usize,
        fallback: impl FnOnce() -> String,
    ) -> (String, bool) {
        let title = title.trim();
        if title.is_empty() {
            let assigned = fallback();
            self.warnings.push(ParseWarning::UntitledSection {
                line: line_no,
                assigned: assigned.clone(),
            });
            (assigned, false)
        } else {
            (title.to_string(), true)
        }
    }

    fn open(&mut self, kind: SectionKind, name: (String, bool), marker: Range<usize>) {
        self.first_marker.get_or_insert(marker.start);
        let (step, role) = match self.step {
            Some((number, role)) => (Some(number), role),
            None => (None, StepRole::Unknown),
        };
        self.current = Some(OpenSection {
            name,
            kind,
            step,
            role,
            marker,
            input_start: None,
            input: None,
        });
    }

    fn input_start(&mut self, line_end: usize, line_no: usize) {
        let Some(open) = self.current.as_mut() else {
            self.warnings
                .push(ParseWarning::InputOutsideSection { line: line_no });
            return;
        };
        if open.input.is_some() || open.input_start.is_some() {
            self.warnings.push(ParseWarning::ExtraInputRegion {
                section: open.name.0.clone(),
                line: line_no,
            });
            return;
        }
        open.input_start = Some((line_end, line_no));
    }

    fn input_end(&mut self, line_start: usize, line_no: usize) {
        let Some(open) = self.current.as_mut() else {
            self.warnings.push(ParseWarning::StrayInputEnd { line: line_no });
            return;
        };
        match open.input_start.take() {
            Some((start, _)) if open.input.is_none() => open.input = Some(start..line_start),
            _ if open.input.is_some() => {}
            _ => self.warnings.push(ParseWarning::StrayInputEnd { line: line_no }),
        }
    }

    fn close(&mut self, end: usize) {
        let Some(open) = self.current.take() else {
            return;
        };

        if let Some((_, line)) = open.input_start {
            self.warnings.push(ParseWarning::UnclosedInput {
                section: open.name.0.clone(),
                line,
            });
        }

        let body_span = open.marker.end..end;
        let section = Section {
            name: open.name.0,
            kind: open.kind,
            titled: open.name.1,
            step: open.step,
            role: open.role,
            marker_line: self.text[open.marker.clone()].to_string(),
            primary_body: self.text[body_span.clone()].to_string(),
            input_body: open.input.clone().map(|r| self.text[r].to_string()),
            span: open.marker.start..end,
            body_span,
            input_span: open.input,
        };
        trace!(name = %section.name, span = ?section.span, "closed section");
        self.sections.push(section);
    }

    fn finish(mut self) -> ParsedSource {
        self.close(self.text.len());

        let preamble_end = self.first_marker.unwrap_or(self.text.len());
        let whole = self.sections.is_empty().then(|| Section {
            name: String::new(),
            kind: SectionKind::Document,
            titled: false,
            step: None,
            role: StepRole::Unknown,
            marker_line: String::new(),
            primary_body: self.text.to_string(),
            input_body: None,
            span: 0..self.text.len(),
            body_span: 0..self.text.len(),
            input_span: None,
        });

        ParsedSource {
            preamble: self.text[..preamble_end].to_string(),
            sections: self.sections,
            warnings: self.warnings,
            whole,
        }
    }
}
