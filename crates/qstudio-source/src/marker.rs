//! Marker grammar for sectioned program sources.
//!
//! ```text
//! ## STEP 1 : Mapping the problem      step marker (number + title)
//! ###[Graph to Hamiltonian]            node marker (nested in the current step)
//! ##### INPUT PYTHON                   input region start (2+ hashes)
//! ###### END INPUT PYTHON              input region end (2+ hashes)
//! ```
//!
//! Classification works on a single line with its line terminator removed.

use std::sync::LazyLock;

use regex::Regex;

static STEP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*##\s*STEP\s+(\d+)\b\s*:?\s*(.*?)\s*$").expect("step marker pattern is valid")
});

static NODE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*###\s*\[(.*)\]\s*$").expect("node marker pattern is valid")
});

static INPUT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#{2,}\s*INPUT PYTHON\s*$").expect("input start pattern is valid")
});

static INPUT_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#{2,}\s*END INPUT PYTHON\s*$").expect("input end pattern is valid")
});

/// A recognized marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLine<'a> {
    /// `## STEP <n> : <title>`
    Step { number: u32, title: &'a str },
    /// `###[<name>]`
    Node { name: &'a str },
    /// Opens a nested input region.
    InputStart,
    /// Closes a nested input region.
    InputEnd,
}

impl MarkerLine<'_> {
    /// Whether this marker opens a new section.
    pub fn opens_section(&self) -> bool {
        matches!(self, MarkerLine::Step { .. } | MarkerLine::Node { .. })
    }
}

/// Classify a single line (without its terminator).
pub fn classify(line: &str) -> Option<MarkerLine<'_>> {
    // Cheap reject: every marker starts with '#'.
    if !line.trim_start().starts_with('#') {
        return None;
    }

    if let Some(caps) = STEP_MARKER.captures(line) {
        let number = caps.get(1)?.as_str().parse().ok()?;
        let title = caps.get(2).map_or("", |m| m.as_str());
        return Some(MarkerLine::Step { number, title });
    }

    if let Some(caps) = NODE_MARKER.captures(line) {
        let name = caps.get(1).map_or("", |m| m.as_str().trim());
        return Some(MarkerLine::Node { name });
    }

    // END must be tested first: "END INPUT PYTHON" does not match the start
    // pattern anyway, but keep the order explicit.
    if INPUT_END.is_match(line) {
        return Some(MarkerLine::InputEnd);
    }

    if INPUT_START.is_match(line) {
        return Some(MarkerLine::InputStart);
    }

    None
}

/// Render a step marker line (with trailing newline).
pub fn step_marker(number: u32, title: &str) -> String {
    format!("## STEP {number} : {title}\n")
}

/// Render a node marker line (with trailing newline).
pub fn node_marker(name: &str) -> String {
    format!("###[{name}]\n")
}
