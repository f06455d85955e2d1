//! Sectioned program sources for qstudio.
//!
//! A program source is a flat text document split into sections by comment
//! markers. Each section is owned by one node of the program graph.
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `## STEP <n> : <title>` | opens a step section |
//! | `###[<name>]` | opens a node section inside the current step |
//! | `#### INPUT PYTHON` | opens the nested user-input region (2+ hashes) |
//! | `#### END INPUT PYTHON` | closes it (2+ hashes) |
//!
//! Sectioning is purely textual: nothing here understands the target
//! language. Parsing never fails; irregular markers become
//! [`ParseWarning`]s and the content is kept.
//!
//! # Example
//!
//! ```rust
//! use qstudio_source::{parse, find, highlight::{resolve, HighlightQuery}};
//!
//! let src = "\
//! ## STEP 1 : Mapping the problem
//! ###[Bell State]
//! qc = QuantumCircuit(2)
//! ## STEP 2 : Execute
//! ###[Sampler]
//! job = sampler.run([qc])
//! ";
//!
//! let parsed = parse(src);
//! assert_eq!(parsed.assemble(), src);
//! assert_eq!(find("Bell", &parsed.sections), Some("qc = QuantumCircuit(2)\n"));
//!
//! let h = resolve(&HighlightQuery::label("Sampler"), src).unwrap();
//! assert_eq!((h.start_line, h.end_line, h.step), (4, 5, Some(2)));
//! ```

pub mod highlight;
mod locator;
pub mod marker;
mod parser;
mod section;

pub use highlight::{Highlight, HighlightQuery, HighlightResolver};
pub use locator::{find, fuzzy_match, locate, locate_in};
pub use parser::parse;
pub use section::{ParseWarning, ParsedSource, Section, SectionKind, StepRole};
