//! Program graph for qstudio.
//!
//! The graph is the editable model of a quantum program: nodes of four
//! kinds (circuit, transpile, execute, post-process) connected by structural
//! edges. Each node owns a section of the program source through its
//! fragments.
//!
//! - [`ProgramGraph`]: nodes, edges, topological order and the logical clock
//!   stamped on fragment writes.
//! - [`NodeParams`]: typed parameters per kind, plus open metadata on [`Node`].
//! - [`Template`]: a marked-up source and its nodes, from a YAML manifest or
//!   derived from the source alone.
//! - [`compose`]: source text for graphs that have no template.
//!
//! # Example
//!
//! ```rust
//! use qstudio_graph::{Node, NodeKind, ProgramGraph, compose};
//!
//! let mut graph = ProgramGraph::new();
//! graph.add_node(Node::new("c", NodeKind::Circuit, "Bell")).unwrap();
//! graph.add_node(Node::new("s", NodeKind::Execute, "Sampler")).unwrap();
//! graph.connect(&"c".into(), &"s".into()).unwrap();
//!
//! let source = compose(&graph);
//! assert!(source.starts_with("## STEP 1 : Mapping the problem\n###[Bell]\n"));
//! ```

pub mod compose;
pub mod error;
mod graph;
mod id;
mod node;
mod params;
mod result;
pub mod template;

pub use compose::{compose, generate};
pub use error::{GraphError, GraphResult};
pub use graph::{GraphSnapshot, ProgramGraph};
pub use id::{EdgeId, NodeId, TemplateId};
pub use node::{Edge, Node, ParameterChange};
pub use params::{
    CircuitParams, ExecuteParams, NodeKind, NodeParams, PostProcessParams, Primitive,
    RAW_INPUT_PARAMETER, SetOutcome, TranspileParams,
};
pub use result::{ResultKind, ResultPayload};
pub use template::{Instantiated, SectionBinding, Template, TemplateEdge, TemplateNode};
