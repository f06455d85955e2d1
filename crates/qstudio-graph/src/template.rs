//! Templates: a marked-up program source plus the graph that owns it.
//!
//! A template is loaded either from a YAML manifest or derived from a
//! source file alone. Instantiating it yields the program graph and one
//! [`SectionBinding`] per node whose section was found; the binding carries
//! the fragment text as it appeared at load time.
//!
//! ```yaml
//! id: bell
//! name: Bell state
//! source_file: bell.py
//! nodes:
//!   - id: circuit
//!     label: Bell State Circuit
//!     params: { kind: circuit, num_qubits: 2 }
//!   - id: sampler
//!     label: Sampler
//!     category: Sampler
//!     params: { kind: execute, primitive: sampler }
//! edges:
//!   - { source: circuit, target: sampler }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use qstudio_source::{ParsedSource, Section, locate_in, parse};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GraphError, GraphResult};
use crate::graph::ProgramGraph;
use crate::id::{NodeId, TemplateId};
use crate::node::{Edge, Node};
use crate::params::{NodeKind, NodeParams, Primitive};

/// A node declared by a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    /// Node identifier.
    pub id: NodeId,
    /// Display label, also the section lookup key.
    pub label: String,
    /// Category within the kind.
    #[serde(default)]
    pub category: String,
    /// Typed parameters (the `kind` tag selects the node kind).
    pub params: NodeParams,
    /// Index of the owning section, when known exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<usize>,
    /// Extra kind-agnostic parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// A template edge, by node ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// A program template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template identifier.
    pub id: TemplateId,
    /// Human-readable name.
    pub name: String,
    /// Marked-up program source.
    pub source: String,
    /// Declared nodes.
    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
    /// Declared edges.
    #[serde(default)]
    pub edges: Vec<TemplateEdge>,
}

/// On-disk manifest. The source is given inline or as a path relative to
/// the manifest; without `nodes`, nodes are derived from the source.
#[derive(Debug, Deserialize)]
struct TemplateManifest {
    id: TemplateId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_file: Option<PathBuf>,
    #[serde(default)]
    nodes: Vec<TemplateNode>,
    #[serde(default)]
    edges: Vec<TemplateEdge>,
}

/// Where a node's code sits in the template source at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBinding {
    /// Bound node.
    pub node_id: NodeId,
    /// Index into the parsed sections (or 0 for the whole-document fallback).
    pub section_index: usize,
    /// Name of the bound section.
    pub section_name: String,
    /// Primary fragment at load time.
    pub primary: String,
    /// Input-region text at load time.
    pub raw_input: Option<String>,
}

/// A template turned into a live graph.
#[derive(Debug, Clone)]
pub struct Instantiated {
    /// Graph with fragments filled from the source.
    pub graph: ProgramGraph,
    /// One binding per node whose section was located.
    pub bindings: Vec<SectionBinding>,
}

impl Template {
    /// Derive a template from a marked-up source.
    ///
    /// Every non-configuration section with code becomes a node: kind from
    /// the step role, label from the section title. Nodes are chained in
    /// document order.
    pub fn from_source(id: impl Into<TemplateId>, source: impl Into<String>) -> Self {
        let id = id.into();
        let source = source.into();
        let parsed = parse(&source);

        let mut ids: FxHashMap<String, usize> = FxHashMap::default();
        let mut nodes = Vec::new();
        for (index, section) in parsed.sections.iter().enumerate() {
            let Some(kind) = NodeKind::from_role(section.role) else {
                continue;
            };
            if section.primary_body.trim().is_empty() {
                continue;
            }

            let slug = slugify(&section.name);
            let seen = ids.entry(slug.clone()).or_insert(0);
            *seen += 1;
            let node_id = if *seen == 1 {
                slug
            } else {
                format!("{slug}-{seen}")
            };

            nodes.push(derived_node(node_id, kind, section, index));
        }

        let edges = nodes
            .windows(2)
            .map(|pair| TemplateEdge {
                source: pair[0].id.clone(),
                target: pair[1].id.clone(),
            })
            .collect();

        debug!(template = %id, nodes = nodes.len(), "Derived template from source");
        Self {
            name: id.to_string(),
            id,
            source,
            nodes,
            edges,
        }
    }

    /// Parse a manifest. Relative `source_file` paths resolve against `base_dir`.
    pub fn from_manifest_str(yaml: &str, base_dir: Option<&Path>) -> GraphResult<Self> {
        let manifest: TemplateManifest = serde_yaml_ng::from_str(yaml)?;

        let source = match (manifest.source, manifest.source_file) {
            (Some(inline), None) => inline,
            (None, Some(file)) => {
                let path = match base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file,
                };
                std::fs::read_to_string(&path)?
            }
            (Some(_), Some(_)) => {
                return Err(GraphError::Manifest(
                    "set either 'source' or 'source_file', not both".into(),
                ));
            }
            (None, None) => {
                return Err(GraphError::Manifest(
                    "one of 'source' or 'source_file' is required".into(),
                ));
            }
        };

        if manifest.nodes.is_empty() {
            let mut template = Self::from_source(manifest.id, source);
            if let Some(name) = manifest.name {
                template.name = name;
            }
            return Ok(template);
        }

        Ok(Self {
            name: manifest.name.unwrap_or_else(|| manifest.id.to_string()),
            id: manifest.id,
            source,
            nodes: manifest.nodes,
            edges: manifest.edges,
        })
    }

    /// Load a manifest file.
    pub fn from_manifest_file(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::from_manifest_str(&yaml, path.parent())
    }

    /// Build the graph and capture each node's load-time fragments.
    pub fn instantiate(&self) -> GraphResult<Instantiated> {
        let parsed = parse(&self.source);
        let mut graph = ProgramGraph::new();
        let mut bindings = Vec::with_capacity(self.nodes.len());

        for tn in &self.nodes {
            let mut node = Node::new(tn.id.clone(), tn.params.kind(), tn.label.clone())
                .with_category(tn.category.clone())
                .with_params(tn.params.clone());
            node.metadata = tn.metadata.clone();
            graph.add_node(node)?;

            let Some((section_index, section)) = bound_section(&parsed, tn) else {
                warn!(template = %self.id, node = %tn.id, label = %tn.label, "No section found for template node");
                continue;
            };

            graph.set_primary_fragment(&tn.id, Some(section.primary_body.clone()))?;
            if let Some(input) = &section.input_body {
                graph.set_raw_input_fragment(&tn.id, Some(input.clone()))?;
            }
            bindings.push(SectionBinding {
                node_id: tn.id.clone(),
                section_index,
                section_name: section.name.clone(),
                primary: section.primary_body.clone(),
                raw_input: section.input_body.clone(),
            });
        }

        for edge in &self.edges {
            graph.add_edge(Edge {
                id: format!("{}->{}", edge.source, edge.target).into(),
                source: edge.source.clone(),
                target: edge.target.clone(),
            })?;
        }

        info!(
            template = %self.id,
            nodes = graph.len(),
            bound = bindings.len(),
            "Instantiated template"
        );
        Ok(Instantiated { graph, bindings })
    }
}

fn bound_section<'a>(parsed: &'a ParsedSource, tn: &TemplateNode) -> Option<(usize, &'a Section)> {
    let sections = parsed.effective_sections();
    if let Some(index) = tn.section {
        return sections.get(index).map(|s| (index, s));
    }
    // Blank sections (a STEP marker directly followed by a node marker)
    // have nothing a label binding could edit.
    let found = locate_in(
        &tn.label,
        sections
            .iter()
            .filter(|s| !s.primary_body.trim().is_empty() || s.has_input()),
    )?;
    let index = sections.iter().position(|s| std::ptr::eq(s, found))?;
    Some((index, found))
}

fn derived_node(id: String, kind: NodeKind, section: &Section, index: usize) -> TemplateNode {
    let mut params = NodeParams::default_for(kind);
    let category = match &mut params {
        NodeParams::Execute(p) => {
            if let Some(primitive) = Primitive::infer(&section.name) {
                p.primitive = primitive;
            }
            p.primitive.name().to_string()
        }
        NodeParams::Circuit(_) => "Circuit".to_string(),
        NodeParams::Transpile(_) => "Transpiler".to_string(),
        NodeParams::PostProcess(_) => "Post-process".to_string(),
    };

    TemplateNode {
        id: id.into(),
        label: section.name.clone(),
        category,
        params,
        section: Some(index),
        metadata: BTreeMap::new(),
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "node".to_string()
    } else {
        slug.to_string()
    }
}
