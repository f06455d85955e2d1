//! Templates and composition working together.

use qstudio_graph::{
    ExecuteParams, Node, NodeKind, NodeParams, Primitive, ProgramGraph, Template, compose,
};

// ============================================================================
// Helpers
// ============================================================================

fn chsh_graph() -> ProgramGraph {
    let mut g = ProgramGraph::new();
    g.add_node(Node::new("circuit", NodeKind::Circuit, "CHSH Circuit"))
        .unwrap();
    g.add_node(Node::new("transpile", NodeKind::Transpile, "Transpiler"))
        .unwrap();
    g.add_node(
        Node::new("estimator", NodeKind::Execute, "Estimator")
            .with_category("Estimator")
            .with_params(NodeParams::Execute(ExecuteParams {
                primitive: Primitive::Estimator,
                resilience_level: 1,
                ..ExecuteParams::default()
            })),
    )
    .unwrap();
    g.add_node(Node::new("plot", NodeKind::PostProcess, "Plot"))
        .unwrap();
    g.connect(&"circuit".into(), &"transpile".into()).unwrap();
    g.connect(&"transpile".into(), &"estimator".into()).unwrap();
    g.connect(&"estimator".into(), &"plot".into()).unwrap();
    g
}

// ============================================================================
// Round trips through source text
// ============================================================================

#[test]
fn test_composed_source_derives_same_pipeline() {
    let graph = chsh_graph();
    let source = compose(&graph);

    let template = Template::from_source("chsh", source);
    let labels: Vec<_> = template.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["CHSH Circuit", "Transpiler", "Estimator", "Plot"]);

    let kinds: Vec<_> = template.nodes.iter().map(|n| n.params.kind()).collect();
    let original: Vec<_> = graph.nodes().map(Node::kind).collect();
    assert_eq!(kinds, original);
}

#[test]
fn test_instantiated_fragments_match_composition() {
    let graph = chsh_graph();
    let source = compose(&graph);
    let inst = Template::from_source("chsh", source.clone())
        .instantiate()
        .unwrap();

    assert_eq!(inst.bindings.len(), 4);
    for binding in &inst.bindings {
        assert!(source.contains(&binding.primary));
        let node = inst.graph.node(&binding.node_id).unwrap();
        assert_eq!(node.primary_fragment.as_deref(), Some(binding.primary.as_str()));
    }
}

// ============================================================================
// Manifests
// ============================================================================

#[test]
fn test_manifest_with_cycle_is_rejected() {
    let yaml = r###"
id: loop
source: "## STEP 1 : Map\nx = 1\n"
nodes:
  - { id: a, label: Map, params: { kind: circuit } }
  - { id: b, label: Other, params: { kind: transpile } }
edges:
  - { source: a, target: b }
  - { source: b, target: a }
"###;
    let template = Template::from_manifest_str(yaml, None).unwrap();
    assert!(template.instantiate().is_err());
}

#[test]
fn test_manifest_label_skips_blank_step_sections() {
    let yaml = r###"
id: stock
source: "## STEP 1 : Mapping the problem\n\n###[Graph]\nqc = QuantumCircuit(1)\n"
nodes:
  - { id: map, label: Map, params: { kind: circuit } }
  - { id: graph, label: Graph, params: { kind: circuit } }
"###;
    let inst = Template::from_manifest_str(yaml, None)
        .unwrap()
        .instantiate()
        .unwrap();

    let bound: Vec<&str> = inst.bindings.iter().map(|b| b.node_id.as_str()).collect();
    assert_eq!(bound, ["graph"]);
    assert_eq!(inst.bindings[0].primary, "qc = QuantumCircuit(1)\n");
    assert!(inst.graph.node(&"map".into()).unwrap().primary_fragment.is_none());
}

#[test]
fn test_manifest_with_unknown_kind_fails_to_parse() {
    let yaml = r#"
id: bad
source: "x = 1\n"
nodes:
  - { id: a, label: A, params: { kind: measure } }
"#;
    assert!(Template::from_manifest_str(yaml, None).is_err());
}

#[test]
fn test_unmarked_source_binds_to_whole_document() {
    let yaml = r#"
id: plain
source: "qc = QuantumCircuit(1)\n"
nodes:
  - { id: a, label: Anything, params: { kind: circuit } }
"#;
    let inst = Template::from_manifest_str(yaml, None)
        .unwrap()
        .instantiate()
        .unwrap();
    assert_eq!(inst.bindings.len(), 1);
    assert_eq!(inst.bindings[0].primary, "qc = QuantumCircuit(1)\n");
}
