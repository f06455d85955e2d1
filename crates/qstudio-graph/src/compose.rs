//! Source composition for graphs without a template.
//!
//! Nodes are emitted in topological order. A `## STEP n : <role>` marker
//! opens whenever the role changes and every node gets its own `###[label]`
//! section, so the result parses back into one section per node.

use qstudio_source::marker::{MarkerLine, classify, node_marker, step_marker};
use qstudio_source::StepRole;

use crate::graph::ProgramGraph;
use crate::node::Node;
use crate::params::{CircuitParams, ExecuteParams, NodeKind, NodeParams, Primitive};
use crate::result::ResultKind;

/// Compose a full program source from the graph.
pub fn compose(graph: &ProgramGraph) -> String {
    let mut emitter = Emitter::new();
    emitter.emit_graph(graph);
    emitter.output
}

/// Default code for a node, derived from its kind, parameters and upstream nodes.
pub fn generate(graph: &ProgramGraph, node: &Node) -> String {
    let mut emitter = Emitter::new();
    emitter.emit_generated(graph, node);
    emitter.output
}

struct Emitter {
    output: String,
    indent: usize,
}

impl Emitter {
    fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    fn writeln(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn emit_graph(&mut self, graph: &ProgramGraph) {
        let mut step = 0;
        let mut role: Option<StepRole> = None;

        for id in graph.topological_order() {
            let Some(node) = graph.node(&id) else {
                continue;
            };

            let node_role = node.kind().role();
            if role != Some(node_role) {
                if step > 0 {
                    self.writeln("");
                }
                step += 1;
                role = Some(node_role);
                self.output.push_str(&step_marker(step, node_role.title()));
            }

            self.output.push_str(&node_marker(&node.display_name));
            let mut body = match &node.primary_fragment {
                Some(code) => code.clone(),
                None => generate(graph, node),
            };
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            if let Some(raw) = &node.raw_input_fragment {
                body = with_input_region(&body, raw);
            }
            self.output.push_str(&body);
        }
    }

    fn emit_generated(&mut self, graph: &ProgramGraph, node: &Node) {
        match &node.params {
            NodeParams::Circuit(p) => self.emit_circuit(p),
            NodeParams::Transpile(p) => {
                self.writeln("from qiskit.transpiler.preset_passmanagers import generate_preset_pass_manager");
                self.writeln("");
                self.writeln(&format!(
                    "pm = generate_preset_pass_manager(optimization_level={}, backend=backend)",
                    p.optimization_level
                ));
                self.writeln("isa_circuit = pm.run(circuit)");
            }
            NodeParams::Execute(p) => {
                let transpiled = graph
                    .ancestors(&node.id)
                    .iter()
                    .any(|n| n.kind() == NodeKind::Transpile);
                let input = if transpiled { "isa_circuit" } else { "circuit" };
                self.emit_execute(p, input);
            }
            NodeParams::PostProcess(p) => {
                let upstream = graph.ancestors(&node.id).into_iter().find_map(|n| match &n.params {
                    NodeParams::Execute(e) => Some(e.primitive),
                    _ => None,
                });
                self.emit_post_process(p.output, upstream);
            }
        }
    }

    fn emit_circuit(&mut self, p: &CircuitParams) {
        self.writeln("from qiskit import QuantumCircuit");
        self.writeln("");
        self.writeln(&format!("circuit = QuantumCircuit({})", p.num_qubits));
        let entangle = |e: &mut Self| {
            e.writeln("circuit.h(0)");
            e.writeln(&format!("for qubit in range(1, {}):", p.num_qubits));
            e.indented(|e| e.writeln("circuit.cx(0, qubit)"));
        };
        if p.reps > 1 {
            self.writeln(&format!("for _ in range({}):", p.reps));
            self.indented(entangle);
        } else {
            entangle(self);
        }
        self.writeln("circuit.measure_all()");
    }

    fn emit_execute(&mut self, p: &ExecuteParams, input: &str) {
        match p.primitive {
            Primitive::Sampler => {
                self.writeln("from qiskit_ibm_runtime import SamplerV2 as Sampler");
                self.writeln("");
                self.writeln("sampler = Sampler(mode=backend)");
                self.writeln(&format!("sampler.options.default_shots = {}", p.shots));
                self.writeln(&format!("job = sampler.run([{input}])"));
                self.writeln("result = job.result()[0]");
                self.writeln("counts = result.data.meas.get_counts()");
            }
            Primitive::Estimator => {
                self.writeln("from qiskit.quantum_info import SparsePauliOp");
                self.writeln("from qiskit_ibm_runtime import EstimatorV2 as Estimator");
                self.writeln("");
                self.writeln("estimator = Estimator(mode=backend)");
                self.writeln(&format!(
                    "estimator.options.resilience_level = {}",
                    p.resilience_level
                ));
                self.writeln(&format!(
                    "estimator.options.default_shots = {}",
                    p.shots
                ));
                self.writeln(&format!(
                    "observable = SparsePauliOp(\"Z\" * {input}.num_qubits)"
                ));
                self.writeln(&format!("job = estimator.run([({input}, observable)])"));
                self.writeln("result = job.result()[0]");
            }
        }
    }

    fn emit_post_process(&mut self, output: ResultKind, upstream: Option<Primitive>) {
        let content = match (output, upstream) {
            (ResultKind::Text, None) => "\"no result\"",
            (ResultKind::Text, Some(_)) => "str(result)",
            (_, Some(Primitive::Sampler)) => "counts",
            (_, Some(Primitive::Estimator)) => "result.data.evs.tolist()",
            (_, None) => "[]",
        };
        self.writeln("import json");
        self.writeln("");
        let mut line = String::from("print(f'RESULT: {json.dumps({\"type\": \"");
        line.push_str(output.as_str());
        line.push_str("\", \"content\": ");
        line.push_str(content);
        line.push_str("})}')");
        self.writeln(&line);
    }
}

/// Put `raw` inside the body's input region, adding a region if it has none.
fn with_input_region(body: &str, raw: &str) -> String {
    let mut raw = raw.to_string();
    if !raw.is_empty() && !raw.ends_with('\n') {
        raw.push('\n');
    }

    let mut out = String::with_capacity(body.len() + raw.len());
    let mut inside = false;
    let mut replaced = false;
    for line in body.split_inclusive('\n') {
        match classify(line.trim_end_matches(['\r', '\n'])) {
            Some(MarkerLine::InputStart) if !replaced => {
                inside = true;
                out.push_str(line);
                out.push_str(&raw);
            }
            Some(MarkerLine::InputEnd) if inside => {
                inside = false;
                replaced = true;
                out.push_str(line);
            }
            _ if inside => {}
            _ => out.push_str(line),
        }
    }

    if inside {
        // Unclosed region: keep the original body.
        return body.to_string();
    }
    if !replaced {
        out.push_str("#### INPUT PYTHON\n");
        out.push_str(&raw);
        out.push_str("#### END INPUT PYTHON\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qstudio_source::{find, parse};

    use crate::node::Node;

    fn pipeline() -> ProgramGraph {
        let mut g = ProgramGraph::new();
        g.add_node(Node::new("c", NodeKind::Circuit, "Bell Circuit")).unwrap();
        g.add_node(Node::new("t", NodeKind::Transpile, "Transpiler")).unwrap();
        g.add_node(Node::new("s", NodeKind::Execute, "Sampler").with_params(
            NodeParams::Execute(ExecuteParams {
                primitive: Primitive::Sampler,
                shots: 500,
                ..ExecuteParams::default()
            }),
        ))
        .unwrap();
        g.add_node(Node::new("p", NodeKind::PostProcess, "Histogram")).unwrap();
        g.connect(&"c".into(), &"t".into()).unwrap();
        g.connect(&"t".into(), &"s".into()).unwrap();
        g.connect(&"s".into(), &"p".into()).unwrap();
        g
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(compose(&ProgramGraph::new()), "");
    }

    #[test]
    fn test_composed_source_parses_into_node_sections() {
        let g = pipeline();
        let text = compose(&g);
        let parsed = parse(&text);
        assert!(parsed.warnings.is_empty());

        let steps: Vec<_> = parsed.sections.iter().filter_map(|s| s.step).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));

        for node in g.nodes() {
            let body = find(&node.display_name, &parsed.sections).unwrap();
            assert!(body.contains(generate(&g, node).lines().next().unwrap()));
        }
        assert!(text.starts_with("## STEP 1 : Mapping the problem\n###[Bell Circuit]\n"));
        assert!(text.contains("## STEP 4 : Post-process\n###[Histogram]\n"));
    }

    #[test]
    fn test_generator_follows_upstream() {
        let g = pipeline();
        let sampler = generate(&g, g.node(&"s".into()).unwrap());
        assert!(sampler.contains("job = sampler.run([isa_circuit])"));
        assert!(sampler.contains("default_shots = 500"));

        let post = generate(&g, g.node(&"p".into()).unwrap());
        assert_eq!(
            post.lines().last().unwrap(),
            r#"print(f'RESULT: {json.dumps({"type": "text", "content": str(result)})}')"#
        );
    }

    #[test]
    fn test_execute_without_transpiler_uses_circuit() {
        let mut g = ProgramGraph::new();
        g.add_node(Node::new("c", NodeKind::Circuit, "Circuit")).unwrap();
        g.add_node(Node::new("e", NodeKind::Execute, "Estimator")).unwrap();
        g.connect(&"c".into(), &"e".into()).unwrap();
        let code = generate(&g, g.node(&"e".into()).unwrap());
        assert!(code.contains("estimator.run([(circuit, observable)])"));
    }

    #[test]
    fn test_primary_fragment_emitted_verbatim() {
        let mut g = pipeline();
        g.set_primary_fragment(&"t".into(), Some("pm = custom()".into()))
            .unwrap();
        let text = compose(&g);
        assert!(text.contains("###[Transpiler]\npm = custom()\n"));
    }

    #[test]
    fn test_same_role_shares_step() {
        let mut g = ProgramGraph::new();
        g.add_node(Node::new("a", NodeKind::Execute, "ESTIMATOR")).unwrap();
        g.add_node(Node::new("b", NodeKind::Execute, "ESTIMATOR 2")).unwrap();
        let text = compose(&g);
        assert_eq!(text.matches("## STEP").count(), 1);
        assert_eq!(text.matches("###[").count(), 2);
    }

    #[test]
    fn test_reps_wrap_entangling_layer() {
        let mut g = ProgramGraph::new();
        g.add_node(Node::new("c", NodeKind::Circuit, "GHZ").with_params(NodeParams::Circuit(
            CircuitParams {
                num_qubits: 3,
                reps: 2,
            },
        )))
        .unwrap();
        let code = generate(&g, g.node(&"c".into()).unwrap());
        assert!(code.contains("for _ in range(2):\n    circuit.h(0)\n    for qubit in range(1, 3):\n        circuit.cx(0, qubit)\n"));
    }

    #[test]
    fn test_raw_input_region() {
        let appended = with_input_region("x = 1\n", "n = 4");
        assert_eq!(appended, "x = 1\n#### INPUT PYTHON\nn = 4\n#### END INPUT PYTHON\n");

        let replaced = with_input_region(&appended, "n = 8\n");
        assert_eq!(replaced, "x = 1\n#### INPUT PYTHON\nn = 8\n#### END INPUT PYTHON\n");

        let unclosed = "#### INPUT PYTHON\nold\n";
        assert_eq!(with_input_region(unclosed, "new"), unclosed);
    }
}
