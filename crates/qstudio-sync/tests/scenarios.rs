//! End-to-end editing scenarios.
//!
//! Sessions are driven through `SessionHandle` with in-process oracles, so
//! the tests cover the queueing, deduplication and timeout paths without a
//! network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qstudio_graph::{NodeKind, NodeParams, ResultKind, ResultPayload, Template, TemplateNode};
use qstudio_oracle::{
    CodegenOracle, CodegenRequest, ExecutionOracle, ExecutionRequest, ExecutionResponse,
    OracleError, OracleResult,
};
use qstudio_sync::{EditorSession, ParameterUpdate, SessionHandle, SyncError};
use serde_json::json;

const MAP_EXECUTE: &str = "\
import json
## STEP 1 : Map
mol = build(\"H2\", basis=\"sto3g\")
qc = ansatz(mol)

## STEP 2 : Execute
job = estimator.run([(qc, op)])
print(job.result())
";

const PIPELINE: &str = "\
## STEP 0 : IBM Quantum Config
from qiskit_ibm_runtime import QiskitRuntimeService
service = QiskitRuntimeService()
backend = service.least_busy(operational=True, simulator=False)

## STEP 1 : Mapping the problem
###[Graph Problem]
graph = rx.PyGraph()
#### INPUT PYTHON
graph.add_nodes_from(range(4))
#### END INPUT PYTHON

## STEP 2 : Optimize Circuit
###[Transpiler]
pm = generate_preset_pass_manager(optimization_level=1, backend=backend)
isa = pm.run(qc)

## STEP 3 : Execute
###[Estimator]
estimator = Estimator(mode=backend)
estimator.options.resilience_level = 1
job = estimator.run([(isa, op)])

## STEP 4 : Post-process
###[Energy]
print(f\"RESULT: {json.dumps({'type': 'text', 'content': str(job.result())})}\")
";

// ============================================================================
// Mock oracles
// ============================================================================

/// Answers after `delay` with `template`, `{value}` replaced by the new value.
struct ScriptedCodegen {
    calls: AtomicUsize,
    delay: Duration,
    template: String,
}

impl ScriptedCodegen {
    fn new(delay: Duration, template: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            template: template.to_string(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodegenOracle for ScriptedCodegen {
    async fn generate(&self, request: &CodegenRequest) -> OracleResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self
            .template
            .replace("{value}", &request.new_value.to_string()))
    }
}

struct CannedExecution {
    output: String,
    seen: std::sync::Mutex<Option<ExecutionRequest>>,
}

#[async_trait]
impl ExecutionOracle for CannedExecution {
    async fn execute(&self, request: &ExecutionRequest) -> OracleResult<ExecutionResponse> {
        *self.seen.lock().unwrap() = Some(request.clone());
        Ok(ExecutionResponse {
            output: self.output.clone(),
        })
    }
}

fn loaded(source: &str) -> EditorSession {
    let mut session = EditorSession::new();
    session
        .load_template(&Template::from_source("scenario", source))
        .unwrap();
    session
}

fn step_two(text: &str) -> &str {
    let at = text.find("## STEP 2").expect("step 2 marker");
    &text[at..]
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn test_editing_map_leaves_execute_step_intact() {
    let mut session = loaded(MAP_EXECUTE);
    assert_eq!(session.source(), MAP_EXECUTE);

    session
        .set_primary_fragment(&"map".into(), "mol = build(\"LiH\", basis=\"6-31g\")\nqc = ansatz(mol)\n\n")
        .unwrap();

    let rebuilt = session.source();
    assert_eq!(step_two(rebuilt), step_two(MAP_EXECUTE));
    let step_one = &rebuilt[..rebuilt.find("## STEP 2").unwrap()];
    assert!(step_one.starts_with("import json\n## STEP 1 : Map\n"));
    assert!(step_one.contains("build(\"LiH\", basis=\"6-31g\")"));
    assert!(session.skipped().is_empty());
}

#[test]
fn test_rebuild_is_stable_across_unrelated_mutations() {
    let mut session = loaded(PIPELINE);
    session
        .set_raw_input(&"graph-problem".into(), "graph.add_nodes_from(range(6))\n")
        .unwrap();
    let first = session.source().to_string();

    // Metadata changes do not touch the source.
    session
        .begin_parameter_change(&"energy".into(), "notes", json!("plot later"))
        .unwrap();
    assert_eq!(session.source(), first);
    assert!(first.contains("#### INPUT PYTHON\ngraph.add_nodes_from(range(6))\n#### END INPUT PYTHON\n"));
}

#[test]
fn test_pending_resolves_when_text_appears_anywhere() {
    let source = "## STEP 1 : Map\nX = 1\n";
    let circuit = NodeParams::default_for(NodeKind::Circuit);
    let template = Template {
        id: "pending".into(),
        name: "pending".into(),
        source: source.to_string(),
        nodes: vec![
            TemplateNode {
                id: "bound".into(),
                label: "Map".into(),
                category: "Circuit".into(),
                params: circuit.clone(),
                section: None,
                metadata: Default::default(),
            },
            TemplateNode {
                id: "floating".into(),
                label: "Nowhere".into(),
                category: String::new(),
                params: circuit,
                section: None,
                metadata: Default::default(),
            },
        ],
        edges: vec![],
    };

    let mut session = EditorSession::new();
    session.load_template(&template).unwrap();
    assert_eq!(session.baselines().len(), 1);

    // The floating node owns no section, so its new code cannot show up yet.
    let ticket = match session
        .begin_parameter_change(&"floating".into(), "num_qubits", json!(3))
        .unwrap()
    {
        qstudio_sync::ParameterOutcome::Dispatch(ticket) => ticket,
        other => panic!("unexpected outcome: {other:?}"),
    };
    let update = session
        .complete_parameter_change(ticket, Ok("X = 2\n".to_string()))
        .unwrap();
    assert_eq!(update, ParameterUpdate::Regenerated { pending: true });
    assert!(session.source().contains("X = 1"));
    assert!(session.is_updating(&"floating".into()));

    session.set_primary_fragment(&"bound".into(), "X = 2\n").unwrap();
    assert!(!session.is_updating(&"floating".into()));
    assert!(session.pending_nodes().is_empty());
}

// ============================================================================
// Parameter requests through the session handle
// ============================================================================

#[tokio::test]
async fn test_identical_requests_issue_one_call() {
    let oracle = ScriptedCodegen::new(
        Duration::from_millis(50),
        "pm = generate_preset_pass_manager(optimization_level={value}, backend=backend)\nisa = pm.run(qc)\n\n",
    );
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle.clone(), Duration::from_secs(5));

    let (first, second) = tokio::join!(
        handle.request_parameter_change("transpiler".into(), "optimization_level", json!(3)),
        handle.request_parameter_change("transpiler".into(), "optimization_level", json!(3)),
    );

    assert_eq!(oracle.calls(), 1);
    let mut outcomes = [first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|u| matches!(u, ParameterUpdate::Duplicate));
    assert_eq!(outcomes[0], ParameterUpdate::Regenerated { pending: false });
    assert_eq!(outcomes[1], ParameterUpdate::Duplicate);

    let source = handle.source().await.unwrap();
    assert!(source.contains("optimization_level=3"));

    // Released after completion: the same request goes out again.
    handle
        .request_parameter_change("transpiler".into(), "optimization_level", json!(3))
        .await
        .unwrap();
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_different_values_are_not_deduplicated() {
    let oracle = ScriptedCodegen::new(Duration::from_millis(10), "optimization_level={value}\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle.clone(), Duration::from_secs(5));

    let (a, b) = tokio::join!(
        handle.request_parameter_change("transpiler".into(), "optimization_level", json!(2)),
        handle.request_parameter_change("transpiler".into(), "optimization_level", json!(3)),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_releases_request_key() {
    let oracle = ScriptedCodegen::new(Duration::from_secs(30), "never\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle.clone(), Duration::from_secs(1));

    let err = handle
        .request_parameter_change("estimator".into(), "shots", json!(4096))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Oracle(OracleError::Timeout(_))));
    assert!(!handle.is_updating("estimator".into()).await.unwrap());

    let source = handle.source().await.unwrap();
    assert_eq!(source, PIPELINE);

    let _ = handle
        .request_parameter_change("estimator".into(), "shots", json!(4096))
        .await;
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_response_after_template_switch_is_discarded() {
    let oracle = ScriptedCodegen::new(Duration::from_secs(2), "optimization_level={value}\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle.clone(), Duration::from_secs(10));

    let reload = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle
            .with_session(|s| s.load_template(&Template::from_source("other", MAP_EXECUTE)))
            .await
            .unwrap()
            .unwrap();
    };
    let (update, ()) = tokio::join!(
        handle.request_parameter_change("transpiler".into(), "optimization_level", json!(0)),
        reload,
    );

    assert_eq!(update.unwrap(), ParameterUpdate::Stale);
    assert_eq!(handle.source().await.unwrap(), MAP_EXECUTE);
}

#[tokio::test]
async fn test_invalid_value_never_reaches_oracle() {
    let oracle = ScriptedCodegen::new(Duration::ZERO, "x\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle.clone(), Duration::from_secs(1));

    let err = handle
        .request_parameter_change("estimator".into(), "resilience_level", json!(7))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Graph(_)));
    assert_eq!(oracle.calls(), 0);
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_result_line_reaches_post_processing_node() {
    let oracle = ScriptedCodegen::new(Duration::ZERO, "x\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle, Duration::from_secs(1));
    let execution = CannedExecution {
        output: "Using local simulator...\n\
                 RESULT: {\"type\": \"text\", \"content\": \"42\"}\n\
                 Job finished {in 3s}\n\
                 }\n"
            .to_string(),
        seen: std::sync::Mutex::new(None),
    };

    let report = handle.run(&execution, None).await.unwrap();
    assert_eq!(report.result, Some(ResultPayload::text("42")));
    assert_eq!(report.routed_to, Some("energy".into()));
    assert!(report.output.contains("Job finished"));

    let sent = execution.seen.lock().unwrap().clone().unwrap();
    assert!(sent.ibm_token.is_none());
    assert!(sent.input_value.contains("AerSimulator()"));
    assert!(!sent.input_value.contains(".options."));
    assert!(!sent.input_value.contains("QiskitRuntimeService"));

    let output = handle
        .with_session(|s| s.graph().node(&"energy".into()).and_then(|n| n.output.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(output.kind, ResultKind::Text);
    assert_eq!(output.content, json!("42"));

    // The displayed source keeps the original config step.
    assert_eq!(handle.source().await.unwrap(), PIPELINE);
}

#[tokio::test]
async fn test_malformed_result_is_ignored() {
    let oracle = ScriptedCodegen::new(Duration::ZERO, "x\n");
    let handle = SessionHandle::spawn(loaded(PIPELINE), oracle, Duration::from_secs(1));
    let execution = CannedExecution {
        output: "RESULT: {\"type\": \"table\", \"content\": 1}\nTraceback ...\n".to_string(),
        seen: std::sync::Mutex::new(None),
    };

    let report = handle.run(&execution, None).await.unwrap();
    assert!(report.result.is_none());
    assert!(report.routed_to.is_none());
    assert!(report.output.starts_with("RESULT:"));
}
