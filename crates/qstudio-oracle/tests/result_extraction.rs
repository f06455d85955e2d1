//! RESULT extraction against realistic program output.

use qstudio_graph::ResultKind;
use qstudio_oracle::{ExecutionResponse, extract_result};
use serde_json::json;

#[test]
fn test_maxcut_counts_between_runtime_logs() {
    let output = "\
Transpiling for backend aer_simulator
>>> Job ID: 1f3e
>>> Job Status: DONE
RESULT: {\"type\": \"plot\", \"content\": {\"00101\": 211, \"11010\": 198, \"01011\": 77}}
Finished in 3.2s
";
    let payload = extract_result(output).unwrap();
    assert_eq!(payload.kind, ResultKind::Plot);
    assert_eq!(payload.content["00101"], json!(211));
}

#[test]
fn test_pretty_printed_graph_payload() {
    let output = "\
RESULT: {
    \"type\": \"graph\",
    \"content\": {
        \"nodes\": [0, 1, 2],
        \"edges\": [[0, 1], [1, 2]],
        \"label\": \"cut {0} | {1, 2}\"
    }
}
";
    let payload = extract_result(output).unwrap();
    assert_eq!(payload.kind, ResultKind::Graph);
    assert_eq!(payload.content["label"], json!("cut {0} | {1, 2}"));
}

#[test]
fn test_escaped_newlines_from_service() {
    let response = ExecutionResponse {
        output: "Energy: -1.137\\\\nRESULT: {\"type\": \"text\", \"content\": \"-1.137\"}\\\\n".into(),
    };
    assert!(response.text().starts_with("Energy: -1.137\nRESULT:"));
    assert_eq!(response.result().unwrap().content, json!("-1.137"));
}

#[test]
fn test_error_output_has_no_result() {
    let response = ExecutionResponse {
        output: "Error executing code: name 'backend' is not defined\nTraceback ...".into(),
    };
    assert!(response.result().is_none());
}
