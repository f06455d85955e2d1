//! Code-generation service: regenerate a node's code after a parameter change.

use async_trait::async_trait;
use qstudio_graph::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::{EndpointConfig, JsonClient};
use crate::error::{OracleError, OracleResult};
use crate::extract::extract_code;

/// A request to regenerate one node's code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenRequest {
    /// Node being edited.
    pub node_id: NodeId,
    /// Kind of that node.
    pub node_type: NodeKind,
    /// The node's code before the change.
    pub current_code: String,
    /// Changed parameter.
    pub parameter_name: String,
    /// New parameter value.
    pub new_value: Value,
    /// Node display label.
    pub node_label: String,
    /// Editor session the request belongs to.
    pub session_id: String,
}

/// Answer of the code-generation service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodegenResponse {
    /// Whether generation succeeded.
    pub success: bool,
    /// Generated code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CodegenResponse {
    /// Successful answer carrying `code`.
    pub fn ok(code: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(code.into()),
            error: None,
        }
    }

    /// Failed answer.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: None,
            error: Some(error.into()),
        }
    }

    /// The generated code, or why there is none.
    ///
    /// Markdown-fenced answers are unwrapped to their Python blocks.
    pub fn into_code(self) -> OracleResult<String> {
        if !self.success {
            return Err(OracleError::Rejected(
                self.error
                    .unwrap_or_else(|| "code generation failed".to_string()),
            ));
        }
        match self.code {
            Some(code) if !code.trim().is_empty() => Ok(extract_code(&code).into_owned()),
            _ => Err(OracleError::EmptyResponse),
        }
    }
}

/// Something that turns a parameter change into new node code.
#[async_trait]
pub trait CodegenOracle: Send + Sync {
    /// Generate code for `request`. Fails when the service fails or declines.
    async fn generate(&self, request: &CodegenRequest) -> OracleResult<String>;
}

/// HTTP client for the code-generation service.
#[derive(Debug)]
pub struct HttpCodegenOracle {
    client: JsonClient,
}

impl HttpCodegenOracle {
    /// Create a client for the given endpoint.
    pub fn new(config: &EndpointConfig) -> OracleResult<Self> {
        Ok(Self {
            client: JsonClient::new(config)?,
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        self.client.url()
    }
}

#[async_trait]
impl CodegenOracle for HttpCodegenOracle {
    #[instrument(skip(self, request), fields(node = %request.node_id, parameter = %request.parameter_name))]
    async fn generate(&self, request: &CodegenRequest) -> OracleResult<String> {
        debug!("Requesting code generation");
        let response: CodegenResponse = self.client.post(request).await?;
        response.into_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CodegenRequest {
        CodegenRequest {
            node_id: "transpiler".into(),
            node_type: NodeKind::Transpile,
            current_code: "pm = generate_preset_pass_manager(optimization_level=1)\n".into(),
            parameter_name: "optimization_level".into(),
            new_value: json!(3),
            node_label: "Transpiler".into(),
            session_id: "s-1".into(),
        }
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["nodeId"], json!("transpiler"));
        assert_eq!(value["nodeType"], json!("transpile"));
        assert_eq!(value["parameterName"], json!("optimization_level"));
        assert_eq!(value["newValue"], json!(3));
        assert_eq!(value["nodeLabel"], json!("Transpiler"));
        assert_eq!(value["sessionId"], json!("s-1"));
        assert!(value.get("currentCode").is_some());
    }

    #[test]
    fn test_response_into_code() {
        let ok: CodegenResponse =
            serde_json::from_str(r#"{"success": true, "code": "pm = x\n"}"#).unwrap();
        assert_eq!(ok.into_code().unwrap(), "pm = x\n");

        let fenced = CodegenResponse::ok("```python\npm = y\n```");
        assert_eq!(fenced.into_code().unwrap(), "pm = y");
    }

    #[test]
    fn test_response_failures() {
        let failed: CodegenResponse =
            serde_json::from_str(r#"{"success": false, "error": "quota"}"#).unwrap();
        assert!(matches!(failed.into_code(), Err(OracleError::Rejected(m)) if m == "quota"));

        let empty = CodegenResponse {
            success: true,
            code: Some("  \n".into()),
            error: None,
        };
        assert!(matches!(empty.into_code(), Err(OracleError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let config = EndpointConfig::new("http://127.0.0.1:9/generate")
            .with_timeout(std::time::Duration::from_secs(2));
        let oracle = HttpCodegenOracle::new(&config).unwrap();
        let err = oracle.generate(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Http(_) | OracleError::Timeout(_)));
    }
}
