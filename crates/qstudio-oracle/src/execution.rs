//! Execution service: run a program source and collect its output.

use async_trait::async_trait;
use qstudio_graph::ResultPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::{EndpointConfig, JsonClient};
use crate::error::OracleResult;
use crate::extract::{extract_result, normalize_output};

/// Default runtime channel.
pub const DEFAULT_CHANNEL: &str = "ibm_quantum";

/// Credentials for a remote quantum runtime.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredentials {
    /// API token.
    pub token: String,
    /// Runtime channel.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Instance CRN.
    #[serde(default)]
    pub instance: Option<String>,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl std::fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("token", &"[REDACTED]")
            .field("channel", &self.channel)
            .field("instance", &self.instance)
            .field("region", &self.region)
            .finish()
    }
}

impl BackendCredentials {
    /// Credentials on the default channel.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: default_channel(),
            instance: None,
            region: None,
        }
    }
}

/// A request to run a program.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Program source.
    pub input_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibm_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl std::fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("input_value", &format_args!("<{} bytes>", self.input_value.len()))
            .field("ibm_token", &self.ibm_token.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .field("instance", &self.instance)
            .field("region", &self.region)
            .finish()
    }
}

impl ExecutionRequest {
    /// Run `source` on whatever backend the service defaults to.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            input_value: source.into(),
            ibm_token: None,
            channel: None,
            instance: None,
            region: None,
        }
    }

    /// Run against a remote runtime.
    pub fn with_credentials(mut self, credentials: &BackendCredentials) -> Self {
        self.ibm_token = Some(credentials.token.clone());
        self.channel = Some(credentials.channel.clone());
        self.instance.clone_from(&credentials.instance);
        self.region.clone_from(&credentials.region);
        self
    }
}

/// Program output as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResponse {
    /// Captured stdout/stderr, or an error description.
    pub output: String,
}

impl ExecutionResponse {
    /// Output with double-escaped newlines normalized.
    pub fn text(&self) -> String {
        normalize_output(&self.output).into_owned()
    }

    /// The typed result printed by the program, if any.
    pub fn result(&self) -> Option<ResultPayload> {
        extract_result(&self.output)
    }
}

/// Something that runs programs.
#[async_trait]
pub trait ExecutionOracle: Send + Sync {
    /// Run the program in `request`.
    async fn execute(&self, request: &ExecutionRequest) -> OracleResult<ExecutionResponse>;
}

/// HTTP client for the execution service.
#[derive(Debug)]
pub struct HttpExecutionOracle {
    client: JsonClient,
}

impl HttpExecutionOracle {
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
impl ExecutionOracle for HttpExecutionOracle {
    #[instrument(skip(self, request), fields(bytes = request.input_value.len(), remote = request.ibm_token.is_some()))]
    async fn execute(&self, request: &ExecutionRequest) -> OracleResult<ExecutionResponse> {
        debug!("Submitting program for execution");
        self.client.post(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_request_omits_credentials() {
        let value = serde_json::to_value(ExecutionRequest::new("print(1)")).unwrap();
        assert_eq!(value, json!({"input_value": "print(1)"}));
    }

    #[test]
    fn test_remote_request_fields() {
        let creds = BackendCredentials {
            instance: Some("crn:v1:abc".into()),
            ..BackendCredentials::new("tok")
        };
        let value = serde_json::to_value(ExecutionRequest::new("x").with_credentials(&creds)).unwrap();
        assert_eq!(
            value,
            json!({
                "input_value": "x",
                "ibm_token": "tok",
                "channel": "ibm_quantum",
                "instance": "crn:v1:abc"
            })
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = BackendCredentials::new("very-secret");
        assert!(!format!("{creds:?}").contains("very-secret"));
        let req = ExecutionRequest::new("x").with_credentials(&creds);
        assert!(!format!("{req:?}").contains("very-secret"));
    }

    #[test]
    fn test_response_result() {
        let resp: ExecutionResponse = serde_json::from_str(
            r#"{"output": "RESULT: {\"type\": \"text\", \"content\": \"42\"}\nlog line\n"}"#,
        )
        .unwrap();
        assert_eq!(resp.result(), Some(ResultPayload::text("42")));

        let plain = ExecutionResponse {
            output: "Error executing code: boom".into(),
        };
        assert_eq!(plain.result(), None);
        assert_eq!(plain.text(), "Error executing code: boom");
    }

    #[test]
    fn test_credentials_default_channel() {
        let creds: BackendCredentials = serde_json::from_str(r#"{"token": "t"}"#).unwrap();
        assert_eq!(creds.channel, DEFAULT_CHANNEL);
    }
}
