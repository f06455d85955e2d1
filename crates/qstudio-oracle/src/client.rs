//! JSON-over-HTTP plumbing shared by the service clients.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{OracleError, OracleResult};

/// Connection settings for one service endpoint.
#[derive(Clone)]
pub struct EndpointConfig {
    /// Full URL requests are POSTed to.
    pub url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Optional bearer token for the service itself.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EndpointConfig {
    /// Settings for `url` with a 60s request and 10s connect timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            api_key: None,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// POSTs JSON to a single endpoint.
pub(crate) struct JsonClient {
    client: Client,
    url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for JsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonClient")
            .field("url", &self.url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl JsonClient {
    pub(crate) fn new(config: &EndpointConfig) -> OracleResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| OracleError::InvalidEndpoint(format!("{}: {e}", config.url)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(OracleError::Http)?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    pub(crate) fn url(&self) -> &str {
        self.url.as_str()
    }

    /// POST `body`, returning the deserialized JSON answer.
    pub(crate) async fn post<T: DeserializeOwned>(&self, body: &impl Serialize) -> OracleResult<T> {
        debug!("POST {}", self.url);

        let mut request = self.client.post(self.url.clone()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.timeout)
            } else {
                OracleError::Http(e)
            }
        })?;

        handle_response(resp).await
    }
}

/// Deserialize a success body or turn the status into an error.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> OracleResult<T> {
    let status = response.status();

    if status.is_success() {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    } else {
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if message.is_empty() => {
                Err(OracleError::ApiError {
                    status: status.as_u16(),
                    message: "not authorized".into(),
                })
            }
            _ => Err(OracleError::ApiError {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint() {
        let err = JsonClient::new(&EndpointConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, OracleError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = EndpointConfig::new("http://localhost:8000/run").with_api_key("secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));

        let client = JsonClient::new(&config).unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
        assert_eq!(client.url(), "http://localhost:8000/run");
    }
}
