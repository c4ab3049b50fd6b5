use crate::{sse_parser::SSEParser, AgentError, AgentEventStream, AgentProvider, AgentQuery};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header::HeaderValue, Client};
use tokio_util::sync::CancellationToken;

/// Configuration for the HTTP agent backend
#[derive(Debug, Clone)]
pub struct HttpAgentConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl HttpAgentConfig {
    pub fn new(base_url: String, api_key: Option<String>, timeout_seconds: Option<u64>) -> Self {
        Self {
            base_url,
            api_key,
            timeout_seconds: timeout_seconds.unwrap_or(300),
        }
    }
}

/// Agent sidecar reached over HTTP
///
/// `POST {base_url}/query` with the JSON-encoded [`AgentQuery`]; the sidecar
/// answers with `text/event-stream`, one agent message per `data:` line.
pub struct HttpAgentProvider {
    config: HttpAgentConfig,
    client: Client,
}

impl HttpAgentProvider {
    pub fn new(config: HttpAgentConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .read_timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.config.base_url.trim_end_matches('/'))
    }

    /// Build HTTP request headers
    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("text/event-stream"));

        if let Some(ref api_key) = self.config.api_key {
            let auth_value = format!("Bearer {api_key}");
            let header_value = HeaderValue::from_str(&auth_value)
                .map_err(|e| format!("Invalid API key format: {e}"))?;
            headers.insert("Authorization", header_value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl AgentProvider for HttpAgentProvider {
    async fn query_stream(
        &self,
        query: AgentQuery,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream, AgentError> {
        let url = self.query_url();
        let headers = self.build_headers().map_err(AgentError::Request)?;

        tracing::debug!(url = %url, history_turns = query.history.len(), "Starting agent query");

        let send = self.client.post(&url).headers(headers).json(&query).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AgentError::Request("Agent query cancelled before it started".to_string()));
            }
            response = send => response.map_err(|e| AgentError::Request(e.to_string()))?,
        };

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            return Err(AgentError::HttpError {
                status_code,
                message,
            });
        }

        // Dropping the body on cancellation closes the connection, which
        // tears the agent call down on the sidecar side
        let sse_stream =
            SSEParser::new(Box::pin(response.bytes_stream())).take_until(cancel.cancelled_owned());
        Ok(Box::pin(sse_stream))
    }
}
