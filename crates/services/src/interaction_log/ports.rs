use crate::history::ConversationTurn;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// One finished query, as written to the interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionLogEntry {
    /// RFC 3339 with millisecond precision
    pub timestamp: String,
    pub user_prompt: String,
    pub assistant_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ConversationTurn>>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InteractionLogEntry {
    pub fn new(
        at: DateTime<Utc>,
        user_prompt: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            user_prompt: user_prompt.into(),
            assistant_response: assistant_response.into(),
            metadata: None,
            history: None,
            success: true,
            error: None,
        }
    }

    /// Empty metadata is omitted from the record
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = (!metadata.is_empty()).then_some(metadata);
        self
    }

    /// Empty history is omitted from the record
    pub fn with_history(mut self, history: &[ConversationTurn]) -> Self {
        self.history = (!history.is_empty()).then(|| history.to_vec());
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Sink for per-query bookkeeping records
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait InteractionLogger: Send + Sync {
    async fn log(&self, entry: InteractionLogEntry) -> anyhow::Result<()>;
}
