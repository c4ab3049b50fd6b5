use agent_providers::AgentError;

/// Message recorded when the agent reports a failed run
pub const AGENT_FAILED_MESSAGE: &str = "Agent execution failed.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    AgentFailed(String),
    #[error("Agent provider error: {0}")]
    Provider(#[from] AgentError),
}

impl QueryError {
    pub fn agent_failed() -> Self {
        Self::AgentFailed(AGENT_FAILED_MESSAGE.to_string())
    }
}
