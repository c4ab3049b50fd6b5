//! Scripted implementation of AgentProvider for testing
//!
//! A `MockAgentProvider` replays the same script for every call. Steps run
//! while the returned stream is being polled, so `MockStep::Action` closures
//! execute inside the caller's task (and see its task-local state), which is
//! how tests stand in for tools that record search results mid-stream.

use crate::{AgentError, AgentEventStream, AgentMessage, AgentProvider, AgentQuery};
use async_trait::async_trait;
use futures_util::stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub enum MockStep {
    /// Yield one upstream message
    Message(AgentMessage),
    /// Yield a stream error
    Error(AgentError),
    /// Wait before the next step (cut short by cancellation)
    Delay(Duration),
    /// Run a side effect in the polling task
    Action(Arc<dyn Fn() + Send + Sync>),
    /// Produce nothing more until cancelled
    Hang,
}

impl std::fmt::Debug for MockStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Delay(d) => f.debug_tuple("Delay").field(d).finish(),
            Self::Action(_) => f.write_str("Action(..)"),
            Self::Hang => f.write_str("Hang"),
        }
    }
}

impl MockStep {
    pub fn action(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Action(Arc::new(f))
    }
}

#[derive(Default)]
pub struct MockAgentProvider {
    script: Vec<MockStep>,
    start_error: Option<AgentError>,
    queries: Mutex<Vec<AgentQuery>>,
    cancel_tokens: Mutex<Vec<CancellationToken>>,
}

impl MockAgentProvider {
    pub fn new(script: Vec<MockStep>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub fn from_messages(messages: Vec<AgentMessage>) -> Self {
        Self::new(messages.into_iter().map(MockStep::Message).collect())
    }

    /// Fail every call before any message is produced
    pub fn with_start_error(mut self, error: AgentError) -> Self {
        self.start_error = Some(error);
        self
    }

    /// Queries received so far, in call order
    pub async fn queries(&self) -> Vec<AgentQuery> {
        self.queries.lock().await.clone()
    }

    /// Cancellation token handed to the most recent call
    pub async fn last_cancel_token(&self) -> Option<CancellationToken> {
        self.cancel_tokens.lock().await.last().cloned()
    }
}

#[async_trait]
impl AgentProvider for MockAgentProvider {
    async fn query_stream(
        &self,
        query: AgentQuery,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream, AgentError> {
        self.queries.lock().await.push(query);
        self.cancel_tokens.lock().await.push(cancel.clone());

        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }

        let steps: VecDeque<MockStep> = self.script.iter().cloned().collect();
        let stream = stream::unfold((steps, cancel), |(mut steps, cancel)| async move {
            loop {
                if cancel.is_cancelled() {
                    return None;
                }
                match steps.pop_front()? {
                    MockStep::Message(message) => return Some((Ok(message), (steps, cancel))),
                    MockStep::Error(error) => return Some((Err(error), (steps, cancel))),
                    MockStep::Delay(duration) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return None,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    MockStep::Action(action) => action(),
                    MockStep::Hang => {
                        cancel.cancelled().await;
                        return None;
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
