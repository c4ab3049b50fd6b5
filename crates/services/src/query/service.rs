use super::errors::QueryError;
use super::lifecycle::StreamLifecycle;
use super::models::{QueryEvent, QueryOutcome, QueryRequest};
use super::translator::AgentEventTranslator;
use crate::history::ConversationHistory;
use crate::interaction_log::{InteractionLogEntry, InteractionLogger};
use crate::search_cache::{run_scoped, ResultCache};
use agent_providers::{
    AgentError, AgentEventStream, AgentMessage, AgentProvider, AgentQuery, AgentTurn,
};
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

pub type QueryEventStream = Pin<Box<dyn Stream<Item = QueryEvent> + Send>>;

/// What the lifecycle loop observed last
enum Ending {
    Completed,
    Failed(QueryError),
    Disconnected,
}

/// Next step of the upstream stream
enum Upstream {
    Message(AgentMessage),
    Failed(AgentError),
    Exhausted,
    IdleTimeout,
}

pub struct QueryService {
    provider: Arc<dyn AgentProvider>,
    interaction_logger: Arc<dyn InteractionLogger>,
    idle_timeout: Option<Duration>,
}

impl QueryService {
    pub fn new(
        provider: Arc<dyn AgentProvider>,
        interaction_logger: Arc<dyn InteractionLogger>,
    ) -> Self {
        Self {
            provider,
            interaction_logger,
            idle_timeout: None,
        }
    }

    /// Treat upstream silence longer than `timeout` as a disconnect
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Answer one query, streaming events into `sink`
    ///
    /// Runs inside a fresh request scope. Cancelling `cancel` or dropping the
    /// receiving side of `sink` counts as a client disconnect: the upstream
    /// call is aborted, no terminal event is sent and the call resolves with
    /// `cancelled` set. An upstream failure sends one `error` event and is
    /// returned as the error. The interaction log is written exactly once
    /// for every call that got past validation.
    pub async fn process_query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
        sink: UnboundedSender<QueryEvent>,
    ) -> Result<QueryOutcome, QueryError> {
        let prompt = validate_prompt(&request.prompt)?;
        let cache = Arc::new(ResultCache::new());

        run_scoped(
            cache.clone(),
            self.run_query(prompt, request, cache, cancel, sink),
        )
        .await
    }

    /// Spawn a query and return its events
    ///
    /// Dropping the returned stream cancels the query.
    pub fn create_query_stream(
        self: &Arc<Self>,
        request: QueryRequest,
    ) -> Result<QueryEventStream, QueryError> {
        validate_prompt(&request.prompt)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let service = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = service.process_query(request, cancel, tx).await {
                tracing::debug!(error = %e, "Query stream finished with error");
            }
        });

        // The guard lives as long as the stream; dropping it cancels the query
        let events = UnboundedReceiverStream::new(rx).map(move |event| {
            let _ = &guard;
            event
        });
        Ok(Box::pin(events))
    }

    async fn run_query(
        &self,
        prompt: String,
        request: QueryRequest,
        cache: Arc<ResultCache>,
        cancel: CancellationToken,
        sink: UnboundedSender<QueryEvent>,
    ) -> Result<QueryOutcome, QueryError> {
        let started_at = Instant::now();
        let QueryRequest {
            history, metadata, ..
        } = request;

        tracing::info!(
            prompt_chars = prompt.chars().count(),
            history_turns = history.len(),
            "Processing query"
        );

        let mut lifecycle = StreamLifecycle::new(sink);
        let mut translator = AgentEventTranslator::new(cache);
        lifecycle.start(metadata.clone());

        // Child token: a disconnect seen here aborts upstream without
        // cancelling the caller's token
        let upstream = cancel.child_token();
        let query = AgentQuery {
            prompt: prompt.clone(),
            history: history
                .turns()
                .iter()
                .map(|turn| AgentTurn {
                    role: turn.role.as_str().to_string(),
                    content: turn.content.clone(),
                })
                .collect(),
            metadata: (!metadata.is_empty()).then(|| metadata.clone()),
        };

        let ending = match self.provider.query_stream(query, upstream.clone()).await {
            Ok(stream) => {
                self.drive(stream, &cancel, &mut lifecycle, &mut translator)
                    .await
            }
            Err(_) if cancel.is_cancelled() => Ending::Disconnected,
            Err(e) => Ending::Failed(e.into()),
        };
        upstream.cancel();

        let response = translator.final_response();
        let (result, entry) = match ending {
            Ending::Completed => {
                lifecycle.finish(response.clone(), metadata.clone());
                let outcome = QueryOutcome {
                    response: response.clone(),
                    streamed: translator.streamed(),
                    cancelled: lifecycle.is_aborted(),
                };
                (Ok(outcome), self.log_entry(&prompt, &response, &history, &metadata))
            }
            Ending::Disconnected => {
                lifecycle.abort();
                tracing::info!("Client disconnected, upstream agent call aborted");
                let outcome = QueryOutcome {
                    response: response.clone(),
                    streamed: translator.streamed(),
                    cancelled: true,
                };
                (Ok(outcome), self.log_entry(&prompt, &response, &history, &metadata))
            }
            Ending::Failed(error) => {
                tracing::error!(error = %error, "Agent query failed");
                let message = error.to_string();
                lifecycle.fail(message.clone());
                let entry = self
                    .log_entry(&prompt, &response, &history, &metadata)
                    .failed(message);
                (Err(error), entry)
            }
        };

        if let Err(e) = self.interaction_logger.log(entry).await {
            tracing::error!(error = ?e, "Failed to write interaction log");
        }

        tracing::info!(
            duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            state = ?lifecycle.state(),
            "Query finished"
        );
        result
    }

    /// Pump upstream messages through the translator until something ends the run
    async fn drive(
        &self,
        mut stream: AgentEventStream,
        cancel: &CancellationToken,
        lifecycle: &mut StreamLifecycle,
        translator: &mut AgentEventTranslator,
    ) -> Ending {
        let mut events = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ending::Disconnected,
                _ = lifecycle.closed() => return Ending::Disconnected,
                next = next_upstream(&mut stream, self.idle_timeout) => next,
            };

            let message = match next {
                Upstream::Message(message) => message,
                Upstream::Failed(e) => return Ending::Failed(e.into()),
                Upstream::Exhausted => break,
                Upstream::IdleTimeout => {
                    tracing::warn!(
                        idle_timeout_secs = self.idle_timeout.map(|d| d.as_secs()),
                        "Agent stream idle for too long, abandoning query"
                    );
                    return Ending::Disconnected;
                }
            };

            tracing::trace!(kind = message.kind(), "Agent message");
            let translated = translator.translate(message, &mut events);
            let delivered = events.drain(..).all(|event| lifecycle.emit(event));
            // An upstream failure outranks a client that left mid-emit
            match translated {
                Err(e) => return Ending::Failed(e),
                Ok(()) if !delivered => return Ending::Disconnected,
                Ok(()) => {}
            }
        }

        if let Some(event) = translator.flush() {
            if !lifecycle.emit(event) {
                return Ending::Disconnected;
            }
        }
        Ending::Completed
    }

    fn log_entry(
        &self,
        prompt: &str,
        response: &str,
        history: &ConversationHistory,
        metadata: &Map<String, Value>,
    ) -> InteractionLogEntry {
        InteractionLogEntry::new(chrono::Utc::now(), prompt, response)
            .with_metadata(metadata.clone())
            .with_history(history.turns())
    }
}

fn validate_prompt(prompt: &str) -> Result<String, QueryError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(QueryError::InvalidParams("Prompt is required".to_string()));
    }
    Ok(prompt.to_string())
}

async fn next_upstream(stream: &mut AgentEventStream, idle_timeout: Option<Duration>) -> Upstream {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(next) => next,
            Err(_) => return Upstream::IdleTimeout,
        },
        None => stream.next().await,
    };

    match next {
        Some(Ok(message)) => Upstream::Message(message),
        Some(Err(e)) => Upstream::Failed(e),
        None => Upstream::Exhausted,
    }
}
