//! Agent providers crate for talking to the upstream tool-using agent
//!
//! The agent is an external process that receives a prompt (plus prior
//! conversation turns) and answers with a stream of heterogeneous messages:
//! incremental token events, consolidated assistant messages, tool results
//! and one final result. This crate owns that wire model and the trait seam
//! the query pipeline consumes it through.
//!
//! # Streaming-Only Design
//!
//! Every provider returns a stream of [`AgentMessage`]s. Callers abort an
//! in-flight call by cancelling the [`CancellationToken`] they passed in and
//! dropping the stream.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agent_providers::{AgentProvider, AgentQuery};
//! use futures_util::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example<P: AgentProvider>(provider: P) {
//!     let query = AgentQuery { prompt: "Opening hours?".into(), ..Default::default() };
//!     let mut stream = provider.query_stream(query, CancellationToken::new()).await?;
//!     while let Some(message) = stream.next().await {
//!         println!("{}", message?.kind());
//!     }
//! }
//! ```

pub mod http;
pub mod mock;
pub mod models;
pub mod sse_parser;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

pub use http::{HttpAgentConfig, HttpAgentProvider};
pub use mock::{MockAgentProvider, MockStep};
pub use models::{
    AgentError, AgentMessage, AgentQuery, AgentTurn, ContentBlock, ResultMessage, StreamEvent,
};
pub use sse_parser::SSEParser;

/// Stream of upstream agent messages
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentMessage, AgentError>> + Send>>;

#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Start one agent call
    ///
    /// The returned stream ends after the final result message, on transport
    /// failure, or once `cancel` fires.
    async fn query_stream(
        &self,
        query: AgentQuery,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream, AgentError>;
}
