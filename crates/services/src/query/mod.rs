//! Streaming query pipeline
//!
//! A query runs inside its own request scope: the agent is invoked, each
//! upstream message is translated (with citation substitution) into
//! [`QueryEvent`]s, and the stream ends with exactly one finalization.

pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod service;
pub mod translator;

pub use errors::QueryError;
pub use lifecycle::{LifecycleState, StreamLifecycle};
pub use models::{QueryEvent, QueryOutcome, QueryRequest, TextMode, ToolStage, PASSTHROUGH_EVENT};
pub use service::{QueryEventStream, QueryService};
pub use translator::AgentEventTranslator;
