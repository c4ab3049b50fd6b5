//! Outbound side of one query stream
//!
//! `Idle → Started → Finished | Errored | Aborted`. Events flow only while
//! `Started`; every terminal state is final, so whichever of completion,
//! failure or disconnect is observed first wins and the rest are no-ops.

use super::models::QueryEvent;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Started,
    /// `done` was sent
    Finished,
    /// `error` was sent
    Errored,
    /// The client is gone; nothing more is sent
    Aborted,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Errored | Self::Aborted)
    }
}

pub struct StreamLifecycle {
    tx: UnboundedSender<QueryEvent>,
    state: LifecycleState,
}

impl StreamLifecycle {
    pub fn new(tx: UnboundedSender<QueryEvent>) -> Self {
        Self {
            tx,
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.state == LifecycleState::Aborted
    }

    /// Send `start`; only valid once, from `Idle`
    pub fn start(&mut self, metadata: Map<String, Value>) -> bool {
        if self.state != LifecycleState::Idle {
            return false;
        }
        self.state = LifecycleState::Started;
        self.send(QueryEvent::Start { metadata })
    }

    /// Send one non-terminal event; false once the stream is no longer live
    pub fn emit(&mut self, event: QueryEvent) -> bool {
        if self.state != LifecycleState::Started {
            return false;
        }
        self.send(event)
    }

    /// Send `done` unless a terminal state was already reached
    pub fn finish(&mut self, response: String, metadata: Map<String, Value>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if self.send(QueryEvent::Done { response, metadata }) {
            self.state = LifecycleState::Finished;
            true
        } else {
            false
        }
    }

    /// Send `error` unless a terminal state was already reached
    pub fn fail(&mut self, message: String) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if self.send(QueryEvent::Error { message }) {
            self.state = LifecycleState::Errored;
            true
        } else {
            false
        }
    }

    /// Record a client disconnect; nothing is sent
    pub fn abort(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = LifecycleState::Aborted;
        true
    }

    /// Resolves once the receiving side has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    fn send(&mut self, event: QueryEvent) -> bool {
        if self.tx.send(event).is_err() {
            tracing::debug!(state = ?self.state, "Event receiver dropped, treating as disconnect");
            self.state = LifecycleState::Aborted;
            return false;
        }
        true
    }
}
