//! Maps upstream agent messages onto the outbound query event vocabulary
//!
//! The agent may announce the same tool call twice: once as an incremental
//! block-start event and again inside the consolidated assistant message.
//! Only the first announcement per tool id reaches the client.

use super::errors::QueryError;
use super::models::{QueryEvent, TextMode, ToolStage};
use crate::citations::{substitute_citations, CitationStream};
use crate::search_cache::ResultCache;
use agent_providers::{AgentMessage, ContentBlock, ResultMessage, StreamEvent};
use std::collections::HashSet;
use std::sync::Arc;

/// Wire name for incremental events without a dedicated translation
const STREAM_EVENT_KIND: &str = "stream-event";

pub struct AgentEventTranslator {
    cache: Arc<ResultCache>,
    citations: CitationStream,
    announced_tools: HashSet<String>,
    /// Text deltas arrived since the last consolidated message
    delta_since_message: bool,
    streamed: bool,
    last_assistant_text: String,
}

impl AgentEventTranslator {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self {
            cache,
            citations: CitationStream::new(),
            announced_tools: HashSet::new(),
            delta_since_message: false,
            streamed: false,
            last_assistant_text: String::new(),
        }
    }

    /// Translate one upstream message, appending the resulting events to `out`
    ///
    /// A result flagged as an error still pushes its `Result` event before
    /// the failure is returned.
    pub fn translate(
        &mut self,
        message: AgentMessage,
        out: &mut Vec<QueryEvent>,
    ) -> Result<(), QueryError> {
        match message {
            AgentMessage::StreamEvent(event) => self.translate_stream_event(event, out),
            AgentMessage::Assistant { content } => self.translate_assistant(content, out),
            AgentMessage::User { content } => {
                for block in content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = block
                    {
                        out.push(QueryEvent::ToolResult {
                            id: tool_use_id,
                            output: content,
                        });
                    }
                }
            }
            AgentMessage::Result(result) => return self.translate_result(result, out),
            AgentMessage::Unknown { kind, payload } => {
                out.push(QueryEvent::Passthrough { kind, payload });
            }
        }
        Ok(())
    }

    /// Release text still held back by citation buffering
    pub fn flush(&mut self) -> Option<QueryEvent> {
        let text = self.citations.flush(&self.cache);
        (!text.is_empty()).then_some(QueryEvent::AssistantText {
            text,
            mode: TextMode::Delta,
        })
    }

    /// Final answer: the last consolidated assistant text, substituted
    pub fn final_response(&self) -> String {
        substitute_citations(&self.last_assistant_text, &self.cache)
    }

    pub fn streamed(&self) -> bool {
        self.streamed
    }

    fn translate_stream_event(&mut self, event: StreamEvent, out: &mut Vec<QueryEvent>) {
        match event {
            StreamEvent::TextDelta { text } => {
                if text.is_empty() {
                    return;
                }
                self.streamed = true;
                self.delta_since_message = true;
                let text = self.citations.push(&text, &self.cache);
                if !text.is_empty() {
                    out.push(QueryEvent::AssistantText {
                        text,
                        mode: TextMode::Delta,
                    });
                }
            }
            StreamEvent::ToolUseStart { id, name, input } => {
                if self.announce(id.as_deref()) {
                    out.push(QueryEvent::ToolUse {
                        id,
                        name,
                        input,
                        stage: ToolStage::Start,
                    });
                }
            }
            StreamEvent::ToolUseStop { id } => out.push(QueryEvent::ToolUse {
                id,
                name: None,
                input: None,
                stage: ToolStage::End,
            }),
            StreamEvent::Other(payload) => out.push(QueryEvent::Passthrough {
                kind: STREAM_EVENT_KIND.to_string(),
                payload,
            }),
        }
    }

    fn translate_assistant(&mut self, content: Vec<ContentBlock>, out: &mut Vec<QueryEvent>) {
        // The message closes the delta run it consolidates; a held-back tail
        // must not merge with the next message's text
        if let Some(event) = self.flush() {
            out.push(event);
        }

        let text: String = content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if !text.is_empty() {
            self.last_assistant_text = text;
        }

        let covered_by_deltas = std::mem::take(&mut self.delta_since_message);
        for block in content {
            match block {
                ContentBlock::Text { text } if !covered_by_deltas && !text.is_empty() => {
                    out.push(QueryEvent::AssistantText {
                        text: substitute_citations(&text, &self.cache),
                        mode: TextMode::Block,
                    });
                }
                ContentBlock::ToolUse { id, name, input } => {
                    if self.announce(id.as_deref()) {
                        out.push(QueryEvent::ToolUse {
                            id,
                            name,
                            input,
                            stage: ToolStage::Start,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn translate_result(
        &mut self,
        result: ResultMessage,
        out: &mut Vec<QueryEvent>,
    ) -> Result<(), QueryError> {
        let success = result.is_success();
        out.push(QueryEvent::Result {
            is_error: result.is_error,
            total_cost_usd: result.total_cost_usd,
            usage: result.usage.filter(|u| !u.is_null()),
            result: if success { result.result } else { None },
        });

        if result.is_error {
            tracing::warn!(subtype = ?result.subtype, "Agent reported a failed run");
            return Err(QueryError::agent_failed());
        }
        Ok(())
    }

    /// First-seen-wins per tool id; calls without an id are always announced
    fn announce(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.announced_tools.insert(id.to_string()),
            None => true,
        }
    }
}
