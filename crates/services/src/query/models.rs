use crate::history::ConversationHistory;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One question for the agent
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub prompt: String,
    pub history: ConversationHistory,
    /// Echoed on `start` and `done`, and recorded in the interaction log
    pub metadata: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// How a query call ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Last consolidated assistant text with citations substituted
    pub response: String,
    /// Whether any incremental text arrived from the agent
    pub streamed: bool,
    /// The client went away (or the caller cancelled) before completion
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Incremental fragment
    Delta,
    /// Whole text block of a consolidated message
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStage {
    Start,
    End,
}

/// Wire name for passthrough events whose upstream type is unusable
pub const PASSTHROUGH_EVENT: &str = "passthrough";

const RESERVED_EVENT_NAMES: [&str; 7] = [
    "start",
    "assistant-text",
    "tool-use",
    "tool-result",
    "result",
    "done",
    "error",
];

/// Upstream type tags become SSE event names only when they are plain
/// identifiers outside the closed vocabulary
fn passthrough_name(kind: &str) -> &str {
    let plain = !kind.is_empty()
        && kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if plain && !RESERVED_EVENT_NAMES.contains(&kind) {
        kind
    } else {
        PASSTHROUGH_EVENT
    }
}

/// Outbound event vocabulary of a query stream
///
/// `Start` is always first; at most one of `Done` / `Error` is last.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    Start {
        metadata: Map<String, Value>,
    },
    AssistantText {
        text: String,
        mode: TextMode,
    },
    ToolUse {
        id: Option<String>,
        name: Option<String>,
        input: Option<Value>,
        stage: ToolStage,
    },
    ToolResult {
        id: Option<String>,
        output: Option<Value>,
    },
    Result {
        is_error: bool,
        total_cost_usd: Option<f64>,
        usage: Option<Value>,
        /// Present only for successful runs
        result: Option<String>,
    },
    Done {
        response: String,
        metadata: Map<String, Value>,
    },
    Error {
        message: String,
    },
    /// Upstream shape with no dedicated translation, forwarded whole
    ///
    /// Named after the upstream type on the wire, unless that would be an
    /// invalid SSE field or collide with the closed vocabulary.
    Passthrough {
        kind: String,
        payload: Value,
    },
}

impl QueryEvent {
    /// Event name on the wire
    pub fn name(&self) -> &str {
        match self {
            Self::Start { .. } => "start",
            Self::AssistantText { .. } => "assistant-text",
            Self::ToolUse { .. } => "tool-use",
            Self::ToolResult { .. } => "tool-result",
            Self::Result { .. } => "result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Passthrough { kind, .. } => passthrough_name(kind),
        }
    }

    /// JSON payload on the wire
    pub fn data(&self) -> Value {
        match self {
            Self::Start { metadata } => Value::Object(metadata.clone()),
            Self::AssistantText { text, mode } => json!({ "text": text, "mode": mode }),
            Self::ToolUse {
                id,
                stage: ToolStage::End,
                ..
            } => json!({ "id": id, "stage": ToolStage::End }),
            Self::ToolUse {
                id,
                name,
                input,
                stage,
            } => json!({ "id": id, "name": name, "input": input, "stage": stage }),
            Self::ToolResult { id, output } => json!({ "id": id, "output": output }),
            Self::Result {
                is_error,
                total_cost_usd,
                usage,
                result,
            } => {
                let mut payload = json!({
                    "isError": is_error,
                    "totalCostUsd": total_cost_usd,
                    "usage": usage,
                });
                if let Some(result) = result {
                    payload["result"] = json!(result);
                }
                payload
            }
            Self::Done { response, metadata } => {
                let mut payload = metadata.clone();
                payload.insert("response".to_string(), json!(response));
                Value::Object(payload)
            }
            Self::Error { message } => json!({ "error": message }),
            Self::Passthrough { payload, .. } => payload.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let events = [
            (QueryEvent::Start { metadata: Map::new() }, "start"),
            (
                QueryEvent::AssistantText {
                    text: "x".to_string(),
                    mode: TextMode::Delta,
                },
                "assistant-text",
            ),
            (
                QueryEvent::ToolResult {
                    id: None,
                    output: None,
                },
                "tool-result",
            ),
            (
                QueryEvent::Error {
                    message: "boom".to_string(),
                },
                "error",
            ),
            (
                QueryEvent::Passthrough {
                    kind: "stream-event".to_string(),
                    payload: json!({}),
                },
                "stream-event",
            ),
        ];
        for (event, name) in events {
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn test_passthrough_names_never_collide_or_break_framing() {
        let name_of = |kind: &str| {
            QueryEvent::Passthrough {
                kind: kind.to_string(),
                payload: json!({ "type": kind }),
            }
            .name()
            .to_string()
        };

        assert_eq!(name_of("system"), "system");
        assert_eq!(name_of("rate_limit.notice"), "rate_limit.notice");
        for kind in ["error", "done", "start", "result", "tool-use", "sys\ntem", "a\rb", "", "two words"] {
            assert_eq!(name_of(kind), PASSTHROUGH_EVENT, "kind {kind:?}");
        }

        let renamed = QueryEvent::Passthrough {
            kind: "error".to_string(),
            payload: json!({ "type": "error", "detail": "rate limited" }),
        };
        assert!(!renamed.is_terminal());
        assert_eq!(renamed.data()["type"], "error");
    }

    #[test]
    fn test_tool_use_payloads() {
        let start = QueryEvent::ToolUse {
            id: Some("toolu_1".to_string()),
            name: Some("SearchPrimo".to_string()),
            input: None,
            stage: ToolStage::Start,
        };
        assert_eq!(
            start.data(),
            json!({ "id": "toolu_1", "name": "SearchPrimo", "input": null, "stage": "start" })
        );

        let end = QueryEvent::ToolUse {
            id: Some("toolu_1".to_string()),
            name: None,
            input: None,
            stage: ToolStage::End,
        };
        assert_eq!(end.data(), json!({ "id": "toolu_1", "stage": "end" }));
    }

    #[test]
    fn test_result_payload_omits_text_on_failure() {
        let failed = QueryEvent::Result {
            is_error: true,
            total_cost_usd: Some(0.01),
            usage: None,
            result: None,
        };
        assert_eq!(
            failed.data(),
            json!({ "isError": true, "totalCostUsd": 0.01, "usage": null })
        );
    }

    #[test]
    fn test_done_carries_metadata() {
        let mut metadata = Map::new();
        metadata.insert("libraryId".to_string(), json!("mina-rees"));
        let done = QueryEvent::Done {
            response: "Open 9-5".to_string(),
            metadata,
        };

        assert!(done.is_terminal());
        assert_eq!(
            done.data(),
            json!({ "response": "Open 9-5", "libraryId": "mina-rees" })
        );
    }
}
