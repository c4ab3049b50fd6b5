use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single prior turn handed to the agent alongside the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTurn {
    pub role: String,
    pub content: String,
}

/// Parameters for one agent invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentQuery {
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<AgentTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Failed to start agent query: {0}")]
    Request(String),
    #[error("HTTP error {status_code}: {message}")]
    HttpError { status_code: u16, message: String },
    #[error("Agent stream failed: {0}")]
    Stream(String),
    #[error("Invalid agent event: {0}")]
    InvalidEvent(String),
}

/// One message of the upstream agent's event stream
///
/// The upstream stream is an open-ended union keyed by a `type` tag. Known
/// shapes get their own variant; anything else lands in `Unknown` with the
/// full payload so it can be forwarded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Incremental event from the model's token stream
    StreamEvent(StreamEvent),
    /// Consolidated assistant message
    Assistant { content: Vec<ContentBlock> },
    /// Message fed back to the model, carrying tool results
    User { content: Vec<ContentBlock> },
    /// Final outcome of the whole agent call
    Result(ResultMessage),
    Unknown { kind: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    ToolUseStart {
        id: Option<String>,
        name: Option<String>,
        input: Option<Value>,
    },
    ToolUseStop {
        id: Option<String>,
    },
    /// Any other incremental event, kept whole
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<Value>,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Option<Value>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_error: bool,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub result: Option<String>,
}

impl ResultMessage {
    /// Decode a result message, keeping whatever fields are usable
    fn from_value(value: Value) -> Self {
        serde_json::from_value::<Self>(value.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed result message, keeping usable fields");
            Self {
                subtype: string_field(&value, "subtype"),
                is_error: value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or_default(),
                total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
                usage: value.get("usage").cloned().filter(|v| v.is_object()),
                result: value
                    .get("result")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        })
    }

    /// Whether the result text should be surfaced to the client
    pub fn is_success(&self) -> bool {
        !self.is_error && matches!(self.subtype.as_deref(), None | Some("success"))
    }
}

impl AgentMessage {
    /// Classify a raw upstream JSON message
    pub fn from_value(value: Value) -> Result<Self, AgentError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidEvent("message has no type tag".to_string()))?
            .to_string();

        match kind.as_str() {
            "stream_event" => {
                let event = value.get("event").cloned().unwrap_or(Value::Null);
                Ok(Self::StreamEvent(StreamEvent::from_value(event)))
            }
            "assistant" => Ok(Self::Assistant {
                content: message_blocks(&value),
            }),
            "user" => Ok(Self::User {
                content: message_blocks(&value),
            }),
            "result" => Ok(Self::Result(ResultMessage::from_value(value))),
            _ => Ok(Self::Unknown {
                kind,
                payload: value,
            }),
        }
    }

    /// The upstream type tag of this message
    pub fn kind(&self) -> &str {
        match self {
            Self::StreamEvent(_) => "stream_event",
            Self::Assistant { .. } => "assistant",
            Self::User { .. } => "user",
            Self::Result(_) => "result",
            Self::Unknown { kind, .. } => kind,
        }
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::StreamEvent(StreamEvent::TextDelta { text: text.into() })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::Assistant {
            content: vec![ContentBlock::ToolUse {
                id: Some(id.into()),
                name: Some(name.into()),
                input: Some(input),
            }],
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Value) -> Self {
        Self::User {
            content: vec![ContentBlock::ToolResult {
                tool_use_id: Some(tool_use_id.into()),
                content: Some(content),
            }],
        }
    }

    pub fn success(result: impl Into<String>) -> Self {
        Self::Result(ResultMessage {
            subtype: Some("success".to_string()),
            is_error: false,
            total_cost_usd: None,
            usage: None,
            result: Some(result.into()),
        })
    }

    pub fn failure(subtype: impl Into<String>) -> Self {
        Self::Result(ResultMessage {
            subtype: Some(subtype.into()),
            is_error: true,
            total_cost_usd: None,
            usage: None,
            result: None,
        })
    }
}

impl StreamEvent {
    pub fn from_value(event: Value) -> Self {
        let event_type = event.get("type").and_then(Value::as_str);
        match event_type {
            Some("content_block_delta") => {
                let delta = event.get("delta");
                if delta.and_then(|d| d.get("type")).and_then(Value::as_str) == Some("text_delta")
                {
                    let text = delta
                        .and_then(|d| d.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return Self::TextDelta { text };
                }
            }
            Some("content_block_start") => {
                if let Some(block) = tool_use_block(&event) {
                    return Self::ToolUseStart {
                        id: string_field(block, "id"),
                        name: string_field(block, "name"),
                        input: block.get("input").cloned().filter(|v| !v.is_null()),
                    };
                }
            }
            Some("content_block_stop") => {
                if let Some(block) = tool_use_block(&event) {
                    return Self::ToolUseStop {
                        id: string_field(block, "id"),
                    };
                }
            }
            _ => {}
        }
        Self::Other(event)
    }
}

/// Extract `message.content` blocks; string content carries no blocks
///
/// Blocks decode one at a time, so a malformed block becomes `Unsupported`
/// without taking its siblings down with it.
fn message_blocks(value: &Value) -> Vec<ContentBlock> {
    match value.get("message").and_then(|m| m.get("content")) {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .map(|block| {
                ContentBlock::deserialize(block).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Skipping malformed content block");
                    ContentBlock::Unsupported
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tool-use block of a block start/stop event, under either `content_block` or `block`
fn tool_use_block(event: &Value) -> Option<&Value> {
    event
        .get("content_block")
        .or_else(|| event.get("block"))
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_delta() {
        let msg = AgentMessage::from_value(json!({
            "type": "stream_event",
            "event": {
                "type": "content_block_delta",
                "delta": { "type": "text_delta", "text": "Hello" }
            }
        }))
        .unwrap();

        assert_eq!(msg, AgentMessage::text_delta("Hello"));
    }

    #[test]
    fn test_parse_tool_use_start_from_either_block_key() {
        for key in ["content_block", "block"] {
            let msg = AgentMessage::from_value(json!({
                "type": "stream_event",
                "event": {
                    "type": "content_block_start",
                    key: { "type": "tool_use", "id": "toolu_1", "name": "SearchPrimo", "input": {} }
                }
            }))
            .unwrap();

            assert_eq!(
                msg,
                AgentMessage::StreamEvent(StreamEvent::ToolUseStart {
                    id: Some("toolu_1".to_string()),
                    name: Some("SearchPrimo".to_string()),
                    input: Some(json!({})),
                })
            );
        }
    }

    #[test]
    fn test_unrecognised_stream_event_kept_whole() {
        let event = json!({ "type": "message_start", "message": { "id": "msg_1" } });
        let msg = AgentMessage::from_value(json!({ "type": "stream_event", "event": event }))
            .unwrap();

        assert_eq!(msg, AgentMessage::StreamEvent(StreamEvent::Other(event)));
    }

    #[test]
    fn test_parse_assistant_blocks() {
        let msg = AgentMessage::from_value(json!({
            "type": "assistant",
            "message": {
                "content": [
                    { "type": "text", "text": "Let me search." },
                    { "type": "tool_use", "id": "toolu_2", "name": "SearchPrimo", "input": { "value": "cats" } },
                    { "type": "thinking", "thinking": "hmm" }
                ]
            }
        }))
        .unwrap();

        match msg {
            AgentMessage::Assistant { content } => {
                assert_eq!(content.len(), 3);
                assert_eq!(
                    content[0],
                    ContentBlock::Text {
                        text: "Let me search.".to_string()
                    }
                );
                assert!(matches!(&content[1], ContentBlock::ToolUse { id: Some(id), .. } if id == "toolu_2"));
                assert_eq!(content[2], ContentBlock::Unsupported);
            }
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn test_user_message_with_string_content_has_no_blocks() {
        let msg = AgentMessage::from_value(json!({
            "type": "user",
            "message": { "content": "plain prompt" }
        }))
        .unwrap();

        assert_eq!(msg, AgentMessage::User { content: vec![] });
    }

    #[test]
    fn test_parse_result_defaults() {
        let msg = AgentMessage::from_value(json!({ "type": "result", "is_error": false })).unwrap();
        match msg {
            AgentMessage::Result(result) => {
                assert!(!result.is_error);
                assert!(result.is_success());
                assert!(result.total_cost_usd.is_none());
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_error_subtype_is_not_success() {
        let result = ResultMessage {
            subtype: Some("error_max_turns".to_string()),
            ..Default::default()
        };
        assert!(!result.is_success());
    }

    #[test]
    fn test_unknown_type_keeps_payload() {
        let payload = json!({ "type": "system", "subtype": "init", "tools": ["WebSearch"] });
        let msg = AgentMessage::from_value(payload.clone()).unwrap();

        assert_eq!(msg.kind(), "system");
        assert_eq!(
            msg,
            AgentMessage::Unknown {
                kind: "system".to_string(),
                payload
            }
        );
    }

    #[test]
    fn test_null_text_block_keeps_sibling_blocks() {
        let msg = AgentMessage::from_value(json!({
            "type": "assistant",
            "message": {
                "content": [
                    { "type": "text", "text": null },
                    { "type": "tool_use", "id": "t1", "name": "SearchPrimo", "input": {} },
                    { "type": "tool_use", "id": 7 }
                ]
            }
        }))
        .unwrap();

        assert_eq!(
            msg,
            AgentMessage::Assistant {
                content: vec![
                    ContentBlock::Text {
                        text: String::new()
                    },
                    ContentBlock::ToolUse {
                        id: Some("t1".to_string()),
                        name: Some("SearchPrimo".to_string()),
                        input: Some(json!({})),
                    },
                    ContentBlock::Unsupported,
                ]
            }
        );
    }

    #[test]
    fn test_result_with_odd_fields_still_decodes() {
        let msg = AgentMessage::from_value(json!({
            "type": "result",
            "is_error": null,
            "subtype": "success",
            "result": 42,
            "total_cost_usd": 0.5
        }))
        .unwrap();

        match msg {
            AgentMessage::Result(result) => {
                assert!(!result.is_error);
                assert!(result.is_success());
                assert_eq!(result.total_cost_usd, Some(0.5));
                assert!(result.result.is_none());
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_invalid() {
        let err = AgentMessage::from_value(json!({ "event": {} })).unwrap_err();
        assert!(matches!(err, AgentError::InvalidEvent(_)));
    }
}
