use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One prior exchange; content is trimmed and never empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, content: impl AsRef<str>) -> Option<Self> {
        let content = content.as_ref().trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            role,
            content: content.to_string(),
        })
    }
}

/// The most recent valid turns of a conversation, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub const DEFAULT_MAX_TURNS: usize = 50;

    /// Keep the last `max_turns` of already-validated turns
    pub fn new(turns: impl IntoIterator<Item = ConversationTurn>, max_turns: usize) -> Self {
        let mut turns: Vec<_> = turns.into_iter().collect();
        if turns.len() > max_turns {
            turns.drain(..turns.len() - max_turns);
        }
        Self { turns }
    }

    /// Sanitise caller-supplied history
    ///
    /// Drops anything that is not an object with a `user`/`assistant` role
    /// and non-blank string content, then keeps the last `max_turns`.
    /// A non-array value yields an empty history.
    pub fn from_raw(raw: Option<&Value>, max_turns: usize) -> Self {
        let Some(entries) = raw.and_then(Value::as_array) else {
            return Self::default();
        };

        let turns = entries.iter().filter_map(|entry| {
            let entry = entry.as_object()?;
            let role = TurnRole::parse(entry.get("role")?.as_str()?)?;
            ConversationTurn::new(role, entry.get("content")?.as_str()?)
        });

        Self::new(turns, max_turns)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_invalid_entries() {
        let raw = json!([
            { "role": "user", "content": "  Hello  " },
            { "role": "system", "content": "ignored" },
            { "role": "assistant", "content": "   " },
            { "role": "assistant", "content": 42 },
            "not an object",
            null,
            { "content": "no role" },
            { "role": "assistant", "content": "Hi there" }
        ]);

        let history = ConversationHistory::from_raw(Some(&raw), ConversationHistory::DEFAULT_MAX_TURNS);

        assert_eq!(
            history.turns(),
            &[
                ConversationTurn {
                    role: TurnRole::User,
                    content: "Hello".to_string()
                },
                ConversationTurn {
                    role: TurnRole::Assistant,
                    content: "Hi there".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_keeps_most_recent_turns() {
        let raw: Vec<Value> = (0..30)
            .map(|i| json!({ "role": if i % 2 == 0 { "user" } else { "assistant" }, "content": format!("turn {i}") }))
            .collect();
        let raw = Value::Array(raw);

        let history = ConversationHistory::from_raw(Some(&raw), 20);

        assert_eq!(history.len(), 20);
        assert_eq!(history.turns()[0].content, "turn 10");
        assert_eq!(history.turns()[19].content, "turn 29");
    }

    #[test]
    fn test_non_array_is_empty() {
        for raw in [json!({ "role": "user" }), json!("history"), Value::Null] {
            assert!(ConversationHistory::from_raw(Some(&raw), 20).is_empty());
        }
        assert!(ConversationHistory::from_raw(None, 20).is_empty());
    }

    #[test]
    fn test_serializes_as_turn_list() {
        let history = ConversationHistory::new(ConversationTurn::new(TurnRole::User, "Hi"), 5);
        assert_eq!(
            serde_json::to_value(&history).unwrap(),
            json!([{ "role": "user", "content": "Hi" }])
        );
    }
}
