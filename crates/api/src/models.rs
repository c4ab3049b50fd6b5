use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/query`
///
/// Fields are loosely typed: a non-string prompt is treated as missing and
/// malformed history entries are dropped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequestBody {
    pub prompt: Option<Value>,
    pub library_id: Option<Value>,
    pub history: Option<Value>,
}

impl QueryRequestBody {
    /// Trimmed prompt text, if any
    pub fn prompt_text(&self) -> Option<&str> {
        trimmed_string(self.prompt.as_ref())
    }

    pub fn library_id(&self) -> Option<&str> {
        trimmed_string(self.library_id.as_ref())
    }
}

fn trimmed_string(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_and_library_are_trimmed() {
        let body: QueryRequestBody = serde_json::from_value(json!({
            "prompt": "  Hours?  ",
            "libraryId": "  "
        }))
        .unwrap();

        assert_eq!(body.prompt_text(), Some("Hours?"));
        assert_eq!(body.library_id(), None);
    }

    #[test]
    fn test_non_string_prompt_is_missing() {
        let body: QueryRequestBody = serde_json::from_value(json!({ "prompt": 42 })).unwrap();
        assert_eq!(body.prompt_text(), None);

        let empty: QueryRequestBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.prompt_text(), None);
    }
}
