use agent_providers::{AgentMessage, MockAgentProvider, MockStep, StreamEvent};
use api::{build_app, AppState};
use axum_test::TestServer;
use config::QueryConfig;
use serde_json::{json, Value};
use services::{interaction_log::MockInteractionLogger, QueryService};
use std::sync::Arc;

fn setup_server(provider: Arc<MockAgentProvider>) -> TestServer {
    let mut logger = MockInteractionLogger::new();
    logger.expect_log().returning(|_| Ok(()));

    let query_service = QueryService::new(provider, Arc::new(logger));
    let app = build_app(AppState {
        query_service: Arc::new(query_service),
        query_config: QueryConfig::default(),
    });
    TestServer::new(app).unwrap()
}

/// Split an SSE body into (event name, JSON payload) pairs
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = serde_json::from_str(value.trim()).ok();
                }
            }
            Some((name?, data?))
        })
        .collect()
}

fn event_names(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(name, _)| name.as_str()).collect()
}

#[tokio::test]
async fn test_health() {
    let server = setup_server(Arc::new(MockAgentProvider::default()));

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_missing_prompt_is_bad_request() {
    let provider = Arc::new(MockAgentProvider::default());
    let server = setup_server(provider.clone());

    for body in [json!({}), json!({ "prompt": "   " }), json!({ "prompt": 7 })] {
        let response = server.post("/api/query").json(&body).await;

        assert_eq!(response.status_code(), 400, "body {body}");
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "Prompt is required" })
        );
    }
    assert!(provider.queries().await.is_empty());
}

#[tokio::test]
async fn test_query_streams_events() {
    let provider = Arc::new(MockAgentProvider::new(vec![
        MockStep::Message(AgentMessage::StreamEvent(StreamEvent::ToolUseStart {
            id: Some("toolu_1".to_string()),
            name: Some("SearchPrimo".to_string()),
            input: None,
        })),
        MockStep::Message(AgentMessage::tool_use("toolu_1", "SearchPrimo", json!({}))),
        MockStep::Message(AgentMessage::text_delta("Open 9")),
        MockStep::Message(AgentMessage::text_delta("-5 today.")),
        MockStep::Message(AgentMessage::assistant_text("Open 9-5 today.")),
        MockStep::Message(AgentMessage::success("Open 9-5 today.")),
    ]));
    let server = setup_server(provider);

    let response = server
        .post("/api/query")
        .json(&json!({ "prompt": "When are you open?" }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = parse_sse(&response.text());
    assert_eq!(
        event_names(&events),
        ["start", "tool-use", "assistant-text", "assistant-text", "result", "done"]
    );
    assert_eq!(events[0].1, json!({ "source": "web", "libraryId": "mina-rees" }));
    assert_eq!(events[2].1, json!({ "text": "Open 9", "mode": "delta" }));
    assert_eq!(
        events[5].1,
        json!({ "response": "Open 9-5 today.", "source": "web", "libraryId": "mina-rees" })
    );
}

#[tokio::test]
async fn test_library_and_history_are_forwarded() {
    let provider = Arc::new(MockAgentProvider::from_messages(vec![AgentMessage::success(
        "ok",
    )]));
    let server = setup_server(provider.clone());

    let response = server
        .post("/api/query")
        .json(&json!({
            "prompt": "And on Sunday?",
            "libraryId": " science ",
            "history": [
                { "role": "user", "content": "When are you open?" },
                { "role": "tool", "content": "dropped" },
                { "role": "assistant", "content": "  9-5 on weekdays.  " }
            ]
        }))
        .await;

    let events = parse_sse(&response.text());
    assert_eq!(events[0].1["libraryId"], "science");

    let queries = provider.queries().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].prompt, "And on Sunday?");
    assert_eq!(queries[0].history.len(), 2);
    assert_eq!(queries[0].history[1].content, "9-5 on weekdays.");
    let metadata = queries[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["libraryId"], "science");
    assert_eq!(metadata["source"], "web");
}

#[tokio::test]
async fn test_agent_failure_ends_with_error_event() {
    let provider = Arc::new(MockAgentProvider::from_messages(vec![
        AgentMessage::text_delta("Let me check"),
        AgentMessage::failure("error_during_execution"),
    ]));
    let server = setup_server(provider);

    let response = server
        .post("/api/query")
        .json(&json!({ "prompt": "Hours?" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let events = parse_sse(&response.text());
    assert_eq!(
        event_names(&events),
        ["start", "assistant-text", "result", "error"]
    );
    assert_eq!(events[2].1["isError"], true);
    assert_eq!(events[3].1, json!({ "error": "Agent execution failed." }));
}

#[tokio::test]
async fn test_unusable_upstream_types_stream_as_passthrough() {
    let provider = Arc::new(MockAgentProvider::from_messages(vec![
        AgentMessage::from_value(json!({ "type": "sys\ntem" })).unwrap(),
        AgentMessage::from_value(json!({ "type": "error", "detail": "rate limited" })).unwrap(),
        AgentMessage::from_value(json!({ "type": "system", "subtype": "init" })).unwrap(),
        AgentMessage::assistant_text("ok"),
        AgentMessage::success("ok"),
    ]));
    let server = setup_server(provider);

    let response = server
        .post("/api/query")
        .json(&json!({ "prompt": "Hours?" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let events = parse_sse(&response.text());
    assert_eq!(
        event_names(&events),
        ["start", "passthrough", "passthrough", "system", "assistant-text", "result", "done"]
    );
    assert_eq!(events[1].1["type"], "sys\ntem");
    assert_eq!(events[2].1, json!({ "type": "error", "detail": "rate limited" }));
    assert_eq!(
        event_names(&events)
            .iter()
            .filter(|name| matches!(**name, "done" | "error"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_null_text_block_does_not_fail_the_query() {
    let provider = Arc::new(MockAgentProvider::from_messages(vec![
        AgentMessage::from_value(json!({
            "type": "assistant",
            "message": {
                "content": [
                    { "type": "text", "text": null },
                    { "type": "tool_use", "id": "t1", "name": "SearchPrimo", "input": {} }
                ]
            }
        }))
        .unwrap(),
        AgentMessage::assistant_text("Found it."),
        AgentMessage::success("Found it."),
    ]));
    let server = setup_server(provider);

    let response = server
        .post("/api/query")
        .json(&json!({ "prompt": "Cats?" }))
        .await;

    let events = parse_sse(&response.text());
    let names = event_names(&events);
    assert_eq!(names.first(), Some(&"start"));
    assert!(names.contains(&"tool-use"));
    assert_eq!(names.last(), Some(&"done"));
    assert!(!names.contains(&"error"));
}
