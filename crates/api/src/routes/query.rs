use crate::{models::ErrorResponse, models::QueryRequestBody, AppState};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json as ResponseJson, Response,
    },
};
use futures::stream::StreamExt;
use services::{ConversationHistory, QueryError, QueryRequest};
use std::convert::Infallible;

fn map_query_error_to_status(error: &QueryError) -> StatusCode {
    match error {
        QueryError::InvalidParams(_) => StatusCode::BAD_REQUEST,
        QueryError::AgentFailed(_) | QueryError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn prompt_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        ResponseJson(ErrorResponse::new("Prompt is required")),
    )
        .into_response()
}

/// Answer a reference question as a stream of Server-Sent Events
///
/// Each SSE message is named after the query event (`start`,
/// `assistant-text`, `tool-use`, `tool-result`, `result`, `done`, `error`)
/// and carries its JSON payload. Closing the connection cancels the
/// agent call.
pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequestBody>,
) -> Response {
    let Some(prompt) = body.prompt_text() else {
        return prompt_required();
    };

    let library_id = body
        .library_id()
        .unwrap_or(&state.query_config.default_library_id)
        .to_string();
    let history = ConversationHistory::from_raw(
        body.history.as_ref(),
        state.query_config.max_history_turns,
    );

    tracing::info!(
        library_id = %library_id,
        history_turns = history.len(),
        "Received streaming query request"
    );

    let request = QueryRequest::new(prompt)
        .with_history(history)
        .with_metadata("source", "web")
        .with_metadata("libraryId", library_id);

    match state.query_service.create_query_stream(request) {
        Ok(stream) => {
            let sse_stream = stream.map(|event| {
                Ok::<_, Infallible>(
                    Event::default()
                        .event(event.name())
                        .data(event.data().to_string()),
                )
            });

            (
                [
                    ("Cache-Control", "no-cache, no-transform"),
                    ("X-Accel-Buffering", "no"),
                ],
                Sse::new(sse_stream).keep_alive(KeepAlive::default()),
            )
                .into_response()
        }
        Err(QueryError::InvalidParams(_)) => prompt_required(),
        Err(error) => {
            tracing::error!(error = %error, "Failed to start query stream");
            let status_code = map_query_error_to_status(&error);
            (status_code, ResponseJson(ErrorResponse::new(error.to_string()))).into_response()
        }
    }
}
