use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::chat_dto::*},
    error::AppError,
    observability::AppMetrics,
    services::stream::StreamEvent,
};

/// SSE 终止哨兵，对外契约的一部分
const DONE_SENTINEL: &str = "[DONE]";

/// 把流事件编码为 SSE 事件
fn sse_event(event: StreamEvent, metrics: &AppMetrics) -> Event {
    match event {
        StreamEvent::Token { text } => {
            metrics.record_stream_token();
            Event::default()
                .data(serde_json::json!({ "token": { "text": text } }).to_string())
        }
        StreamEvent::Error { message } => {
            metrics.record_error();
            Event::default().data(serde_json::json!({ "error": message }).to_string())
        }
        StreamEvent::Done => {
            metrics.record_stream(-1);
            Event::default().data(DONE_SENTINEL)
        }
    }
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, AppError> {
    debug!("Starting chat stream ({} bytes)", request.message.len());

    state.metrics.record_chat_request();
    let rx = state.chat_service.stream_chat(&request.message).await?;

    state.metrics.record_stream(1);
    let metrics = Arc::clone(&state.metrics);
    let stream = ReceiverStream::new(rx).map(move |event| Ok(sse_event(event, &metrics)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn document_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<DocumentChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, AppError> {
    debug!("Starting document chat stream for doc {}", request.doc_id);

    state.metrics.record_chat_request();
    let rx = state
        .documents
        .stream_answer(&request.doc_id, &request.message)
        .await?;

    state.metrics.record_stream(1);
    let metrics = Arc::clone(&state.metrics);
    let stream = ReceiverStream::new(rx).map(move |event| Ok(sse_event(event, &metrics)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
