use axum::{Json, extract::State, response::IntoResponse};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::history_dto::*},
    error::AppError,
};

pub async fn get_history(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let messages = state.memory.history();
    debug!("Returning {} history messages", messages.len());

    Ok(Json(HistoryResponse { messages }))
}

pub async fn clear_history(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.memory.clear();
    debug!("Conversation history cleared");

    Ok(Json(ClearResponse::success()))
}
