//! History Routes
//!
//! 定义会话历史相关的 API 路由。

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;
use crate::api::handlers::history_handler::*;

/// 创建历史路由器
pub fn create_history_router() -> Router<AppState> {
    Router::new()
        .route("/history", get(get_history))
        .route("/clear", post(clear_history))
}
