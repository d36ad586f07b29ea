//! Document Routes
//!
//! 定义文档上传相关的 API 路由。

use axum::{Router, routing::post};

use crate::api::app_state::AppState;
use crate::api::handlers::document_handler::*;

/// 创建文档路由器
pub fn create_document_router() -> Router<AppState> {
    Router::new().route("/upload", post(upload_document))
}
