//! 会话 DTO
//!
//! 定义会话相关的请求数据结构。

use serde::Deserialize;

/// 流式会话请求
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ChatRequest {
    /// 用户消息
    pub message: String,
}

/// 文档问答请求
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DocumentChatRequest {
    /// 用户消息
    pub message: String,
    /// 目标文档 ID
    pub doc_id: String,
}
