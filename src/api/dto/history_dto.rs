//! 历史 DTO
//!
//! 定义历史查询和清空操作的响应数据结构。

use serde::Serialize;

use crate::services::conversation::Message;

/// 历史查询响应
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// 按时间戳升序排列的全部消息
    pub messages: Vec<Message>,
}

/// 清空历史响应
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: String,
}

impl ClearResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}
