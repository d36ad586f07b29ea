//! 文档 DTO
//!
//! 定义文档上传的响应数据结构。

use serde::Serialize;

use crate::services::document::UploadReceipt;

/// 上传响应
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// 原始文件名
    pub document: String,
    /// 分块数量
    pub chunks: usize,
    /// 文档 ID，后续问答用
    pub doc_id: String,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            document: receipt.document,
            chunks: receipt.chunks,
            doc_id: receipt.doc_id,
        }
    }
}
