//! Handlers 模块
//!
//! 实现 API 请求处理逻辑。

pub mod chat_handler;
pub mod document_handler;
pub mod history_handler;
