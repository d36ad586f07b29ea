//! Manta - 流式会话推理网关
//!
//! 在本地推理后端之上提供带语义记忆的流式对话服务：检索增强提示、
//! SSE 令牌流、输出修复与会话历史管理。

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod observability;
pub mod security;
pub mod services;
