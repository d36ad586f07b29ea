//! 生成模型模块
//!
//! 提供 token 级流式文本生成接口。后端通过 `supports_templating`
//! 声明是否接受结构化对话轮，提示词装配器据此选择提示词形态。

pub mod ollama;
pub mod script;

pub use ollama::OllamaGenerationModel;
pub use script::ScriptedGenerationModel;

use async_trait::async_trait;
use futures_util::stream::Stream;
use serde::Serialize;
use std::pin::Pin;

use crate::config::config::GenerationConfig;
use crate::error::Result;

/// 一条对话轮
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// 装配好的提示词
///
/// 后端支持对话模板时用结构化轮次，否则退化为平铺字符串。
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Turns(Vec<ChatTurn>),
    Text(String),
}

impl Prompt {
    /// 平铺为单个字符串（不支持模板的后端使用）
    pub fn flatten(&self) -> String {
        match self {
            Prompt::Text(text) => text.clone(),
            Prompt::Turns(turns) => {
                let mut out = String::new();
                for turn in turns {
                    match turn.role.as_str() {
                        "system" => out.push_str(&turn.content),
                        "assistant" => {
                            out.push_str("\n\nAssistant: ");
                            out.push_str(&turn.content);
                        }
                        _ => {
                            out.push_str("\n\nUser: ");
                            out.push_str(&turn.content);
                        }
                    }
                }
                out.push_str("\n\nAssistant:");
                out
            }
        }
    }
}

/// 惰性 token 片段序列，有限且不可重放
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// 生成模型接口
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// 发起一次生成，`max_tokens` 限制请求的片段数量
    async fn generate(&self, prompt: &Prompt, max_tokens: u32) -> Result<FragmentStream>;
    /// 后端是否支持结构化对话模板
    fn supports_templating(&self) -> bool;
}

pub fn create_generation_model(config: &GenerationConfig) -> Result<Box<dyn GenerationModel>> {
    match config.backend.as_str() {
        "ollama" => {
            let model = OllamaGenerationModel::new(&config.ollama_url, &config.model_name)?;
            Ok(Box::new(model))
        }
        _ => Ok(Box::new(ScriptedGenerationModel::default())),
    }
}
