//! Ollama 生成模型客户端
//!
//! 以 NDJSON 流式消费 `/api/chat`（结构化轮次）或 `/api/generate`
//! （平铺提示词），把字节流切分为逐行 JSON 并映射为 token 片段。

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::generation::{FragmentStream, GenerationModel, Prompt};

pub struct OllamaGenerationModel {
    client: reqwest::Client,
    model_name: String,
    base_url: String,
}

/// `/api/chat` 与 `/api/generate` 的流式响应行（字段按需出现）
#[derive(Deserialize)]
struct StreamChunk {
    message: Option<ChunkMessage>,
    response: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    content: String,
}

impl OllamaGenerationModel {
    pub fn new(base_url: &str, model_name: &str) -> Result<Self> {
        // 不设整体超时：流式响应的总时长由 token 预算决定
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            model_name: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 解析一行 NDJSON，提取 token 文本
    ///
    /// 空行和纯终止行（done 且无内容）返回 None。
    fn parse_line(line: &[u8]) -> Option<Result<String>> {
        let trimmed = std::str::from_utf8(line).ok()?.trim();
        if trimmed.is_empty() {
            return None;
        }

        let chunk: StreamChunk = match serde_json::from_str(trimmed) {
            Ok(chunk) => chunk,
            Err(e) => {
                return Some(Err(AppError::Generation(format!(
                    "malformed stream line: {}",
                    e
                ))));
            }
        };

        if let Some(error) = chunk.error {
            return Some(Err(AppError::Generation(error)));
        }

        let text = chunk
            .message
            .map(|m| m.content)
            .or(chunk.response)
            .unwrap_or_default();

        if chunk.done && text.is_empty() {
            return None;
        }

        Some(Ok(text))
    }

    fn request_body(&self, prompt: &Prompt, max_tokens: u32) -> (String, serde_json::Value) {
        match prompt {
            Prompt::Turns(turns) => (
                format!("{}/api/chat", self.base_url),
                serde_json::json!({
                    "model": self.model_name,
                    "messages": turns,
                    "stream": true,
                    "options": { "num_predict": max_tokens },
                }),
            ),
            Prompt::Text(text) => (
                format!("{}/api/generate", self.base_url),
                serde_json::json!({
                    "model": self.model_name,
                    "prompt": text,
                    "stream": true,
                    "options": { "num_predict": max_tokens },
                }),
            ),
        }
    }
}

#[async_trait]
impl GenerationModel for OllamaGenerationModel {
    async fn generate(&self, prompt: &Prompt, max_tokens: u32) -> Result<FragmentStream> {
        let (url, body) = self.request_body(prompt, max_tokens);

        let response = self.client.post(url).json(&body).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Ollama generation failed: {}",
                error_text
            )));
        }

        // 字节流 → 完整行 → token 片段
        let fragments = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), |buffer, chunk| {
                let fragments: Vec<Result<String>> = match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        let mut out = Vec::new();
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            if let Some(parsed) = Self::parse_line(&line) {
                                out.push(parsed);
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(AppError::Generation(format!(
                        "stream transport error: {}",
                        e
                    )))],
                };
                futures_util::future::ready(Some(fragments))
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(fragments))
    }

    fn supports_templating(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ChatTurn;

    #[test]
    fn test_parse_chat_line() {
        let line = br#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let parsed = OllamaGenerationModel::parse_line(line).unwrap().unwrap();
        assert_eq!(parsed, "Hel");
    }

    #[test]
    fn test_parse_generate_line() {
        let line = br#"{"response":"lo","done":false}"#;
        let parsed = OllamaGenerationModel::parse_line(line).unwrap().unwrap();
        assert_eq!(parsed, "lo");
    }

    #[test]
    fn test_terminal_line_is_skipped() {
        let line = br#"{"done":true}"#;
        assert!(OllamaGenerationModel::parse_line(line).is_none());
    }

    #[test]
    fn test_error_line_maps_to_generation_error() {
        let line = br#"{"error":"model not found"}"#;
        let parsed = OllamaGenerationModel::parse_line(line).unwrap();
        assert!(matches!(parsed, Err(AppError::Generation(_))));
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(OllamaGenerationModel::parse_line(b"  \n").is_none());
    }

    #[test]
    fn test_request_body_routes_by_prompt_shape() {
        let model = OllamaGenerationModel::new("http://localhost:11434", "qwen3:4b").unwrap();

        let (url, body) = model.request_body(
            &Prompt::Turns(vec![ChatTurn::new("user", "hi")]),
            100,
        );
        assert!(url.ends_with("/api/chat"));
        assert_eq!(body["options"]["num_predict"], 100);

        let (url, body) = model.request_body(&Prompt::Text("hi".into()), 50);
        assert!(url.ends_with("/api/generate"));
        assert_eq!(body["prompt"], "hi");
    }
}
