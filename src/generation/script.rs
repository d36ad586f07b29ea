//! 脚本化生成模型
//!
//! 按预置片段序列回放的确定性后端。用于开发环境（无模型依赖）
//! 和测试（可观测请求次数与实际拉取的片段数）。

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AppError, Result};
use crate::generation::{FragmentStream, GenerationModel, Prompt};

pub struct ScriptedGenerationModel {
    script: Vec<String>,
    templating: bool,
    /// 在第 n 个片段之后注入一次上游错误
    fail_after: Option<usize>,
    /// 收到的每个提示词（平铺形态），按请求顺序
    prompts: Mutex<Vec<String>>,
    /// 已发起的生成请求数
    requests: AtomicUsize,
    /// 下游实际拉取的片段总数
    fragments_pulled: Arc<AtomicUsize>,
}

impl ScriptedGenerationModel {
    pub fn new(script: Vec<&str>) -> Self {
        Self {
            script: script.into_iter().map(String::from).collect(),
            templating: false,
            fail_after: None,
            prompts: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
            fragments_pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_templating(mut self, templating: bool) -> Self {
        self.templating = templating;
        self
    }

    pub fn failing_after(mut self, fragments: usize) -> Self {
        self.fail_after = Some(fragments);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn fragments_pulled(&self) -> usize {
        self.fragments_pulled.load(Ordering::SeqCst)
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Default for ScriptedGenerationModel {
    fn default() -> Self {
        Self::new(vec![
            "I am ", "a scripted ", "generation backend", ". Configure ",
            "an ollama backend ", "for real answers.",
        ])
    }
}

#[async_trait]
impl GenerationModel for ScriptedGenerationModel {
    async fn generate(&self, prompt: &Prompt, max_tokens: u32) -> Result<FragmentStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.flatten());

        let budget = (max_tokens as usize).min(self.script.len());
        let mut items: Vec<Result<String>> = self.script[..budget]
            .iter()
            .cloned()
            .map(Ok)
            .collect();

        if let Some(n) = self.fail_after {
            items.truncate(n.min(budget));
            items.push(Err(AppError::Generation("scripted backend fault".to_string())));
        }

        let pulled = Arc::clone(&self.fragments_pulled);
        let stream = futures_util::stream::iter(items).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        Ok(Box::pin(stream))
    }

    fn supports_templating(&self) -> bool {
        self.templating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_script_in_order() {
        let model = ScriptedGenerationModel::new(vec!["Hel", "lo"]);
        let mut stream = model
            .generate(&Prompt::Text("hi".into()), 100)
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert_eq!(stream.next().await.unwrap().unwrap(), "lo");
        assert!(stream.next().await.is_none());
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_max_tokens_bounds_fragments() {
        let model = ScriptedGenerationModel::new(vec!["a", "b", "c", "d"]);
        let stream = model
            .generate(&Prompt::Text("hi".into()), 2)
            .await
            .unwrap();

        let collected: Vec<_> = stream.collect().await;
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let model = ScriptedGenerationModel::new(vec!["a", "b", "c"]).failing_after(1);
        let stream = model
            .generate(&Prompt::Text("hi".into()), 100)
            .await
            .unwrap();

        let collected: Vec<_> = stream.collect().await;
        assert_eq!(collected.len(), 2);
        assert!(collected[0].is_ok());
        assert!(collected[1].is_err());
    }
}
