//! 检索服务
//!
//! 把用户问题转换为一组相关历史消息。可选的随机半数子采样
//! 用于在重复提问时让提示词多样化，默认关闭，可配种子复现。

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use std::sync::Arc;

use crate::config::config::RetrievalConfig;
use crate::error::Result;
use crate::index::EmbeddingModel;
use crate::services::conversation::ConversationMemory;

pub struct ContextRetriever {
    memory: Arc<ConversationMemory>,
    embedding_model: Arc<dyn EmbeddingModel>,
    config: RetrievalConfig,
}

impl ContextRetriever {
    pub fn new(
        memory: Arc<ConversationMemory>,
        embedding_model: Arc<dyn EmbeddingModel>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            memory,
            embedding_model,
            config,
        }
    }

    /// 检索与问题最相近的历史消息内容，按距离升序
    ///
    /// 空记忆直接返回空集，不触发嵌入计算。
    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        if self.memory.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_model.encode(query).await?;
        let hits = self.memory.search(&query_embedding, self.config.context_k)?;

        if self.config.subsample_enabled {
            Ok(Self::subsample(hits, self.config.subsample_seed))
        } else {
            Ok(hits)
        }
    }

    /// 随机保留一半（至少一条），保留项维持原有距离序
    fn subsample(hits: Vec<String>, seed: Option<u64>) -> Vec<String> {
        if hits.len() <= 1 {
            return hits;
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let keep = (hits.len() / 2).max(1);
        let mut chosen: Vec<usize> = sample(&mut rng, hits.len(), keep).into_vec();
        chosen.sort_unstable();

        chosen.into_iter().map(|i| hits[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SimpleEmbeddingModel;
    use crate::services::conversation::Role;

    fn retriever(memory: Arc<ConversationMemory>, config: RetrievalConfig) -> ContextRetriever {
        ContextRetriever::new(memory, Arc::new(SimpleEmbeddingModel::new(64)), config)
    }

    fn default_config() -> RetrievalConfig {
        RetrievalConfig {
            context_k: 3,
            subsample_enabled: false,
            subsample_seed: None,
        }
    }

    #[tokio::test]
    async fn test_empty_memory_returns_empty() {
        let memory = Arc::new(ConversationMemory::new(Arc::new(SimpleEmbeddingModel::new(64))));
        let retriever = retriever(memory, default_config());

        let context = retriever.retrieve("anything").await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_retrieves_most_similar_message() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(SimpleEmbeddingModel::new(64));
        let memory = Arc::new(ConversationMemory::new(Arc::clone(&embedder)));
        memory.append(Role::User, "What is Go?").await.unwrap();
        memory.append(Role::Assistant, "A language.").await.unwrap();

        let mut config = default_config();
        config.context_k = 1;
        let retriever = ContextRetriever::new(memory, embedder, config);

        // 哈希词袋下同词文本距离为零，最近邻必然是同一句
        let context = retriever.retrieve("What is Go?").await.unwrap();
        assert_eq!(context, vec!["What is Go?".to_string()]);
    }

    #[test]
    fn test_subsample_keeps_half_minimum_one() {
        let hits: Vec<String> = (0..4).map(|i| format!("m{}", i)).collect();
        let kept = ContextRetriever::subsample(hits, Some(7));
        assert_eq!(kept.len(), 2);

        let kept = ContextRetriever::subsample(vec!["only".to_string()], Some(7));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_subsample_is_seed_deterministic() {
        let hits: Vec<String> = (0..6).map(|i| format!("m{}", i)).collect();
        let first = ContextRetriever::subsample(hits.clone(), Some(42));
        let second = ContextRetriever::subsample(hits, Some(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_subsample_preserves_order() {
        let hits: Vec<String> = (0..8).map(|i| format!("m{}", i)).collect();
        let kept = ContextRetriever::subsample(hits, Some(3));
        let mut sorted = kept.clone();
        sorted.sort();
        assert_eq!(kept, sorted);
    }
}
