//! 会话编排服务
//!
//! 一次请求的完整数据流：校验 → 存用户消息 → 检索上下文 →
//! 装配提示词 → 流式生成 → 修复 → 助手消息入库。
//! 修复与入库在独立任务里完成，调用方断开不会中止它们。

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::generation::GenerationModel;
use crate::services::conversation::{ConversationMemory, Role};
use crate::services::prompt::PromptAssembler;
use crate::services::repair::ResponseRepairer;
use crate::services::retrieval::ContextRetriever;
use crate::services::stream::{EVENT_CHANNEL_CAPACITY, StreamController, StreamEvent};

pub struct ChatService {
    memory: Arc<ConversationMemory>,
    retriever: Arc<ContextRetriever>,
    assembler: Arc<PromptAssembler>,
    generation: Arc<dyn GenerationModel>,
    repairer: Arc<ResponseRepairer>,
    max_tokens: u32,
}

impl ChatService {
    pub fn new(
        memory: Arc<ConversationMemory>,
        retriever: Arc<ContextRetriever>,
        assembler: Arc<PromptAssembler>,
        generation: Arc<dyn GenerationModel>,
        repairer: Arc<ResponseRepairer>,
        max_tokens: u32,
    ) -> Self {
        Self {
            memory,
            retriever,
            assembler,
            generation,
            repairer,
            max_tokens,
        }
    }

    /// 发起一次流式会话，返回事件接收端
    ///
    /// 用户消息在生成开始前立即入库。返回的接收端被丢弃即视为
    /// 取消：生成停止，但已累积的部分回答仍会修复并入库。
    pub async fn stream_chat(&self, message: &str) -> Result<mpsc::Receiver<StreamEvent>> {
        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(AppError::Validation("empty message".to_string()));
        }

        self.memory.append(Role::User, &message).await?;

        let snippets = self.retriever.retrieve(&message).await?;
        debug!("retrieved {} context snippets", snippets.len());

        let prompt =
            self.assembler
                .assemble(&snippets, &message, self.generation.supports_templating());

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let generation = Arc::clone(&self.generation);
        let repairer = Arc::clone(&self.repairer);
        let memory = Arc::clone(&self.memory);
        let max_tokens = self.max_tokens;

        tokio::spawn(async move {
            let outcome =
                StreamController::run(generation.as_ref(), &prompt, max_tokens, &tx).await;
            drop(tx);

            if outcome.cancelled {
                debug!("caller disconnected, committing partial answer");
            }

            // 一个 token 都没产出就没有可入库的回答
            if outcome.text.trim().is_empty() {
                return;
            }

            let repaired = repairer.repair(&outcome.text).await;
            if let Err(e) = memory.append(Role::Assistant, &repaired).await {
                error!("failed to store assistant message: {}", e);
            }
        });

        Ok(rx)
    }
}
