//! 提示词装配服务
//!
//! 把系统策略、检索到的上下文和用户问题组装成一个提示词。
//! 上下文片段用空行分隔并包在带标签的区块里，让模型能够
//! 区分检索记忆与当前问题。

use crate::generation::{ChatTurn, Prompt};

/// 文档问答的兜底话术（策略文本，不是算法）
pub const DOCUMENT_FALLBACK_PHRASE: &str =
    "I couldn't find relevant information in the document.";

pub struct PromptAssembler {
    system_policy: String,
}

impl PromptAssembler {
    pub fn new(system_policy: &str) -> Self {
        Self {
            system_policy: system_policy.to_string(),
        }
    }

    /// 装配会话提示词
    ///
    /// 后端支持模板时输出结构化轮次，否则平铺为字符串。
    pub fn assemble(&self, snippets: &[String], user_query: &str, templating: bool) -> Prompt {
        let user_content = if snippets.is_empty() {
            format!("Question:\n{}", user_query)
        } else {
            format!(
                "<RelevantContext>\n{}\n</RelevantContext>\n\nQuestion:\n{}",
                snippets.join("\n\n"),
                user_query
            )
        };

        let turns = vec![
            ChatTurn::new("system", &self.system_policy),
            ChatTurn::new("user", &user_content),
        ];

        if templating {
            Prompt::Turns(turns)
        } else {
            Prompt::Text(Prompt::Turns(turns).flatten())
        }
    }

    /// 装配严格限定在文档上下文内作答的提示词
    pub fn assemble_document(
        &self,
        chunks: &[String],
        user_query: &str,
        templating: bool,
    ) -> Prompt {
        let content = format!(
            "You are an AI assistant that answers questions based only on the given context.\n\n\
             <UserQuestion>\n{}\n</UserQuestion>\n\n\
             <RelevantContext>\n{}\n</RelevantContext>\n\n\
             Instructions:\n\
             1. Answer using ONLY the provided context.\n\
             2. Be concise and accurate.\n\
             3. Format your response with Markdown:\n\
                - Use bullet points for lists\n\
                - Use tables for comparisons\n\
                - Use headings to organize content\n\
             4. If the answer isn't in the context, say:\n   \"{}\"",
            user_query,
            chunks.join("\n\n"),
            DOCUMENT_FALLBACK_PHRASE
        );

        let turns = vec![ChatTurn::new("user", &content)];

        if templating {
            Prompt::Turns(turns)
        } else {
            Prompt::Text(Prompt::Turns(turns).flatten())
        }
    }
}
