use serde::{Deserialize, Serialize};

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 请求超时（秒）
    pub request_timeout: u64,
    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

/// 嵌入模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// 模型名称
    pub model_name: String,
    /// 向量维度
    pub dimension: usize,
    /// Embedding 后端类型: "ollama" 或 "simple"
    pub backend: String,
    /// Ollama 服务器地址
    pub ollama_url: String,
    /// Ollama 请求超时（秒）
    pub ollama_timeout: u64,
}

/// 生成模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GenerationConfig {
    /// 模型名称
    pub model_name: String,
    /// 生成后端类型: "ollama" 或 "script"
    pub backend: String,
    /// Ollama 服务器地址
    pub ollama_url: String,
    /// 单次响应的最大 token 数
    pub max_tokens: u32,
    /// 表格修复续写的 token 上限
    pub repair_max_tokens: u32,
    /// 系统提示词（格式化规则，纯配置文本）
    pub system_policy: String,
}

/// 检索配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 每次检索的上下文条数
    pub context_k: usize,
    /// 是否对检索结果做随机半数子采样
    pub subsample_enabled: bool,
    /// 子采样随机种子（便于测试复现）
    pub subsample_seed: Option<u64>,
}

/// 文档配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocumentConfig {
    /// 单个分块的最大字符数
    pub chunk_max_chars: usize,
    /// 每次回答检索的分块数
    pub chunk_k: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 嵌入模型配置
    pub embedding: EmbeddingConfig,
    /// 生成模型配置
    pub generation: GenerationConfig,
    /// 检索配置
    pub retrieval: RetrievalConfig,
    /// 文档配置
    pub document: DocumentConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 5006,
                request_timeout: 30,
                max_request_size: 10 * 1024 * 1024,
            },
            embedding: EmbeddingConfig {
                model_name: "all-minilm".into(),
                dimension: 384,
                backend: "simple".into(),
                ollama_url: "http://localhost:11434".into(),
                ollama_timeout: 60,
            },
            generation: GenerationConfig {
                model_name: "qwen3:4b".into(),
                backend: "ollama".into(),
                ollama_url: "http://localhost:11434".into(),
                max_tokens: 1000,
                repair_max_tokens: 200,
                system_policy: default_system_policy(),
            },
            retrieval: RetrievalConfig {
                context_k: 3,
                subsample_enabled: false,
                subsample_seed: None,
            },
            document: DocumentConfig {
                chunk_max_chars: 2000,
                chunk_k: 3,
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
            },
            app_name: "manta".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config
    }
}

/// 默认系统提示词
///
/// 描述输出格式规则，模型据此生成对比表格和列表。
pub fn default_system_policy() -> String {
    "You are a helpful AI assistant.\n\
     Format responses with proper Markdown:\n\
     - Use tables for comparisons\n\
     - Use bullet points for lists\n\
     - Maintain consistent spacing\n\
     - Always complete your thoughts"
        .to_string()
}
