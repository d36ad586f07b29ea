use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use std::path::PathBuf;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 搜索路径：
    /// 1. ./config.yaml
    /// 2. 环境变量
    pub fn load() -> Result<AppConfig, figment::Error> {
        let figment = Figment::from(Serialized::defaults(AppConfig::development()))
            .merge(Yaml::file("config.yaml"))
            .merge(Env::prefixed("MANTA_").split("_").global());

        figment.extract()
    }

    /// 从指定路径加载配置
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        let figment = Figment::from(Serialized::defaults(AppConfig::development()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MANTA_").split("_").global());

        figment.extract()
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.embedding.dimension == 0 {
            return Err(ConfigValidationError::InvalidDimension);
        }

        if config.generation.max_tokens == 0 {
            return Err(ConfigValidationError::InvalidTokenBudget);
        }

        if config.retrieval.context_k == 0 {
            return Err(ConfigValidationError::InvalidContextK);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("向量维度无效，必须大于 0")]
    InvalidDimension,

    #[error("生成 token 预算无效，必须大于 0")]
    InvalidTokenBudget,

    #[error("检索条数无效，必须大于 0")]
    InvalidContextK,
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.yaml")
}

/// 检查配置文件是否存在
pub fn config_exists() -> bool {
    default_config_path().exists()
}
