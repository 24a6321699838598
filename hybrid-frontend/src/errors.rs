use hybrid_config::ConfigError;
use hybrid_engine::errors::EngineError;
use hybrid_io::IoError;
use thiserror::Error;

use crate::editor::EditError;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("命令 `{name}` 执行失败: {message}")]
    Command { name: String, message: String },
    #[error("参数无效: {0}")]
    InvalidArgument(String),
}
