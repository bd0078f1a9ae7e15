use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReqfileError {
    #[error("解析错误: {0}")]
    Parse(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("curl 命令解析失败: {0}")]
    Curl(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ReqfileError {
    fn from(err: anyhow::Error) -> Self {
        ReqfileError::Other(err.to_string())
    }
}

impl From<crate::parser::ParseError> for ReqfileError {
    fn from(err: crate::parser::ParseError) -> Self {
        ReqfileError::Parse(err.to_string())
    }
}

/// Result type for reqfile crate
pub type Result<T> = std::result::Result<T, ReqfileError>;
