use thiserror::Error;

#[cfg(test)]
mod tests;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("参数校验失败: {0}")]
    Validation(String),
    #[error("目录服务错误: {0}")]
    Catalog(String),
    #[error("分析执行失败: {message}")]
    AnalysisExecution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("未找到工具 {tool_id} 的执行器 (executor={executor_id:?}, sources={sources:?}, frameworks={frameworks:?})")]
    ExecutorNotFound {
        tool_id: String,
        executor_id: Option<String>,
        sources: Vec<String>,
        frameworks: Vec<String>,
    },
    #[error("执行器重复注册: tool={tool_id}, executor={executor_id}")]
    DuplicateExecutor { tool_id: String, executor_id: String },
    #[error("校验和不一致: {origin} != {destination}")]
    ChecksumMismatch { origin: String, destination: String },
    #[error("不支持的URI: {0}")]
    UnsupportedUri(String),
    #[error("工具未找到: {0}")]
    ToolNotFound(String),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

impl AnalysisError {
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn catalog_error<S: Into<String>>(msg: S) -> Self {
        Self::Catalog(msg.into())
    }
    pub fn execution_error<S: Into<String>>(msg: S) -> Self {
        Self::AnalysisExecution {
            message: msg.into(),
            source: None,
        }
    }
    /// 包装执行交接阶段的底层错误，保留原始原因
    pub fn execution_failed<S, E>(msg: S, cause: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::AnalysisExecution {
            message: msg.into(),
            source: Some(cause.into()),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn tool_not_found<S: Into<String>>(tool: S) -> Self {
        Self::ToolNotFound(tool.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Internal(_) | AnalysisError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Catalog(_) | AnalysisError::Io(_) | AnalysisError::Timeout(_)
        )
    }
    /// 校验和解析错误在任何持久化之前就会失败
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            AnalysisError::Validation(_)
                | AnalysisError::ExecutorNotFound { .. }
                | AnalysisError::ToolNotFound(_)
        )
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        AnalysisError::Internal(err.to_string())
    }
}
