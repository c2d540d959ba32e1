use std::collections::HashMap;
use std::path::{Path, PathBuf};

use analysis_core::config::AppConfig;
use analysis_core::models::{
    ExecutionPreferences, Framework, ParameterSet, Source, StorageEngine, ToolType,
};
use analysis_core::traits::ExecutorContext;
use analysis_core::utils::random_alphanumeric;
use analysis_errors::AnalysisResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::executor_registry::ToolExecutorRegistry;

/// 参数中显式指定执行器的键
pub const EXECUTOR_ID_PARAM: &str = "executorId";

#[derive(Debug, Clone, Default)]
pub struct ToolRunRequest {
    pub tool_id: String,
    pub tool_type: ToolType,
    pub executor_id: Option<String>,
    pub params: ParameterSet,
    pub executor_params: HashMap<String, serde_json::Value>,
    pub out_dir: PathBuf,
}

impl ToolRunRequest {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(tool_id: S, out_dir: P) -> Self {
        Self {
            tool_id: tool_id.into(),
            out_dir: out_dir.into(),
            ..Default::default()
        }
    }

    /// 显式执行器优先，其次是执行器参数，最后是普通参数
    fn requested_executor(&self) -> Option<String> {
        self.executor_id
            .clone()
            .or_else(|| {
                self.executor_params
                    .get(EXECUTOR_ID_PARAM)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .or_else(|| {
                self.params
                    .get(EXECUTOR_ID_PARAM)
                    .and_then(|v| v.first())
                    .map(str::to_string)
            })
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Done,
    Error,
}

/// 一次工具运行的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub tool_id: String,
    pub executor_id: String,
    pub source: Source,
    pub framework: Framework,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

/// 工具运行器
///
/// 按部署的存储引擎推导可用来源与框架，从注册表中选出执行器，
/// 在独立的 scratch 目录中运行，结束后删除该目录。
pub struct ToolRunner {
    registry: ToolExecutorRegistry,
    storage_engine: StorageEngine,
    scratch_dir: Option<PathBuf>,
}

impl ToolRunner {
    pub fn new(
        registry: ToolExecutorRegistry,
        storage_engine: StorageEngine,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            registry,
            storage_engine,
            scratch_dir,
        }
    }

    pub fn from_config(registry: ToolExecutorRegistry, config: &AppConfig) -> Self {
        Self::new(
            registry,
            config.storage.default_engine,
            config.analysis.scratch_dir.clone(),
        )
    }

    pub fn preferences(&self, tool_type: ToolType) -> ExecutionPreferences {
        ExecutionPreferences::for_engine(self.storage_engine, tool_type)
    }

    /// 执行器解析失败或 scratch 目录无法创建时返回错误；
    /// 执行器本身失败时返回 `ExecutionStatus::Error` 的结果。
    pub async fn run(&self, request: ToolRunRequest) -> AnalysisResult<ExecutionResult> {
        let preferences = self.preferences(request.tool_type);
        let requested = request.requested_executor();
        let registration = self
            .registry
            .resolve(&request.tool_id, requested.as_deref(), &preferences)
            .await?;
        let descriptor = registration.descriptor.clone();
        info!(
            "运行工具 {}: executor={}, impl={}",
            request.tool_id, descriptor.executor_id, registration.implementation
        );

        let mut warnings = Vec::new();
        let base = self.scratch_base(&request.out_dir, &mut warnings);
        let scratch_dir = base.join(format!(
            "scratch_{}{}",
            request.tool_id,
            random_alphanumeric(10)
        ));
        tokio::fs::create_dir_all(&scratch_dir).await?;

        let mut executor_params = request.executor_params;
        executor_params.insert(
            EXECUTOR_ID_PARAM.to_string(),
            serde_json::Value::String(descriptor.executor_id.clone()),
        );
        let context = ExecutorContext {
            tool_id: request.tool_id.clone(),
            executor_id: descriptor.executor_id.clone(),
            params: request.params,
            executor_params,
            out_dir: request.out_dir,
            scratch_dir: scratch_dir.clone(),
        };

        let start = Utc::now();
        let outcome = registration.instantiate().execute(&context).await;
        let end = Utc::now();

        if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
            let message = format!("删除scratch目录 {} 失败: {}", scratch_dir.display(), e);
            warn!("{}", message);
            warnings.push(message);
        }

        let (status, error) = match outcome {
            Ok(()) => (ExecutionStatus::Done, None),
            Err(e) => {
                warn!("工具 {} 执行失败: {}", request.tool_id, e);
                (ExecutionStatus::Error, Some(e.to_string()))
            }
        };

        Ok(ExecutionResult {
            tool_id: request.tool_id,
            executor_id: descriptor.executor_id,
            source: descriptor.source,
            framework: descriptor.framework,
            start,
            end,
            status,
            warnings,
            error,
        })
    }

    /// 配置的 scratch 目录不可用时回退到输出目录
    fn scratch_base(&self, out_dir: &Path, warnings: &mut Vec<String>) -> PathBuf {
        let Some(ref scratch) = self.scratch_dir else {
            return out_dir.to_path_buf();
        };
        let writable = std::fs::metadata(scratch)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if writable {
            scratch.clone()
        } else {
            let message = format!("无法访问scratch目录 '{}'", scratch.display());
            warn!("{}", message);
            warnings.push(message);
            out_dir.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use analysis_core::models::ToolExecutorDescriptor;
    use analysis_core::traits::ToolExecutor;
    use analysis_errors::AnalysisError;
    use analysis_testing_utils::RecordingToolExecutor;

    use crate::executor_registry::ExecutorFactory;

    async fn registry_with(executor: RecordingToolExecutor, framework: Framework) -> ToolExecutorRegistry {
        let registry = ToolExecutorRegistry::new();
        let id = executor.id().to_string();
        let factory: ExecutorFactory = Arc::new(move || Arc::new(executor.clone()) as Arc<dyn ToolExecutor>);
        registry
            .register_with(
                ToolExecutorDescriptor::new("variant-stats", id, Source::Storage, framework),
                "RecordingToolExecutor",
                factory,
            )
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_run_uses_scratch_dir_and_cleans_up() {
        let temp = tempfile::tempdir().unwrap();
        let scratch_root = temp.path().join("scratch");
        std::fs::create_dir_all(&scratch_root).unwrap();
        let executor = RecordingToolExecutor::new("local-stats");
        let registry = registry_with(executor.clone(), Framework::Local).await;
        let runner = ToolRunner::new(registry, StorageEngine::Local, Some(scratch_root.clone()));

        let result = runner
            .run(ToolRunRequest::new("variant-stats", temp.path().join("out")))
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Done);
        assert_eq!(result.executor_id, "local-stats");
        assert_eq!(result.framework, Framework::Local);
        assert!(result.warnings.is_empty());
        assert!(result.end >= result.start);

        let contexts = executor.contexts();
        assert_eq!(contexts.len(), 1);
        let scratch = &contexts[0].scratch_dir;
        assert!(scratch.starts_with(&scratch_root));
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scratch_variant-stats"));
        assert!(!scratch.exists());
        assert_eq!(
            contexts[0]
                .executor_params
                .get(EXECUTOR_ID_PARAM)
                .and_then(|v| v.as_str()),
            Some("local-stats")
        );
    }

    #[tokio::test]
    async fn test_missing_scratch_dir_falls_back_with_warning() {
        let temp = tempfile::tempdir().unwrap();
        let executor = RecordingToolExecutor::new("local-stats");
        let registry = registry_with(executor.clone(), Framework::Local).await;
        let runner = ToolRunner::new(registry, StorageEngine::Local, Some(temp.path().join("nope")));
        let out_dir = temp.path().join("out");

        let result = runner
            .run(ToolRunRequest::new("variant-stats", &out_dir))
            .await
            .unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(executor.contexts()[0].scratch_dir.starts_with(&out_dir));
    }

    #[tokio::test]
    async fn test_executor_failure_is_reported_in_result() {
        let temp = tempfile::tempdir().unwrap();
        let registry = registry_with(RecordingToolExecutor::failing("local-stats"), Framework::Local).await;
        let runner = ToolRunner::new(registry, StorageEngine::Local, None);

        let result = runner
            .run(ToolRunRequest::new("variant-stats", temp.path()))
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.unwrap().contains("failed on purpose"));
    }

    #[tokio::test]
    async fn test_unavailable_framework_fails_before_scratch() {
        let temp = tempfile::tempdir().unwrap();
        let registry =
            registry_with(RecordingToolExecutor::new("mr-stats"), Framework::MapReduce).await;
        let runner = ToolRunner::new(registry, StorageEngine::Local, None);

        let err = runner
            .run(ToolRunRequest::new("variant-stats", temp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ExecutorNotFound { .. }));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_requested_executor_precedence() {
        let mut request = ToolRunRequest::new("t", "/tmp");
        request.params.insert(EXECUTOR_ID_PARAM, "from-params");
        assert_eq!(request.requested_executor().as_deref(), Some("from-params"));
        request
            .executor_params
            .insert(EXECUTOR_ID_PARAM.to_string(), serde_json::json!("from-executor"));
        assert_eq!(request.requested_executor().as_deref(), Some("from-executor"));
        request.executor_id = Some("explicit".to_string());
        assert_eq!(request.requested_executor().as_deref(), Some("explicit"));
    }
}
