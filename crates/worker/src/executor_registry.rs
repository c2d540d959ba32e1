use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use analysis_core::models::{ExecutionPreferences, ToolExecutorDescriptor};
use analysis_core::traits::ToolExecutor;
use analysis_errors::{AnalysisError, AnalysisResult};
use tokio::sync::RwLock;
use tracing::debug;

/// 执行器实例工厂
pub type ExecutorFactory = Arc<dyn Fn() -> Arc<dyn ToolExecutor> + Send + Sync>;

/// 一条执行器注册记录
#[derive(Clone)]
pub struct ExecutorRegistration {
    pub descriptor: ToolExecutorDescriptor,
    /// 实现名，排序的最后一级
    pub implementation: String,
    factory: ExecutorFactory,
}

impl ExecutorRegistration {
    pub fn instantiate(&self) -> Arc<dyn ToolExecutor> {
        (self.factory)()
    }
}

impl fmt::Debug for ExecutorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistration")
            .field("descriptor", &self.descriptor)
            .field("implementation", &self.implementation)
            .finish()
    }
}

/// 工具执行器注册表
///
/// 以 `(tool_id, executor_id)` 为键，启动时显式注册。解析时按调用方
/// 可用的来源与框架过滤，再按偏好排序：
///
/// ```text
/// 1. 框架在偏好列表中的位置（不在列表中排最后）
/// 2. 来源在偏好列表中的位置
/// 3. 实现名
/// ```
#[derive(Clone, Default)]
pub struct ToolExecutorRegistry {
    executors: Arc<RwLock<HashMap<(String, String), ExecutorRegistration>>>,
}

impl ToolExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个可默认构造的执行器，实现名取类型名
    pub async fn register<E>(&self, descriptor: ToolExecutorDescriptor) -> AnalysisResult<()>
    where
        E: ToolExecutor + Default + 'static,
    {
        let factory: ExecutorFactory = Arc::new(|| Arc::new(E::default()) as Arc<dyn ToolExecutor>);
        self.register_with(descriptor, std::any::type_name::<E>(), factory)
            .await
    }

    pub async fn register_with<S: Into<String>>(
        &self,
        descriptor: ToolExecutorDescriptor,
        implementation: S,
        factory: ExecutorFactory,
    ) -> AnalysisResult<()> {
        let key = (descriptor.tool_id.clone(), descriptor.executor_id.clone());
        let mut executors = self.executors.write().await;
        if executors.contains_key(&key) {
            return Err(AnalysisError::DuplicateExecutor {
                tool_id: key.0,
                executor_id: key.1,
            });
        }

        let registration = ExecutorRegistration {
            descriptor,
            implementation: implementation.into(),
            factory,
        };
        debug!(
            "注册执行器: tool={}, executor={}, impl={}",
            key.0, key.1, registration.implementation
        );
        executors.insert(key, registration);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.executors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.executors.read().await.is_empty()
    }

    /// 某个工具的全部执行器
    pub async fn descriptors(&self, tool_id: &str) -> Vec<ToolExecutorDescriptor> {
        let mut descriptors: Vec<ToolExecutorDescriptor> = self
            .executors
            .read()
            .await
            .values()
            .filter(|r| r.descriptor.tool_id == tool_id)
            .map(|r| r.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.executor_id.cmp(&b.executor_id));
        descriptors
    }

    /// 为工具选出执行器
    pub async fn resolve(
        &self,
        tool_id: &str,
        executor_id: Option<&str>,
        preferences: &ExecutionPreferences,
    ) -> AnalysisResult<ExecutorRegistration> {
        let executors = self.executors.read().await;
        let mut candidates: Vec<&ExecutorRegistration> = executors
            .values()
            .filter(|r| r.descriptor.tool_id == tool_id)
            .filter(|r| executor_id.map_or(true, |id| r.descriptor.executor_id == id))
            .filter(|r| preferences.accepts(&r.descriptor))
            .collect();

        match candidates.len() {
            0 => Err(AnalysisError::ExecutorNotFound {
                tool_id: tool_id.to_string(),
                executor_id: executor_id.map(str::to_string),
                sources: preferences.sources.iter().map(|s| s.to_string()).collect(),
                frameworks: preferences.frameworks.iter().map(|f| f.to_string()).collect(),
            }),
            1 => Ok(candidates[0].clone()),
            n => {
                candidates.sort_by(|a, b| {
                    preferences
                        .framework_rank(a.descriptor.framework)
                        .cmp(&preferences.framework_rank(b.descriptor.framework))
                        .then_with(|| {
                            preferences
                                .source_rank(a.descriptor.source)
                                .cmp(&preferences.source_rank(b.descriptor.source))
                        })
                        .then_with(|| a.implementation.cmp(&b.implementation))
                });
                let selected = candidates[0];
                debug!(
                    "工具 {} 有 {} 个候选执行器，选择 {} ({}/{})",
                    tool_id,
                    n,
                    selected.descriptor.executor_id,
                    selected.descriptor.framework,
                    selected.descriptor.source
                );
                Ok(selected.clone())
            }
        }
    }
}
