use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Job, ParameterSet};
use crate::AnalysisResult;

/// 作业执行管理器
///
/// 接收已持久化的作业，运行后返回反映执行结果的最新作业记录。
/// 本地子进程与网格调度（SGE）各有一个实现。
#[async_trait]
pub trait ExecutorManager: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, job: &Job) -> AnalysisResult<Job>;
}

/// 工具执行器运行时上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorContext {
    pub tool_id: String,
    pub executor_id: String,
    pub params: ParameterSet,
    pub executor_params: HashMap<String, serde_json::Value>,
    pub out_dir: PathBuf,
    /// 临时目录，运行结束后删除
    pub scratch_dir: PathBuf,
}

/// 工具的具体执行器
///
/// 同一个逻辑工具可以有多个物理实现（本地、MapReduce、Spark），
/// 通过执行器注册表按部署能力选择。
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(&self, context: &ExecutorContext) -> AnalysisResult<()>;
}
