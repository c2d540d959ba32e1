use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::models::{
    Job, JobStatus, JobUpdate, NewJob, ParameterSet, JOB_SCHEDULER_NAME, SIMULATED_JOB_ID,
};
use analysis_core::traits::CatalogManager;
use analysis_core::utils::random_job_name;
use analysis_errors::{AnalysisError, AnalysisResult};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::command_line::{check_required, synthesize};
use crate::dispatch::JobDispatcher;
use crate::manifest::ToolDescriptor;

/// 模拟作业的临时目录根
pub const SIMULATED_OUT_DIR_ROOT: &str = "/tmp/simulatedJobOutdir";
/// 交接失败时记录原因的属性键
pub const DISPATCH_ERROR_ATTRIBUTE: &str = "dispatchError";

/// 作业创建请求
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub study_id: i64,
    pub name: String,
    pub description: String,
    pub out_dir_id: i64,
    pub input_file_ids: Vec<i64>,
    pub params: ParameterSet,
    /// 持久化后立即执行
    pub execute: bool,
    /// 只在内存中构造作业，不落目录也不执行
    pub simulate: bool,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl JobRequest {
    pub fn new<S: Into<String>>(study_id: i64, name: S, out_dir_id: i64) -> Self {
        Self {
            study_id,
            name: name.into(),
            out_dir_id,
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: ParameterSet) -> Self {
        self.params = params;
        self
    }

    pub fn with_inputs(mut self, input_file_ids: Vec<i64>) -> Self {
        self.input_file_ids = input_file_ids;
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attribute<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn executed(mut self) -> Self {
        self.execute = true;
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulate = true;
        self
    }
}

/// 作业记录工厂
///
/// 三种模式：
///
/// ```text
/// simulate=true                 → 内存作业，id < 0，PREPARED，不访问目录
/// simulate=false, execute=false → 持久化 PREPARED 作业
/// simulate=false, execute=true  → 持久化 RUNNING 作业 → 交接执行 → 重新读取
/// ```
pub struct JobFactory {
    catalog: Arc<dyn CatalogManager>,
    dispatcher: Arc<JobDispatcher>,
}

impl JobFactory {
    pub fn new(catalog: Arc<dyn CatalogManager>, dispatcher: Arc<JobDispatcher>) -> Self {
        Self {
            catalog,
            dispatcher,
        }
    }

    #[instrument(skip(self, tool, request), fields(tool = %tool.manifest.id, job = %request.name))]
    pub async fn create_job(&self, tool: &ToolDescriptor, request: JobRequest) -> AnalysisResult<Job> {
        let valid_options = tool.valid_options();
        check_required(&request.params, &valid_options)?;

        let scheduler_name = random_job_name();
        let tmp_out_dir = if request.simulate {
            simulated_out_dir(&scheduler_name)?
        } else {
            self.catalog
                .create_job_out_dir(request.study_id, &scheduler_name)
                .await?
        };
        debug!("作业临时目录: {}", tmp_out_dir);

        let mut params = request.params.clone();
        params.insert(tool.output_param(), local_path(&tmp_out_dir).as_str());
        let executable = tool.executable_path();
        let command_line = synthesize(&executable.to_string_lossy(), &params, &valid_options)?;
        params.retain_known(&valid_options);

        let mut resource_manager_attributes = HashMap::new();
        resource_manager_attributes.insert(
            JOB_SCHEDULER_NAME.to_string(),
            serde_json::Value::String(scheduler_name.clone()),
        );

        if request.simulate {
            info!("模拟作业: {}", command_line);
            return Ok(Job {
                id: SIMULATED_JOB_ID,
                name: request.name,
                user_id: self.catalog.user_id().to_string(),
                tool_id: tool.manifest.id.clone(),
                executor_id: tool.execution.id.clone(),
                description: request.description,
                command_line,
                params: params.to_plain(),
                status: JobStatus::Prepared,
                study_id: request.study_id,
                out_dir_id: request.out_dir_id,
                tmp_out_dir_uri: tmp_out_dir,
                input_file_ids: request.input_file_ids,
                output_file_ids: Vec::new(),
                creation_time: Utc::now(),
                start_time: None,
                end_time: None,
                attributes: request.attributes,
                resource_manager_attributes,
            });
        }

        let (status, start_time) = if request.execute {
            (JobStatus::Running, Some(Utc::now()))
        } else {
            (JobStatus::Prepared, None)
        };

        let job = self
            .catalog
            .create_job(NewJob {
                study_id: request.study_id,
                name: request.name,
                tool_id: tool.manifest.id.clone(),
                executor_id: tool.execution.id.clone(),
                description: request.description,
                command_line,
                params: params.to_plain(),
                status,
                out_dir_id: request.out_dir_id,
                tmp_out_dir_uri: tmp_out_dir,
                input_file_ids: request.input_file_ids,
                start_time,
                attributes: request.attributes,
                resource_manager_attributes,
            })
            .await?;
        info!("作业已持久化: id={}, status={}", job.id, job.status);

        if !request.execute {
            return Ok(job);
        }

        let job_id = job.id;
        if let Err(e) = self.dispatcher.dispatch(job).wait().await {
            error!("作业 {} 执行交接失败: {}", job_id, e);
            self.settle_failed_dispatch(job_id, &e).await;
            return Err(AnalysisError::execution_failed(
                format!("作业 {job_id} 执行交接失败"),
                e,
            ));
        }
        self.catalog.get_job(job_id).await
    }

    /// 交接失败后收尾：尚未结束的作业超时标记为 ABORTED，其他失败标记为 ERROR。
    /// 收尾本身失败只记录日志。
    async fn settle_failed_dispatch(&self, job_id: i64, cause: &AnalysisError) {
        let current = match self.catalog.get_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!("读取交接失败的作业 {} 失败: {}", job_id, e);
                return;
            }
        };
        if current.status.is_finished() {
            return;
        }

        let status = match cause {
            AnalysisError::Timeout(_) => JobStatus::Aborted,
            _ => JobStatus::Error,
        };
        let update = JobUpdate {
            end_time: Some(Utc::now()),
            ..JobUpdate::status(status)
        }
        .with_attribute(DISPATCH_ERROR_ATTRIBUTE, serde_json::json!(cause.to_string()));
        if let Err(e) = self.catalog.modify_job(job_id, update).await {
            warn!("更新交接失败的作业 {} 状态失败: {}", job_id, e);
        }
    }
}

/// 模拟作业的临时目录，不在磁盘上创建
fn simulated_out_dir(scheduler_name: &str) -> AnalysisResult<Url> {
    let path = format!("{}/{}/", SIMULATED_OUT_DIR_ROOT, scheduler_name);
    Url::from_directory_path(&path)
        .map_err(|_| AnalysisError::Internal(format!("无效的模拟目录: {path}")))
}

/// 传给可执行文件的输出目录路径
fn local_path(uri: &Url) -> String {
    uri.to_file_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| uri.path().to_string())
}
