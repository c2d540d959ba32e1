use std::sync::Arc;
use std::time::Duration;

use analysis_core::config::{AnalysisConfig, JobExecutorMode};
use analysis_core::models::{Job, JobStatus, JobUpdate};
use analysis_core::traits::{CatalogManager, ExecutorManager};
use analysis_errors::{AnalysisError, AnalysisResult};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 作业执行交接
///
/// 作业先持久化再交接。交接在独立任务中运行，调用方通过
/// `DispatchHandle` 等待结果、设置超时或中止。
pub struct JobDispatcher {
    catalog: Arc<dyn CatalogManager>,
    local: Arc<dyn ExecutorManager>,
    sge: Option<Arc<dyn ExecutorManager>>,
    mode: JobExecutorMode,
    timeout: Option<Duration>,
}

impl JobDispatcher {
    pub fn new(catalog: Arc<dyn CatalogManager>, local: Arc<dyn ExecutorManager>) -> Self {
        Self {
            catalog,
            local,
            sge: None,
            mode: JobExecutorMode::Local,
            timeout: None,
        }
    }

    pub fn from_config(
        config: &AnalysisConfig,
        catalog: Arc<dyn CatalogManager>,
        local: Arc<dyn ExecutorManager>,
        sge: Option<Arc<dyn ExecutorManager>>,
    ) -> Self {
        let timeout = match config.dispatch_timeout_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };
        Self {
            catalog,
            local,
            sge,
            mode: config.job_executor,
            timeout,
        }
    }

    pub fn with_sge(mut self, sge: Arc<dyn ExecutorManager>) -> Self {
        self.sge = Some(sge);
        self
    }

    pub fn with_mode(mut self, mode: JobExecutorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn mode(&self) -> JobExecutorMode {
        self.mode
    }

    /// 在后台任务中交接作业，立即返回句柄
    pub fn dispatch(&self, job: Job) -> DispatchHandle {
        let job_id = job.id;
        let catalog = Arc::clone(&self.catalog);
        let mode = self.mode;
        let manager = match mode {
            JobExecutorMode::Local => Some(Arc::clone(&self.local)),
            JobExecutorMode::Sge => self.sge.clone(),
        };

        info!("交接作业: id={}, mode={:?}", job_id, mode);
        let handle = tokio::spawn(async move {
            let manager = manager.ok_or_else(|| {
                AnalysisError::config_error("SGE模式下未配置SGE执行管理器")
            })?;
            submit(catalog, manager, mode, job).await
        });

        DispatchHandle {
            job_id,
            handle,
            timeout: self.timeout,
        }
    }
}

async fn submit(
    catalog: Arc<dyn CatalogManager>,
    manager: Arc<dyn ExecutorManager>,
    mode: JobExecutorMode,
    job: Job,
) -> AnalysisResult<Job> {
    match mode {
        JobExecutorMode::Local => {
            debug!("作业 {} 由 {} 执行", job.id, manager.name());
            manager.run(&job).await
        }
        JobExecutorMode::Sge => {
            if let Err(e) = manager.run(&job).await {
                error!("作业 {} 提交到SGE失败: {}", job.id, e);
                return Err(AnalysisError::execution_failed("sge execution failed", e));
            }
            catalog
                .modify_job(job.id, JobUpdate::status(JobStatus::Queued))
                .await
        }
    }
}

/// 交接任务句柄
#[derive(Debug)]
pub struct DispatchHandle {
    job_id: i64,
    handle: JoinHandle<AnalysisResult<Job>>,
    timeout: Option<Duration>,
}

impl DispatchHandle {
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 中止交接。本地执行器的子进程随任务一起被终止，已提交到SGE的作业不受影响
    pub fn abort(&self) {
        warn!("中止作业交接: id={}", self.job_id);
        self.handle.abort();
    }

    /// 等待交接完成，超过超时时间时中止任务并返回 `Timeout`
    pub async fn wait(self) -> AnalysisResult<Job> {
        let DispatchHandle {
            job_id,
            mut handle,
            timeout,
        } = self;

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    // 等待任务真正被丢弃，子进程随之终止
                    let _ = (&mut handle).await;
                    return Err(AnalysisError::Timeout(format!(
                        "作业 {job_id} 交接超过 {}s",
                        limit.as_secs_f64()
                    )));
                }
            },
            None => handle.await,
        };

        joined.map_err(|e| {
            if e.is_cancelled() {
                AnalysisError::execution_error(format!("作业 {job_id} 的交接已被中止"))
            } else {
                AnalysisError::Internal(format!("作业 {job_id} 的交接任务异常退出: {e}"))
            }
        })?
    }
}
