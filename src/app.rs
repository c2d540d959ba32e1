use std::sync::Arc;

use anyhow::{Context, Result};
use analysis_core::traits::{CatalogManager, ExecutorManager, IoManager};
use analysis_core::{AppConfig, CatalogFile, Job, JobExecutorMode, ParameterSet};
use analysis_dispatcher::{synthesize, JobDispatcher, JobFactory, JobRequest, ToolManifestStore};
use analysis_infrastructure::{InMemoryCatalog, PosixIoManager};
use analysis_worker::{LocalExecutorManager, OutputRecorder, OutputReport, SgeExecutorManager};
use tracing::info;

/// 组装好的应用
///
/// 按配置把目录服务、存储IO、执行管理器、执行交接与作业工厂连接起来。
pub struct Application {
    config: AppConfig,
    catalog: Arc<InMemoryCatalog>,
    manifests: ToolManifestStore,
    recorder: Arc<OutputRecorder>,
    factory: JobFactory,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        let catalog = InMemoryCatalog::open(&config.catalog).context("打开目录失败")?;
        Ok(Self::with_catalog(config, catalog))
    }

    pub fn with_catalog(config: AppConfig, catalog: InMemoryCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let catalog_dyn: Arc<dyn CatalogManager> = catalog.clone();
        let io: Arc<dyn IoManager> = Arc::new(PosixIoManager::new());
        let recorder = Arc::new(OutputRecorder::new(catalog_dyn.clone(), io));

        let local: Arc<dyn ExecutorManager> = Arc::new(
            LocalExecutorManager::new(catalog_dyn.clone()).with_recorder(recorder.clone()),
        );
        let sge: Option<Arc<dyn ExecutorManager>> = match config.analysis.job_executor {
            JobExecutorMode::Sge => Some(Arc::new(SgeExecutorManager::new(
                config.analysis.sge.clone(),
            ))),
            JobExecutorMode::Local => None,
        };
        let dispatcher = Arc::new(JobDispatcher::from_config(
            &config.analysis,
            catalog_dyn.clone(),
            local,
            sge,
        ));

        info!(
            "应用初始化完成: executor={:?}, binaries={}",
            config.analysis.job_executor,
            config.analysis.binaries_path.display()
        );

        Self {
            manifests: ToolManifestStore::new(&config.analysis.binaries_path),
            factory: JobFactory::new(catalog_dyn, dispatcher),
            recorder,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn tool_params(&self, tool: &str) -> Result<String> {
        Ok(self.manifests.resolve(tool)?.params())
    }

    pub fn tool_help(&self, tool: &str, base_url: &str) -> Result<String> {
        Ok(self.manifests.resolve(tool)?.help(base_url))
    }

    pub fn command_line(&self, tool: &str, params: &ParameterSet) -> Result<String> {
        let descriptor = self.manifests.resolve(tool)?;
        let executable = descriptor.executable_path();
        Ok(synthesize(
            &executable.to_string_lossy(),
            params,
            &descriptor.valid_options(),
        )?)
    }

    pub async fn create_job(&self, tool: &str, request: JobRequest) -> Result<Job> {
        let descriptor = self.manifests.resolve(tool)?;
        let job = self
            .factory
            .create_job(&descriptor, request)
            .await
            .with_context(|| format!("创建作业失败: {tool}"))?;
        Ok(job)
    }

    pub async fn record_output(&self, job_id: i64) -> Result<OutputReport> {
        let job = self.catalog.get_job(job_id).await?;
        Ok(self.recorder.record_output(&job).await?)
    }

    pub async fn show_job(&self, job_id: i64) -> Result<Job> {
        Ok(self.catalog.get_job(job_id).await?)
    }

    pub async fn create_folder(&self, study_id: i64, path: &str) -> Result<CatalogFile> {
        Ok(self.catalog.create_folder(study_id, path).await?)
    }
}
