use async_trait::async_trait;
use url::Url;

use crate::models::{CatalogFile, FileUpdate, Job, JobUpdate, NewFile, NewJob};
use crate::AnalysisResult;

/// 目录服务接口
///
/// 作业与文件记录的唯一所有者。所有修改都是单点更新，不提供多步事务。
/// 任何失败都以 `AnalysisError::Catalog` 返回，由调用方决定是否继续。
#[async_trait]
pub trait CatalogManager: Send + Sync {
    /// 当前会话的用户
    fn user_id(&self) -> &str;

    async fn create_job(&self, job: NewJob) -> AnalysisResult<Job>;

    async fn modify_job(&self, job_id: i64, update: JobUpdate) -> AnalysisResult<Job>;

    async fn get_job(&self, job_id: i64) -> AnalysisResult<Job>;

    async fn create_file(&self, file: NewFile) -> AnalysisResult<CatalogFile>;

    async fn modify_file(&self, file_id: i64, update: FileUpdate) -> AnalysisResult<CatalogFile>;

    async fn get_file(&self, file_id: i64) -> AnalysisResult<CatalogFile>;

    /// 为作业分配临时输出目录，以调度器关联名为键
    async fn create_job_out_dir(&self, study_id: i64, name: &str) -> AnalysisResult<Url>;

    /// 文件的物理位置
    async fn get_file_uri(&self, file: &CatalogFile) -> AnalysisResult<Url>;
}
