use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use analysis_core::models::{
    CatalogFile, FileStatus, FileUpdate, IndexStatus, Job, JobStatus, JobUpdate, NewFile,
};
use analysis_core::traits::{CatalogManager, IoManager};
use analysis_errors::{AnalysisError, AnalysisResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// 作业属性中记录逐文件失败的键
pub const OUTPUT_FAILURES_ATTRIBUTE: &str = "outputFailures";

/// 单个文件登记失败的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStage {
    Register,
    Checksum,
    Copy,
    Verify,
    Finalize,
    Index,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub relative_path: String,
    pub stage: RecordStage,
    /// 已在目录中登记时的文件id，此时文件停留在 UPLOADING
    pub file_id: Option<i64>,
    pub error: String,
}

/// 一次输出登记的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputReport {
    pub job_id: i64,
    pub recorded: Vec<i64>,
    pub failures: Vec<FileFailure>,
}

impl OutputReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 输出登记器
///
/// 遍历作业的临时输出目录，把每个普通文件登记到目录服务并迁移到最终输出目录：
///
/// ```text
/// 登记(UPLOADING) → 源校验和 → 写入校验和/大小 → 复制 → 目标校验和
///     一致：删除源文件，READY
///     不一致：保留源文件，停留在 UPLOADING，记入失败报告
/// ```
///
/// 单个文件失败不影响其他文件，也不回滚已完成的文件。全部处理完后作业置为 DONE。
pub struct OutputRecorder {
    catalog: Arc<dyn CatalogManager>,
    io: Arc<dyn IoManager>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

/// 进行中的登记，离开作用域时释放
struct InFlightGuard {
    job_id: i64,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut jobs) = self.in_flight.lock() {
            jobs.remove(&self.job_id);
        }
    }
}

impl OutputRecorder {
    pub fn new(catalog: Arc<dyn CatalogManager>, io: Arc<dyn IoManager>) -> Self {
        Self {
            catalog,
            io,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn acquire(&self, job_id: i64) -> AnalysisResult<InFlightGuard> {
        let mut jobs = self
            .in_flight
            .lock()
            .map_err(|_| AnalysisError::Internal("输出登记状态锁已损坏".to_string()))?;
        if !jobs.insert(job_id) {
            return Err(AnalysisError::execution_error(format!(
                "作业 {job_id} 的输出正在登记中"
            )));
        }
        Ok(InFlightGuard {
            job_id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    #[instrument(skip(self, job), fields(job_id = job.id))]
    pub async fn record_output(&self, job: &Job) -> AnalysisResult<OutputReport> {
        let tmp_dir = &job.tmp_out_dir_uri;
        if tmp_dir.scheme() != "file" {
            warn!("不支持的临时目录协议，跳过输出登记: {}", tmp_dir);
            return Err(AnalysisError::UnsupportedUri(tmp_dir.to_string()));
        }
        let _guard = self.acquire(job.id)?;

        let tmp_root = tmp_dir
            .to_file_path()
            .map_err(|_| AnalysisError::UnsupportedUri(tmp_dir.to_string()))?;
        let out_dir = self.catalog.get_file(job.out_dir_id).await?;
        let files = self.io.list_files(tmp_dir)?;
        info!("登记作业输出: {} 个文件, 目标目录 {}", files.len(), out_dir.path);

        let mut report = OutputReport {
            job_id: job.id,
            ..Default::default()
        };
        for file in &files {
            let relative = relative_path(&tmp_root, file)?;
            match self.record_file(job, &out_dir, file, &relative).await {
                Ok(file_id) => report.recorded.push(file_id),
                Err(failure) => {
                    error!(
                        "文件登记失败: path={}, stage={:?}, error={}",
                        failure.relative_path, failure.stage, failure.error
                    );
                    report.failures.push(failure);
                }
            }
        }

        if let Some(indexed_file) = job.indexed_file_id() {
            let update = FileUpdate {
                index_status: Some(IndexStatus::Ready),
                ..Default::default()
            };
            if let Err(e) = self.catalog.modify_file(indexed_file, update).await {
                error!("更新索引状态失败: file={}, error={}", indexed_file, e);
                report.failures.push(FileFailure {
                    relative_path: String::new(),
                    stage: RecordStage::Index,
                    file_id: Some(indexed_file),
                    error: e.to_string(),
                });
            }
        }

        let mut output_file_ids = job.output_file_ids.clone();
        output_file_ids.extend(report.recorded.iter().copied());
        let mut update = JobUpdate {
            status: Some(JobStatus::Done),
            output_file_ids: Some(output_file_ids),
            end_time: Some(Utc::now()),
            ..Default::default()
        };
        if !report.is_complete() {
            update = update.with_attribute(
                OUTPUT_FAILURES_ATTRIBUTE,
                serde_json::to_value(&report.failures)?,
            );
        }
        self.catalog.modify_job(job.id, update).await?;

        info!(
            "作业输出登记完成: recorded={}, failed={}",
            report.recorded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn record_file(
        &self,
        job: &Job,
        out_dir: &CatalogFile,
        origin: &Url,
        relative: &str,
    ) -> Result<i64, FileFailure> {
        let fail = |stage: RecordStage, file_id: Option<i64>, error: AnalysisError| FileFailure {
            relative_path: relative.to_string(),
            stage,
            file_id,
            error: error.to_string(),
        };

        let path = format!("{}{}", out_dir.path, relative);
        let file = self
            .catalog
            .create_file(NewFile::uploading(job.study_id, path, job.id))
            .await
            .map_err(|e| fail(RecordStage::Register, None, e))?;
        let id = Some(file.id);

        let checksum = self
            .io
            .calculate_checksum(origin)
            .map_err(|e| fail(RecordStage::Checksum, id, e))?;
        let size = self
            .io
            .size(origin)
            .map_err(|e| fail(RecordStage::Checksum, id, e))?;
        self.catalog
            .modify_file(file.id, FileUpdate::checksum_and_size(&checksum, size))
            .await
            .map_err(|e| fail(RecordStage::Checksum, id, e))?;

        let target = self
            .catalog
            .get_file_uri(&file)
            .await
            .map_err(|e| fail(RecordStage::Copy, id, e))?;
        self.io
            .copy(origin, &target)
            .map_err(|e| fail(RecordStage::Copy, id, e))?;

        let target_checksum = self
            .io
            .calculate_checksum(&target)
            .map_err(|e| fail(RecordStage::Verify, id, e))?;
        if target_checksum != checksum {
            return Err(fail(
                RecordStage::Verify,
                id,
                AnalysisError::ChecksumMismatch {
                    origin: checksum,
                    destination: target_checksum,
                },
            ));
        }

        self.io
            .delete(origin)
            .map_err(|e| fail(RecordStage::Finalize, id, e))?;
        self.catalog
            .modify_file(file.id, FileUpdate::status(FileStatus::Ready))
            .await
            .map_err(|e| fail(RecordStage::Finalize, id, e))?;

        debug!("文件已登记: id={}, {} -> {}", file.id, origin, target);
        Ok(file.id)
    }
}

/// 文件相对于临时目录的路径，使用 `/` 分隔
fn relative_path(root: &Path, file: &Url) -> AnalysisResult<String> {
    let path = file
        .to_file_path()
        .map_err(|_| AnalysisError::UnsupportedUri(file.to_string()))?;
    let relative = path.strip_prefix(root).map_err(|_| {
        AnalysisError::Internal(format!(
            "{} 不在临时目录 {} 下",
            path.display(),
            root.display()
        ))
    })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
