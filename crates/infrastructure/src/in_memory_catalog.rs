use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use analysis_core::config::CatalogConfig;
use analysis_core::models::{
    CatalogFile, FileType, FileUpdate, Job, JobUpdate, NewFile, NewJob,
};
use analysis_core::traits::CatalogManager;
use analysis_errors::{AnalysisError, AnalysisResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// 目录状态，整体序列化为快照
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct CatalogState {
    next_job_id: i64,
    next_file_id: i64,
    jobs: BTreeMap<i64, Job>,
    files: BTreeMap<i64, CatalogFile>,
}

impl CatalogState {
    fn insert_job(&mut self, job: NewJob, user_id: String) -> AnalysisResult<Job> {
        if !self.files.contains_key(&job.out_dir_id) {
            return Err(AnalysisError::catalog_error(format!(
                "输出目录不存在: {}",
                job.out_dir_id
            )));
        }
        if let Some(missing) = job
            .input_file_ids
            .iter()
            .find(|id| !self.files.contains_key(*id))
        {
            return Err(AnalysisError::catalog_error(format!(
                "输入文件不存在: {missing}"
            )));
        }

        self.next_job_id += 1;
        let created = Job {
            id: self.next_job_id,
            name: job.name,
            user_id,
            tool_id: job.tool_id,
            executor_id: job.executor_id,
            description: job.description,
            command_line: job.command_line,
            params: job.params,
            status: job.status,
            study_id: job.study_id,
            out_dir_id: job.out_dir_id,
            tmp_out_dir_uri: job.tmp_out_dir_uri,
            input_file_ids: job.input_file_ids,
            output_file_ids: Vec::new(),
            creation_time: Utc::now(),
            start_time: job.start_time,
            end_time: None,
            attributes: job.attributes,
            resource_manager_attributes: job.resource_manager_attributes,
        };
        self.jobs.insert(created.id, created.clone());
        Ok(created)
    }

    fn insert_file(&mut self, file: NewFile) -> AnalysisResult<CatalogFile> {
        if self
            .files
            .values()
            .any(|f| f.study_id == file.study_id && f.path == file.path)
        {
            return Err(AnalysisError::catalog_error(format!(
                "文件已存在: study={}, path={}",
                file.study_id, file.path
            )));
        }

        self.next_file_id += 1;
        let created = CatalogFile {
            id: self.next_file_id,
            study_id: file.study_id,
            name: file_name(&file.path),
            path: file.path,
            file_type: file.file_type,
            uri: None,
            size: 0,
            checksum: None,
            status: file.status,
            job_id: file.job_id,
            index: None,
            creation_time: Utc::now(),
            attributes: Default::default(),
        };
        self.files.insert(created.id, created.clone());
        Ok(created)
    }
}

/// 内存目录服务实现
///
/// 文件按 `<root_dir>/<path>` 映射到本地磁盘，作业临时目录位于
/// `<jobs_dir>/<study>/<name>/`。配置了快照路径时，每次修改先把完整状态
/// 写成 JSON，写入成功后修改才对调用方可见；CLI 的多次调用之间由此共享
/// 作业与文件记录。
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    user_id: String,
    root_dir: PathBuf,
    jobs_dir: PathBuf,
    snapshot_path: Option<PathBuf>,
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// 打开目录，存在快照时从快照恢复
    pub fn open(config: &CatalogConfig) -> AnalysisResult<Self> {
        let state = match config.snapshot_path {
            Some(ref path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let state: CatalogState = serde_json::from_str(&content)?;
                info!(
                    "从快照恢复目录: {} ({} 个作业, {} 个文件)",
                    path.display(),
                    state.jobs.len(),
                    state.files.len()
                );
                state
            }
            _ => CatalogState::default(),
        };

        Ok(Self {
            user_id: config.user_id.clone(),
            root_dir: absolute(&config.root_dir)?,
            jobs_dir: absolute(&config.jobs_dir)?,
            snapshot_path: config.snapshot_path.clone(),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// 不落盘的目录，测试使用
    pub fn ephemeral<P: AsRef<Path>>(root: P) -> AnalysisResult<Self> {
        let root = root.as_ref();
        Self::open(&CatalogConfig {
            root_dir: root.join("data"),
            jobs_dir: root.join("jobs"),
            snapshot_path: None,
            user_id: "test".to_string(),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// 注册目录并在磁盘上创建对应文件夹
    pub async fn create_folder(&self, study_id: i64, path: &str) -> AnalysisResult<CatalogFile> {
        let folder = self
            .create_file(NewFile::folder(study_id, path.trim_start_matches('/').to_string()))
            .await?;
        let dir = self.root_dir.join(&folder.path);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(folder)
    }

    pub async fn find_file_by_path(&self, study_id: i64, path: &str) -> Option<CatalogFile> {
        let state = self.state.read().await;
        state
            .files
            .values()
            .find(|f| f.study_id == study_id && f.path == path)
            .cloned()
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        self.state.read().await.jobs.values().cloned().collect()
    }

    /// 在状态副本上修改，快照写入成功后才替换内存状态
    async fn commit<T, F>(&self, mutate: F) -> AnalysisResult<T>
    where
        F: FnOnce(&mut CatalogState) -> AnalysisResult<T>,
    {
        let mut state = self.state.write().await;
        if self.snapshot_path.is_none() {
            return mutate(&mut *state);
        }
        let mut candidate = (*state).clone();
        let result = mutate(&mut candidate)?;
        self.persist(&candidate).await?;
        *state = candidate;
        Ok(result)
    }

    async fn persist(&self, state: &CatalogState) -> AnalysisResult<()> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, content).await?;
        debug!("目录快照已写入: {}", path.display());
        Ok(())
    }
}

fn absolute(path: &Path) -> AnalysisResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn file_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl CatalogManager for InMemoryCatalog {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn create_job(&self, job: NewJob) -> AnalysisResult<Job> {
        let user_id = self.user_id.clone();
        let created = self.commit(|state| state.insert_job(job, user_id)).await?;
        info!("作业已创建: id={}, name={}, status={}", created.id, created.name, created.status);
        Ok(created)
    }

    async fn modify_job(&self, job_id: i64, update: JobUpdate) -> AnalysisResult<Job> {
        let updated = self
            .commit(|state| {
                let job = state
                    .jobs
                    .get_mut(&job_id)
                    .ok_or_else(|| AnalysisError::catalog_error(format!("作业不存在: {job_id}")))?;
                update.apply(job);
                Ok(job.clone())
            })
            .await?;
        debug!("作业已更新: id={}, status={}", job_id, updated.status);
        Ok(updated)
    }

    async fn get_job(&self, job_id: i64) -> AnalysisResult<Job> {
        self.state
            .read()
            .await
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AnalysisError::catalog_error(format!("作业不存在: {job_id}")))
    }

    async fn create_file(&self, file: NewFile) -> AnalysisResult<CatalogFile> {
        let created = self.commit(|state| state.insert_file(file)).await?;
        debug!("文件已登记: id={}, path={}", created.id, created.path);
        Ok(created)
    }

    async fn modify_file(&self, file_id: i64, update: FileUpdate) -> AnalysisResult<CatalogFile> {
        self.commit(|state| {
            let file = state
                .files
                .get_mut(&file_id)
                .ok_or_else(|| AnalysisError::catalog_error(format!("文件不存在: {file_id}")))?;
            update.apply(file);
            Ok(file.clone())
        })
        .await
    }

    async fn get_file(&self, file_id: i64) -> AnalysisResult<CatalogFile> {
        self.state
            .read()
            .await
            .files
            .get(&file_id)
            .cloned()
            .ok_or_else(|| AnalysisError::catalog_error(format!("文件不存在: {file_id}")))
    }

    async fn create_job_out_dir(&self, study_id: i64, name: &str) -> AnalysisResult<Url> {
        let dir = self.jobs_dir.join(study_id.to_string()).join(name);
        tokio::fs::create_dir_all(&dir).await?;
        debug!("作业临时目录: study={}, dir={}", study_id, dir.display());
        Url::from_directory_path(&dir)
            .map_err(|_| AnalysisError::catalog_error(format!("无效的目录路径: {}", dir.display())))
    }

    async fn get_file_uri(&self, file: &CatalogFile) -> AnalysisResult<Url> {
        if let Some(ref uri) = file.uri {
            return Ok(uri.clone());
        }
        let path = self.root_dir.join(&file.path);
        let uri = match file.file_type {
            FileType::Directory => Url::from_directory_path(&path),
            FileType::File => Url::from_file_path(&path),
        };
        uri.map_err(|_| AnalysisError::catalog_error(format!("无效的文件路径: {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::models::{FileStatus, JobStatus};
    use std::collections::HashMap;

    fn new_job(out_dir_id: i64, tmp: Url) -> NewJob {
        NewJob {
            study_id: 1,
            name: "J_test".to_string(),
            tool_id: "samtools".to_string(),
            executor_id: "view".to_string(),
            description: String::new(),
            command_line: "samtools view".to_string(),
            params: BTreeMap::new(),
            status: JobStatus::Prepared,
            out_dir_id,
            tmp_out_dir_uri: tmp,
            input_file_ids: vec![],
            start_time: None,
            attributes: HashMap::new(),
            resource_manager_attributes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_folder_and_file_uris() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = InMemoryCatalog::ephemeral(temp.path()).unwrap();

        let folder = catalog.create_folder(1, "results").await.unwrap();
        assert_eq!(folder.path, "results/");
        assert_eq!(folder.name, "results");
        assert!(temp.path().join("data/results").is_dir());

        let uri = catalog.get_file_uri(&folder).await.unwrap();
        assert!(uri.as_str().ends_with("/data/results/"));

        let file = catalog
            .create_file(NewFile::uploading(1, "results/a.bam".to_string(), 7))
            .await
            .unwrap();
        assert_eq!(file.name, "a.bam");
        assert_eq!(file.status, FileStatus::Uploading);
        let uri = catalog.get_file_uri(&file).await.unwrap();
        assert_eq!(uri, uri_of(&temp.path().join("data/results/a.bam")));
    }

    fn uri_of(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_path_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = InMemoryCatalog::ephemeral(temp.path()).unwrap();
        catalog.create_folder(1, "out").await.unwrap();
        let err = catalog.create_folder(1, "out/").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Catalog(_)));
        assert!(catalog.create_folder(2, "out").await.is_ok());
    }

    #[tokio::test]
    async fn test_job_lifecycle_and_missing_records() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = InMemoryCatalog::ephemeral(temp.path()).unwrap();
        let folder = catalog.create_folder(1, "out").await.unwrap();
        let tmp = catalog.create_job_out_dir(1, "J_test").await.unwrap();
        assert!(temp.path().join("jobs/1/J_test").is_dir());
        assert_eq!(tmp, Url::from_directory_path(temp.path().join("jobs/1/J_test")).unwrap());

        let err = catalog.create_job(new_job(999, tmp.clone())).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Catalog(_)));

        let job = catalog.create_job(new_job(folder.id, tmp)).await.unwrap();
        assert_eq!(job.user_id, "test");
        let job = catalog
            .modify_job(job.id, JobUpdate::status(JobStatus::Running))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(catalog.get_job(job.id).await.unwrap(), job);
        assert!(catalog.get_job(job.id + 1).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            root_dir: temp.path().join("data"),
            jobs_dir: temp.path().join("jobs"),
            snapshot_path: Some(temp.path().join("state/catalog.json")),
            user_id: "lab".to_string(),
        };

        let folder_id = {
            let catalog = InMemoryCatalog::open(&config).unwrap();
            catalog.create_folder(3, "outputs").await.unwrap().id
        };

        let reopened = InMemoryCatalog::open(&config).unwrap();
        let folder = reopened.get_file(folder_id).await.unwrap();
        assert_eq!(folder.path, "outputs/");
        let next = reopened.create_folder(3, "other").await.unwrap();
        assert_eq!(next.id, folder_id + 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_state_unchanged() {
        let temp = tempfile::tempdir().unwrap();
        let snapshot_dir = temp.path().join("state");
        let config = CatalogConfig {
            root_dir: temp.path().join("data"),
            jobs_dir: temp.path().join("jobs"),
            snapshot_path: Some(snapshot_dir.join("catalog.json")),
            user_id: "lab".to_string(),
        };
        let catalog = InMemoryCatalog::open(&config).unwrap();
        let folder = catalog.create_folder(1, "out").await.unwrap();
        let tmp = catalog.create_job_out_dir(1, "J_test").await.unwrap();
        let job = catalog.create_job(new_job(folder.id, tmp)).await.unwrap();

        // 快照路径被目录占用，写入失败
        std::fs::remove_file(snapshot_dir.join("catalog.json")).unwrap();
        std::fs::create_dir_all(snapshot_dir.join("catalog.json")).unwrap();

        let err = catalog
            .modify_job(job.id, JobUpdate::status(JobStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
        assert_eq!(catalog.get_job(job.id).await.unwrap().status, JobStatus::Prepared);

        assert!(catalog
            .create_file(NewFile::uploading(1, "out/a.bam".to_string(), job.id))
            .await
            .is_err());
        assert!(catalog.find_file_by_path(1, "out/a.bam").await.is_none());
        assert_eq!(catalog.list_jobs().await.len(), 1);
    }
}
