//! Mock implementations of the collaborator traits
//!
//! All mocks keep their state behind `Arc<Mutex<..>>` and record the calls
//! they receive so tests can assert on interactions.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_core::models::{
    CatalogFile, FileType, FileUpdate, Job, JobStatus, JobUpdate, NewFile, NewJob,
};
use analysis_core::traits::{CatalogManager, ExecutorContext, ExecutorManager, IoManager, ToolExecutor};
use analysis_errors::{AnalysisError, AnalysisResult};
use analysis_infrastructure::PosixIoManager;
use async_trait::async_trait;
use chrono::Utc;
use url::Url;

const READ_CALLS: &[&str] = &["get_job", "get_file", "get_file_uri"];

#[derive(Debug, Default)]
struct MockCatalogState {
    jobs: HashMap<i64, Job>,
    files: HashMap<i64, CatalogFile>,
    next_job_id: i64,
    next_file_id: i64,
    calls: Vec<String>,
    fail_create_job: bool,
}

/// Mock catalog rooted at a test directory
///
/// Files map to `<root>/data/<path>`, job temp dirs to `<root>/jobs/<name>/`.
#[derive(Debug, Clone)]
pub struct MockCatalog {
    root: PathBuf,
    state: Arc<Mutex<MockCatalogState>>,
}

impl MockCatalog {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state: Arc::new(Mutex::new(MockCatalogState::default())),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Register a folder without recording a call
    pub fn add_folder(&self, study_id: i64, path: &str) -> CatalogFile {
        let new_file = NewFile::folder(study_id, path.to_string());
        std::fs::create_dir_all(self.data_dir().join(&new_file.path)).expect("create folder");
        let mut state = self.state.lock().unwrap();
        Self::insert_file(&mut state, new_file)
    }

    /// Insert a job as-is without recording a call
    pub fn add_job(&self, job: Job) -> Job {
        let mut state = self.state.lock().unwrap();
        state.next_job_id = state.next_job_id.max(job.id);
        state.jobs.insert(job.id, job.clone());
        job
    }

    pub fn fail_create_job(&self) {
        self.state.lock().unwrap().fail_create_job = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    /// Number of calls that create or modify records
    pub fn persistence_calls(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| !READ_CALLS.contains(&c.as_str()))
            .count()
    }

    pub fn files(&self) -> Vec<CatalogFile> {
        let mut files: Vec<CatalogFile> =
            self.state.lock().unwrap().files.values().cloned().collect();
        files.sort_by_key(|f| f.id);
        files
    }

    pub fn job(&self, job_id: i64) -> Option<Job> {
        self.state.lock().unwrap().jobs.get(&job_id).cloned()
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }

    fn insert_file(state: &mut MockCatalogState, file: NewFile) -> CatalogFile {
        state.next_file_id += 1;
        let name = file
            .path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let created = CatalogFile {
            id: state.next_file_id,
            study_id: file.study_id,
            name,
            path: file.path,
            file_type: file.file_type,
            uri: None,
            size: 0,
            checksum: None,
            status: file.status,
            job_id: file.job_id,
            index: None,
            creation_time: Utc::now(),
            attributes: HashMap::new(),
        };
        state.files.insert(created.id, created.clone());
        created
    }
}

#[async_trait]
impl CatalogManager for MockCatalog {
    fn user_id(&self) -> &str {
        "test"
    }

    async fn create_job(&self, job: NewJob) -> AnalysisResult<Job> {
        self.record("create_job");
        let mut state = self.state.lock().unwrap();
        if state.fail_create_job {
            return Err(AnalysisError::catalog_error("mock catalog unavailable"));
        }
        state.next_job_id += 1;
        let created = Job {
            id: state.next_job_id,
            name: job.name,
            user_id: "test".to_string(),
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
            output_file_ids: vec![],
            creation_time: Utc::now(),
            start_time: job.start_time,
            end_time: None,
            attributes: job.attributes,
            resource_manager_attributes: job.resource_manager_attributes,
        };
        state.jobs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn modify_job(&self, job_id: i64, update: JobUpdate) -> AnalysisResult<Job> {
        self.record("modify_job");
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AnalysisError::catalog_error(format!("job {job_id} not found")))?;
        update.apply(job);
        Ok(job.clone())
    }

    async fn get_job(&self, job_id: i64) -> AnalysisResult<Job> {
        self.record("get_job");
        self.job(job_id)
            .ok_or_else(|| AnalysisError::catalog_error(format!("job {job_id} not found")))
    }

    async fn create_file(&self, file: NewFile) -> AnalysisResult<CatalogFile> {
        self.record("create_file");
        let mut state = self.state.lock().unwrap();
        if state
            .files
            .values()
            .any(|f| f.study_id == file.study_id && f.path == file.path)
        {
            return Err(AnalysisError::catalog_error(format!(
                "file {} already exists",
                file.path
            )));
        }
        Ok(Self::insert_file(&mut state, file))
    }

    async fn modify_file(&self, file_id: i64, update: FileUpdate) -> AnalysisResult<CatalogFile> {
        self.record("modify_file");
        let mut state = self.state.lock().unwrap();
        let file = state
            .files
            .get_mut(&file_id)
            .ok_or_else(|| AnalysisError::catalog_error(format!("file {file_id} not found")))?;
        update.apply(file);
        Ok(file.clone())
    }

    async fn get_file(&self, file_id: i64) -> AnalysisResult<CatalogFile> {
        self.record("get_file");
        self.state
            .lock()
            .unwrap()
            .files
            .get(&file_id)
            .cloned()
            .ok_or_else(|| AnalysisError::catalog_error(format!("file {file_id} not found")))
    }

    async fn create_job_out_dir(&self, study_id: i64, name: &str) -> AnalysisResult<Url> {
        self.record("create_job_out_dir");
        let dir = self.root.join("jobs").join(study_id.to_string()).join(name);
        std::fs::create_dir_all(&dir)?;
        Url::from_directory_path(&dir)
            .map_err(|_| AnalysisError::catalog_error(format!("bad dir {}", dir.display())))
    }

    async fn get_file_uri(&self, file: &CatalogFile) -> AnalysisResult<Url> {
        self.record("get_file_uri");
        if let Some(ref uri) = file.uri {
            return Ok(uri.clone());
        }
        let path = self.data_dir().join(&file.path);
        let uri = match file.file_type {
            FileType::Directory => Url::from_directory_path(&path),
            FileType::File => Url::from_file_path(&path),
        };
        uri.map_err(|_| AnalysisError::catalog_error(format!("bad path {}", path.display())))
    }
}

/// Local-filesystem IO with injectable copy faults
#[derive(Debug, Clone, Default)]
pub struct MockIoManager {
    inner: PosixIoManager,
    corrupt: Arc<Mutex<HashSet<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    deleted: Arc<Mutex<Vec<Url>>>,
}

impl MockIoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of files with this name get different bytes at the destination
    pub fn corrupt_copies_of(&self, file_name: &str) {
        self.corrupt.lock().unwrap().insert(file_name.to_string());
    }

    /// Copies of files with this name fail with an IO error
    pub fn fail_copies_of(&self, file_name: &str) {
        self.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn deleted(&self) -> Vec<Url> {
        self.deleted.lock().unwrap().clone()
    }

    fn file_name(uri: &Url) -> String {
        uri.path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string()
    }
}

impl IoManager for MockIoManager {
    fn exists(&self, uri: &Url) -> AnalysisResult<bool> {
        self.inner.exists(uri)
    }

    fn list_files(&self, dir: &Url) -> AnalysisResult<Vec<Url>> {
        self.inner.list_files(dir)
    }

    fn calculate_checksum(&self, uri: &Url) -> AnalysisResult<String> {
        self.inner.calculate_checksum(uri)
    }

    fn size(&self, uri: &Url) -> AnalysisResult<u64> {
        self.inner.size(uri)
    }

    fn copy(&self, source: &Url, target: &Url) -> AnalysisResult<()> {
        let name = Self::file_name(source);
        if self.failing.lock().unwrap().contains(&name) {
            return Err(AnalysisError::Io(std::io::Error::other(format!(
                "injected copy failure for {name}"
            ))));
        }
        self.inner.copy(source, target)?;
        if self.corrupt.lock().unwrap().contains(&name) {
            let path = target
                .to_file_path()
                .map_err(|_| AnalysisError::UnsupportedUri(target.to_string()))?;
            std::fs::write(path, b"corrupted")?;
        }
        Ok(())
    }

    fn delete(&self, uri: &Url) -> AnalysisResult<()> {
        self.deleted.lock().unwrap().push(uri.clone());
        self.inner.delete(uri)
    }

    fn create_directory(&self, uri: &Url) -> AnalysisResult<()> {
        self.inner.create_directory(uri)
    }
}

/// What a `MockExecutorManager` does with a job
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Set the job to this status through the catalog, if one is attached
    Complete(JobStatus),
    Fail(String),
    /// Never returns
    Hang,
}

/// Executor manager that records runs and returns a scripted outcome
#[derive(Clone)]
pub struct MockExecutorManager {
    name: String,
    catalog: Option<Arc<dyn CatalogManager>>,
    outcome: MockOutcome,
    delay: Duration,
    runs: Arc<Mutex<Vec<i64>>>,
}

impl MockExecutorManager {
    pub fn new(name: &str, outcome: MockOutcome) -> Self {
        Self {
            name: name.to_string(),
            catalog: None,
            outcome,
            delay: Duration::ZERO,
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogManager>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn runs(&self) -> Vec<i64> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutorManager for MockExecutorManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, job: &Job) -> AnalysisResult<Job> {
        self.runs.lock().unwrap().push(job.id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            MockOutcome::Complete(status) => match &self.catalog {
                Some(catalog) => catalog.modify_job(job.id, JobUpdate::status(*status)).await,
                None => {
                    let mut job = job.clone();
                    job.update_status(*status);
                    Ok(job)
                }
            },
            MockOutcome::Fail(message) => Err(AnalysisError::execution_error(message.clone())),
            MockOutcome::Hang => std::future::pending().await,
        }
    }
}

/// Tool executor that records the contexts it is run with
#[derive(Debug, Clone, Default)]
pub struct RecordingToolExecutor {
    id: String,
    fail: bool,
    contexts: Arc<Mutex<Vec<ExecutorContext>>>,
}

impl RecordingToolExecutor {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fail: true,
            ..Default::default()
        }
    }

    pub fn contexts(&self) -> Vec<ExecutorContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingToolExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, context: &ExecutorContext) -> AnalysisResult<()> {
        self.contexts.lock().unwrap().push(context.clone());
        if self.fail {
            return Err(AnalysisError::execution_error(format!(
                "{} failed on purpose",
                self.id
            )));
        }
        Ok(())
    }
}
