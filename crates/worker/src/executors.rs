use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use analysis_core::config::SgeConfig;
use analysis_core::models::{Job, JobStatus, JobUpdate};
use analysis_core::traits::{CatalogManager, ExecutorManager};
use analysis_errors::{AnalysisError, AnalysisResult};
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::output_recorder::OutputRecorder;

/// 作业失败时记录退出码的属性键
pub const EXIT_CODE_ATTRIBUTE: &str = "exitCode";
/// 输出登记失败时记录原因的属性键
pub const RECORD_ERROR_ATTRIBUTE: &str = "recordOutputError";
/// 进程无法启动或等待失败时记录原因的属性键
pub const EXECUTION_ERROR_ATTRIBUTE: &str = "executionError";

/// 作业临时目录，去掉目录 URI 的结尾分隔符
fn job_dir(job: &Job) -> AnalysisResult<PathBuf> {
    let path = job
        .tmp_out_dir_uri
        .to_file_path()
        .map_err(|_| AnalysisError::UnsupportedUri(job.tmp_out_dir_uri.to_string()))?;
    Ok(path.components().collect())
}

/// 日志文件与调度作业名的基础名
fn log_base_name(job: &Job) -> &str {
    job.scheduler_name().unwrap_or(&job.name)
}

/// `kill` 的目标：作业进程所在的整个进程组
fn process_group_target(pid: u32) -> [String; 3] {
    ["-KILL".to_string(), "--".to_string(), format!("-{pid}")]
}

/// 运行中进程的登记项
///
/// 未正常结束就被丢弃时终止整个进程组并移除登记。
struct TrackedProcess {
    processes: Arc<RwLock<HashMap<i64, u32>>>,
    job_id: i64,
    pid: u32,
    active: bool,
}

impl TrackedProcess {
    async fn track(processes: &Arc<RwLock<HashMap<i64, u32>>>, job_id: i64, pid: u32) -> Self {
        processes.write().await.insert(job_id, pid);
        Self {
            processes: Arc::clone(processes),
            job_id,
            pid,
            active: true,
        }
    }

    /// 结束登记，返回进程结束时是否仍被登记（未被取消）
    async fn finish(mut self) -> bool {
        self.active = false;
        self.processes.write().await.remove(&self.job_id).is_some()
    }
}

impl Drop for TrackedProcess {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        warn!("作业执行被中断，终止进程组: job_id={}, pid={}", self.job_id, self.pid);
        if let Err(e) = std::process::Command::new("kill")
            .args(process_group_target(self.pid))
            .status()
        {
            error!("终止进程组失败: job_id={}, pid={}, error={}", self.job_id, self.pid, e);
        }
        if let Ok(mut processes) = self.processes.try_write() {
            processes.remove(&self.job_id);
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let processes = Arc::clone(&self.processes);
            let job_id = self.job_id;
            runtime.spawn(async move {
                processes.write().await.remove(&job_id);
            });
        }
    }
}

/// 本地子进程执行管理器
///
/// 在作业临时目录中以 `sh -c` 运行命令行，stdout/stderr 写入
/// `<name>.out.log` / `<name>.err.log`。成功后交给输出登记器。
/// 执行任务被丢弃（例如交接超时）时子进程随之被终止。
pub struct LocalExecutorManager {
    catalog: Arc<dyn CatalogManager>,
    recorder: Option<Arc<OutputRecorder>>,
    /// 正在运行的作业进程ID
    running_processes: Arc<RwLock<HashMap<i64, u32>>>,
}

impl LocalExecutorManager {
    pub fn new(catalog: Arc<dyn CatalogManager>) -> Self {
        Self {
            catalog,
            recorder: None,
            running_processes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<OutputRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub async fn is_running(&self, job_id: i64) -> bool {
        self.running_processes.read().await.contains_key(&job_id)
    }

    /// 终止正在运行的作业，作业随后被标记为 ABORTED
    pub async fn cancel(&self, job_id: i64) -> AnalysisResult<()> {
        let pid = self.running_processes.write().await.remove(&job_id);
        let Some(pid) = pid else {
            warn!("未找到要取消的作业: job_id={}", job_id);
            return Ok(());
        };

        let output = Command::new("kill")
            .args(process_group_target(pid))
            .output()
            .await
            .map_err(|e| AnalysisError::execution_error(format!("执行kill命令失败: {e}")))?;
        if output.status.success() {
            info!("成功取消作业: job_id={}, pid={}", job_id, pid);
            Ok(())
        } else {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            error!("取消作业失败: job_id={}, pid={}, error={}", job_id, pid, error_msg);
            Err(AnalysisError::execution_error(format!("取消作业失败: {error_msg}")))
        }
    }

    /// 启动进程并等待结束，返回退出状态与进程结束时是否仍被登记
    async fn spawn_and_wait(&self, job: &Job, dir: &Path) -> AnalysisResult<(ExitStatus, bool)> {
        let base = log_base_name(job);
        let stdout = std::fs::File::create(dir.join(format!("{base}.out.log")))?;
        let stderr = std::fs::File::create(dir.join(format!("{base}.err.log")))?;

        info!("执行作业: job_id={}, command={}", job.id, job.command_line);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&job.command_line)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        // 独立进程组，取消时连同工具脚本派生的子进程一起终止
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| AnalysisError::execution_failed("启动作业进程失败", e))?;

        let tracked = match child.id() {
            Some(pid) => Some(TrackedProcess::track(&self.running_processes, job.id, pid).await),
            None => None,
        };

        let exit_status = child
            .wait()
            .await
            .map_err(|e| AnalysisError::execution_failed("等待作业进程结束失败", e))?;

        let still_tracked = match tracked {
            Some(tracked) => tracked.finish().await,
            None => true,
        };
        Ok((exit_status, still_tracked))
    }

    async fn finish_success(&self, job_id: i64) -> AnalysisResult<()> {
        let Some(ref recorder) = self.recorder else {
            let update = JobUpdate {
                end_time: Some(Utc::now()),
                ..JobUpdate::status(JobStatus::Done)
            };
            self.catalog.modify_job(job_id, update).await?;
            return Ok(());
        };

        let job = self.catalog.get_job(job_id).await?;
        match recorder.record_output(&job).await {
            Ok(report) => {
                if !report.is_complete() {
                    warn!(
                        "作业 {} 有 {} 个输出文件登记失败",
                        job_id,
                        report.failures.len()
                    );
                }
                Ok(())
            }
            Err(e) => {
                let update = JobUpdate {
                    end_time: Some(Utc::now()),
                    ..JobUpdate::status(JobStatus::Error)
                }
                .with_attribute(RECORD_ERROR_ATTRIBUTE, serde_json::json!(e.to_string()));
                self.catalog.modify_job(job_id, update).await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ExecutorManager for LocalExecutorManager {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self, job), fields(job_id = job.id, job_name = %job.name))]
    async fn run(&self, job: &Job) -> AnalysisResult<Job> {
        let dir = job_dir(job)?;
        tokio::fs::create_dir_all(&dir).await?;

        let update = JobUpdate {
            start_time: Some(job.start_time.unwrap_or_else(Utc::now)),
            ..JobUpdate::status(JobStatus::Running)
        };
        self.catalog.modify_job(job.id, update).await?;

        let (exit_status, still_tracked) = match self.spawn_and_wait(job, &dir).await {
            Ok(finished) => finished,
            Err(e) => {
                error!("作业进程执行失败: job_id={}, error={}", job.id, e);
                let update = JobUpdate {
                    end_time: Some(Utc::now()),
                    ..JobUpdate::status(JobStatus::Error)
                }
                .with_attribute(EXECUTION_ERROR_ATTRIBUTE, serde_json::json!(e.to_string()));
                if let Err(modify_err) = self.catalog.modify_job(job.id, update).await {
                    warn!("更新作业 {} 状态失败: {}", job.id, modify_err);
                }
                return Err(e);
            }
        };

        let exit_code = exit_status.code();
        info!(
            "作业进程结束: job_id={}, success={}, exit_code={:?}",
            job.id,
            exit_status.success(),
            exit_code
        );

        if exit_status.success() {
            self.finish_success(job.id).await?;
        } else {
            let status = if still_tracked {
                JobStatus::Error
            } else {
                JobStatus::Aborted
            };
            let update = JobUpdate {
                end_time: Some(Utc::now()),
                ..JobUpdate::status(status)
            }
            .with_attribute(EXIT_CODE_ATTRIBUTE, serde_json::json!(exit_code));
            self.catalog.modify_job(job.id, update).await?;
        }

        self.catalog.get_job(job.id).await
    }
}

/// 网格调度（SGE）执行管理器
///
/// 在作业临时目录写入作业脚本并通过 qsub 提交，提交成功即返回；
/// 作业状态由调度器之后的回调推进。
pub struct SgeExecutorManager {
    config: SgeConfig,
}

impl SgeExecutorManager {
    pub fn new(config: SgeConfig) -> Self {
        Self { config }
    }

    pub fn script_path(job: &Job) -> AnalysisResult<PathBuf> {
        Ok(job_dir(job)?.join(format!("{}.sh", log_base_name(job))))
    }

    /// qsub 参数：
    ///
    /// ```text
    /// -V -N <name> -wd <tmp> -o <tmp>/<name>.out.log -e <tmp>/<name>.err.log
    ///    [-q <queue>] [extra args...] <tmp>/<name>.sh
    /// ```
    pub fn build_qsub_args(job: &Job, config: &SgeConfig) -> AnalysisResult<Vec<String>> {
        let dir = job_dir(job)?;
        let base = log_base_name(job);
        let display = |p: &Path| p.to_string_lossy().to_string();

        let mut args = vec![
            "-V".to_string(),
            "-N".to_string(),
            base.to_string(),
            "-wd".to_string(),
            display(&dir),
            "-o".to_string(),
            display(&dir.join(format!("{base}.out.log"))),
            "-e".to_string(),
            display(&dir.join(format!("{base}.err.log"))),
        ];
        if let Some(ref queue) = config.queue {
            args.push("-q".to_string());
            args.push(queue.clone());
        }
        args.extend(config.extra_args.iter().cloned());
        args.push(display(&Self::script_path(job)?));
        Ok(args)
    }
}

#[async_trait]
impl ExecutorManager for SgeExecutorManager {
    fn name(&self) -> &str {
        "sge"
    }

    #[instrument(skip(self, job), fields(job_id = job.id))]
    async fn run(&self, job: &Job) -> AnalysisResult<Job> {
        let dir = job_dir(job)?;
        tokio::fs::create_dir_all(&dir).await?;
        let script = format!("#!/bin/sh\ncd '{}'\n{}\n", dir.display(), job.command_line);
        tokio::fs::write(Self::script_path(job)?, script).await?;

        let args = Self::build_qsub_args(job, &self.config)?;
        info!("提交SGE作业: {} {}", self.config.qsub_command, args.join(" "));

        let output = Command::new(&self.config.qsub_command)
            .args(&args)
            .output()
            .await
            .map_err(|e| AnalysisError::execution_failed("执行qsub失败", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("qsub提交失败: job_id={}, error={}", job.id, stderr.trim());
            return Err(AnalysisError::execution_error(format!(
                "qsub提交失败，退出码 {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        info!(
            "SGE作业已提交: job_id={}, {}",
            job.id,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use analysis_core::traits::IoManager;
    use analysis_testing_utils::{dir_uri, JobBuilder, MockCatalog, MockIoManager, TestEnv};

    fn job_in(catalog: &MockCatalog, root: &Path, command: &str) -> Job {
        let tmp = root.join("jobs").join("J_local");
        catalog.add_job(
            JobBuilder::new()
                .with_id(7)
                .with_name("stats")
                .with_tmp_dir(dir_uri(&tmp))
                .with_command_line(command)
                .with_scheduler_name("J_local")
                .build(),
        )
    }

    #[tokio::test]
    async fn test_local_success_without_recorder() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let job = job_in(&catalog, temp.path(), "echo hello");
        let manager = LocalExecutorManager::new(Arc::new(catalog.clone()));

        let finished = manager.run(&job).await.unwrap();

        assert_eq!(finished.status, JobStatus::Done);
        assert!(finished.start_time.is_some());
        assert!(finished.end_time.is_some());
        let log = temp.path().join("jobs/J_local/J_local.out.log");
        assert_eq!(std::fs::read_to_string(log).unwrap().trim(), "hello");
        assert!(!manager.is_running(job.id).await);
    }

    #[tokio::test]
    async fn test_local_failure_records_exit_code() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let job = job_in(&catalog, temp.path(), "echo boom >&2; exit 3");
        let manager = LocalExecutorManager::new(Arc::new(catalog.clone()));

        let finished = manager.run(&job).await.unwrap();

        assert_eq!(finished.status, JobStatus::Error);
        assert_eq!(
            finished.attributes.get(EXIT_CODE_ATTRIBUTE).and_then(|v| v.as_i64()),
            Some(3)
        );
        let log = temp.path().join("jobs/J_local/J_local.err.log");
        assert!(std::fs::read_to_string(log).unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_local_success_records_outputs() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let out_dir = catalog.add_folder(1, "results/");
        let mut job = job_in(&catalog, temp.path(), "echo 42 > stats.txt");
        job.out_dir_id = out_dir.id;
        let job = catalog.add_job(job);

        let io: Arc<dyn IoManager> = Arc::new(MockIoManager::new());
        let recorder = Arc::new(OutputRecorder::new(Arc::new(catalog.clone()), io));
        let manager = LocalExecutorManager::new(Arc::new(catalog.clone())).with_recorder(recorder);

        let finished = manager.run(&job).await.unwrap();

        assert_eq!(finished.status, JobStatus::Done);
        assert!(!finished.output_file_ids.is_empty());
        let moved = catalog.data_dir().join("results/stats.txt");
        assert_eq!(std::fs::read_to_string(moved).unwrap().trim(), "42");
    }

    #[tokio::test]
    async fn test_cancel_marks_job_aborted() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let job = job_in(&catalog, temp.path(), "sleep 30");
        let manager = Arc::new(LocalExecutorManager::new(Arc::new(catalog.clone())));

        let runner = {
            let manager = manager.clone();
            let job = job.clone();
            tokio::spawn(async move { manager.run(&job).await })
        };

        let started = TestEnv::wait_for(
            || {
                let manager = manager.clone();
                async move { manager.is_running(7).await }
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(started);

        manager.cancel(7).await.unwrap();
        let finished = runner.await.unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Aborted);
    }

    #[tokio::test]
    async fn test_dropped_run_kills_process() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let marker = temp.path().join("jobs/J_local/marker");
        let job = job_in(&catalog, temp.path(), "sleep 1; touch marker");
        let manager = Arc::new(LocalExecutorManager::new(Arc::new(catalog.clone())));

        let runner = {
            let manager = manager.clone();
            let job = job.clone();
            tokio::spawn(async move { manager.run(&job).await })
        };
        let started = TestEnv::wait_for(
            || {
                let manager = manager.clone();
                async move { manager.is_running(7).await }
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(started);

        runner.abort();
        assert!(runner.await.unwrap_err().is_cancelled());

        let untracked = TestEnv::wait_for(
            || {
                let manager = manager.clone();
                async move { !manager.is_running(7).await }
            },
            Duration::from_secs(2),
        )
        .await;
        assert!(untracked);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_setup_failure_marks_job_error() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::new(temp.path());
        let job = job_in(&catalog, temp.path(), "echo never");
        // 日志文件路径被目录占用，无法创建
        std::fs::create_dir_all(temp.path().join("jobs/J_local/J_local.out.log")).unwrap();
        let manager = LocalExecutorManager::new(Arc::new(catalog.clone()));

        assert!(manager.run(&job).await.is_err());

        let stored = catalog.job(7).unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert!(stored.end_time.is_some());
        assert!(stored.attributes.contains_key(EXECUTION_ERROR_ATTRIBUTE));
        assert!(!manager.is_running(7).await);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let manager = LocalExecutorManager::new(Arc::new(MockCatalog::new(temp.path())));
        assert!(manager.cancel(99).await.is_ok());
    }

    #[test]
    fn test_qsub_args_layout() {
        let job = JobBuilder::new()
            .with_tmp_dir(url::Url::parse("file:///scratch/jobs/J_abc/").unwrap())
            .with_scheduler_name("J_abc")
            .build();
        let config = SgeConfig {
            queue: Some("long.q".to_string()),
            extra_args: vec!["-l".to_string(), "h_vmem=4G".to_string()],
            ..SgeConfig::default()
        };

        let args = SgeExecutorManager::build_qsub_args(&job, &config).unwrap();
        assert_eq!(
            args,
            vec![
                "-V",
                "-N",
                "J_abc",
                "-wd",
                "/scratch/jobs/J_abc",
                "-o",
                "/scratch/jobs/J_abc/J_abc.out.log",
                "-e",
                "/scratch/jobs/J_abc/J_abc.err.log",
                "-q",
                "long.q",
                "-l",
                "h_vmem=4G",
                "/scratch/jobs/J_abc/J_abc.sh",
            ]
        );
    }

    #[tokio::test]
    async fn test_sge_submission_writes_script() {
        let temp = tempfile::tempdir().unwrap();
        let tmp = temp.path().join("J_sge");
        let job = JobBuilder::new()
            .with_tmp_dir(dir_uri(&tmp))
            .with_scheduler_name("J_sge")
            .with_command_line("/opt/tool/run.sh --in a.vcf")
            .build();
        let manager = SgeExecutorManager::new(SgeConfig {
            qsub_command: "true".to_string(),
            ..SgeConfig::default()
        });

        let submitted = manager.run(&job).await.unwrap();
        assert_eq!(submitted.id, job.id);
        let script = std::fs::read_to_string(tmp.join("J_sge.sh")).unwrap();
        assert!(script.ends_with("/opt/tool/run.sh --in a.vcf\n"));
    }

    #[tokio::test]
    async fn test_sge_rejected_submission_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let job = JobBuilder::new()
            .with_tmp_dir(dir_uri(&temp.path().join("J_sge")))
            .build();
        let manager = SgeExecutorManager::new(SgeConfig {
            qsub_command: "false".to_string(),
            ..SgeConfig::default()
        });

        let err = manager.run(&job).await.unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisExecution { .. }));
    }
}
