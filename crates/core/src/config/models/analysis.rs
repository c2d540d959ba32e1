use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 作业执行方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobExecutorMode {
    #[default]
    Local,
    Sge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SgeConfig {
    pub qsub_command: String,
    pub queue: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for SgeConfig {
    fn default() -> Self {
        Self {
            qsub_command: "qsub".to_string(),
            queue: None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 工具清单与可执行文件的根目录，`<binaries_path>/<tool>/manifest.json`
    pub binaries_path: PathBuf,
    pub job_executor: JobExecutorMode,
    /// 执行交接的超时时间，0 表示不限制
    pub dispatch_timeout_seconds: u64,
    /// 工具运行时的 scratch 目录根，不可写时回退到输出目录
    pub scratch_dir: Option<PathBuf>,
    pub sge: SgeConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            binaries_path: PathBuf::from("analysis"),
            job_executor: JobExecutorMode::Local,
            dispatch_timeout_seconds: 3600,
            scratch_dir: None,
            sge: SgeConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.binaries_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("工具目录不能为空"));
        }
        if self.job_executor == JobExecutorMode::Sge && self.sge.qsub_command.trim().is_empty() {
            return Err(anyhow::anyhow!("SGE模式下qsub命令不能为空"));
        }
        Ok(())
    }
}
