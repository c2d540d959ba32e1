use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::StorageEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// 目录文件的物理根目录
    pub root_dir: PathBuf,
    /// 作业临时输出目录的根
    pub jobs_dir: PathBuf,
    /// 目录状态快照，CLI 多次调用之间共享
    pub snapshot_path: Option<PathBuf>,
    pub user_id: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("catalog/data"),
            jobs_dir: PathBuf::from("catalog/jobs"),
            snapshot_path: Some(PathBuf::from("catalog/catalog.json")),
            user_id: "admin".to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("目录根路径不能为空"));
        }
        if self.jobs_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("作业目录不能为空"));
        }
        if self.user_id.is_empty() {
            return Err(anyhow::anyhow!("用户ID不能为空"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub default_engine: StorageEngine,
}
