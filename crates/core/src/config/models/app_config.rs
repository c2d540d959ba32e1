use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    analysis::AnalysisConfig,
    catalog::{CatalogConfig, StorageConfig},
};
use crate::logging::LogConfig;

/// 平台配置
///
/// 通过构造参数注入到每个需要它的组件，不存在全局静态配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: ANALYSIS_, nested keys joined by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default(
                "analysis.binaries_path",
                defaults.analysis.binaries_path.to_string_lossy().to_string(),
            )?
            .set_default("analysis.job_executor", "LOCAL")?
            .set_default(
                "analysis.dispatch_timeout_seconds",
                defaults.analysis.dispatch_timeout_seconds,
            )?
            .set_default("analysis.sge.qsub_command", defaults.analysis.sge.qsub_command)?
            .set_default("analysis.sge.extra_args", Vec::<String>::new())?
            .set_default(
                "catalog.root_dir",
                defaults.catalog.root_dir.to_string_lossy().to_string(),
            )?
            .set_default(
                "catalog.jobs_dir",
                defaults.catalog.jobs_dir.to_string_lossy().to_string(),
            )?
            .set_default("catalog.snapshot_path", "catalog/catalog.json")?
            .set_default("catalog.user_id", defaults.catalog.user_id)?
            .set_default("storage.default_engine", "local")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/analysis.toml", "analysis.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ANALYSIS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate().context("分析配置验证失败")?;
        self.catalog.validate().context("目录配置验证失败")?;
        Ok(())
    }
}
