use anyhow::{Context, Result};
use analysis_core::{init_logging, AppConfig, LogLevel, OutputFormat};
use tracing::debug;

/// 命令行上的全局启动参数
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<OutputFormat>,
}

/// 加载应用配置，命令行上的日志参数覆盖配置文件
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            startup_config.config_path.as_deref().unwrap_or("<默认路径>")
        )
    })?;

    if let Some(level) = startup_config.log_level {
        config.logging.level = level;
    }
    if let Some(format) = startup_config.log_format {
        config.logging.format = format;
    }
    Ok(config)
}

/// 加载配置并初始化日志
pub fn bootstrap(startup_config: &StartupConfig) -> Result<AppConfig> {
    let config = load_config(startup_config)?;
    init_logging(&config.logging)?;
    debug!("配置加载完成: {:?}", config);
    Ok(config)
}
