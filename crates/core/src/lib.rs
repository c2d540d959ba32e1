//! 基因组分析平台的核心模型、配置与服务边界
//!
//! 作业生命周期：
//!
//! ```text
//! 命令行合成 → 作业记录创建 → 执行交接 → 输出登记
//! ```

pub mod config;
pub mod logging;
pub mod models;
pub mod traits;
pub mod utils;

pub use analysis_errors::{AnalysisError, AnalysisResult};
pub use config::{AnalysisConfig, AppConfig, CatalogConfig, JobExecutorMode, SgeConfig, StorageConfig};
pub use logging::{init_logging, LogConfig, LogLevel, OutputFormat};
pub use models::*;
pub use traits::*;
