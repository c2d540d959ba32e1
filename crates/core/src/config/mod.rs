//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML 配置文件 → `ANALYSIS_` 前缀的环境变量。
//! 加载完成后统一校验。
//!
//! ```text
//! [analysis]
//! binaries_path = "/opt/analysis"
//! job_executor = "SGE"
//! dispatch_timeout_seconds = 600
//!
//! [analysis.sge]
//! queue = "long.q"
//!
//! [catalog]
//! root_dir = "/data/catalog"
//! jobs_dir = "/data/jobs"
//!
//! [storage]
//! default_engine = "hadoop"
//! ```

pub mod models;

pub use models::*;
