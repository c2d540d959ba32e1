pub mod analysis;
pub mod app_config;
pub mod catalog;

pub use analysis::{AnalysisConfig, JobExecutorMode, SgeConfig};
pub use app_config::AppConfig;
pub use catalog::{CatalogConfig, StorageConfig};
