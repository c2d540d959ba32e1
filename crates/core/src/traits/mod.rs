//! 协作方接口定义
//!
//! - `CatalogManager` - 目录服务：作业与文件的持久化
//! - `IoManager` - 存储IO：遍历、校验和、复制、删除
//! - `ExecutorManager` - 作业执行：本地子进程或网格调度
//! - `ToolExecutor` - 工具的具体执行器实现
//!
//! 本库自身从不做持久化，全部通过这些接口完成。

pub mod catalog;
pub mod executor;
pub mod io;

pub use catalog::CatalogManager;
pub use executor::{ExecutorContext, ExecutorManager, ToolExecutor};
pub use io::IoManager;
