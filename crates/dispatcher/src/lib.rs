//! 作业创建与执行交接
//!
//! - `manifest` - 工具清单加载与帮助信息
//! - `command_line` - 命令行合成与解析
//! - `job_factory` - 作业记录工厂（模拟 / 准备 / 立即执行）
//! - `dispatch` - 持久化之后的异步执行交接

pub mod command_line;
pub mod dispatch;
pub mod job_factory;
pub mod manifest;

pub use command_line::{parse_command_line, synthesize};
pub use dispatch::{DispatchHandle, JobDispatcher};
pub use job_factory::{JobFactory, JobRequest, DISPATCH_ERROR_ATTRIBUTE};
pub use manifest::{ToolDescriptor, ToolManifestStore};
