//! 作业执行侧组件
//!
//! - `ToolExecutorRegistry` - 执行器注册与按部署能力解析
//! - `ToolRunner` - 在 scratch 目录中运行解析出的执行器
//! - `LocalExecutorManager` / `SgeExecutorManager` - 作业执行管理器
//! - `OutputRecorder` - 作业结束后把临时输出登记到目录

pub mod executor_registry;
pub mod executors;
pub mod output_recorder;
pub mod tool_runner;

pub use executor_registry::{ExecutorFactory, ExecutorRegistration, ToolExecutorRegistry};
pub use executors::{LocalExecutorManager, SgeExecutorManager};
pub use output_recorder::{FileFailure, OutputRecorder, OutputReport, RecordStage};
pub use tool_runner::{ExecutionResult, ExecutionStatus, ToolRunRequest, ToolRunner};
