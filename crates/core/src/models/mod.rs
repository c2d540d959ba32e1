//! # 数据模型
//!
//! 分析作业生命周期的核心数据结构：工具清单与参数、作业记录、目录文件、执行器描述。
//!
//! ## 核心模型
//!
//! ### ToolManifest / ToolOption - 工具清单
//! 描述一个分析工具的可执行文件、合法参数和输出目录参数。
//!
//! ### ParameterSet - 参数集合
//! 参数名到有序取值列表的映射，合成命令行前会剔除未知参数。
//!
//! ### Job - 作业记录
//! 一次分析调用的持久化记录，包含命令行、状态、输入输出文件引用。
//!
//! ### CatalogFile - 目录文件
//! 输出登记时为每个产出文件创建的目录实体，经过 UPLOADING → READY 的生命周期。
//!
//! ### ToolExecutorDescriptor - 执行器描述
//! 具体执行器实现的静态标签，仅用于排序选择。
//!
//! ## 状态流转
//!
//! ```text
//! Job:  PREPARED → QUEUED → RUNNING → DONE
//!                              ↓
//!                        ERROR / ABORTED
//!
//! File: UPLOADING → READY
//!           ↓
//!     ERROR / REMOVED
//! ```

pub mod executor;
pub mod file;
pub mod job;
pub mod params;
pub mod tool;

pub use executor::*;
pub use file::*;
pub use job::*;
pub use params::*;
pub use tool::*;
