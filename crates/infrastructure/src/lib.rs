//! 协作方接口的本地实现
//!
//! - `InMemoryCatalog` - 内存目录服务，可选 JSON 快照持久化
//! - `PosixIoManager` - 本地文件系统IO

pub mod in_memory_catalog;
pub mod posix_io;

pub use in_memory_catalog::InMemoryCatalog;
pub use posix_io::PosixIoManager;
