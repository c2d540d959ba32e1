use url::Url;

use crate::AnalysisResult;

/// 存储IO接口
///
/// 所有操作都是同步阻塞的。实现只需支持 `file` 协议，其余协议返回
/// `AnalysisError::UnsupportedUri`。
pub trait IoManager: Send + Sync {
    fn exists(&self, uri: &Url) -> AnalysisResult<bool>;

    /// 递归列出目录下的普通文件
    fn list_files(&self, dir: &Url) -> AnalysisResult<Vec<Url>>;

    fn calculate_checksum(&self, uri: &Url) -> AnalysisResult<String>;

    fn size(&self, uri: &Url) -> AnalysisResult<u64>;

    /// 复制文件内容，目标父目录不存在时创建
    fn copy(&self, source: &Url, target: &Url) -> AnalysisResult<()>;

    fn delete(&self, uri: &Url) -> AnalysisResult<()>;

    fn create_directory(&self, uri: &Url) -> AnalysisResult<()>;
}
