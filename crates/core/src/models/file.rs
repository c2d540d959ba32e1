use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub const CHECKSUM_ATTRIBUTE: &str = "checksum";
pub const SIZE_ATTRIBUTE: &str = "size";

/// 目录中登记的文件或目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: i64,
    pub study_id: i64,
    pub name: String,
    /// 目录内的相对路径，目录以 `/` 结尾
    pub path: String,
    pub file_type: FileType,
    pub uri: Option<Url>,
    pub size: u64,
    pub checksum: Option<String>,
    pub status: FileStatus,
    pub job_id: Option<i64>,
    pub index: Option<FileIndex>,
    pub creation_time: DateTime<Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl CatalogFile {
    pub fn is_directory(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, FileStatus::Ready)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileType {
    #[serde(rename = "FILE")]
    File,
    #[serde(rename = "DIRECTORY")]
    Directory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileStatus {
    #[serde(rename = "UPLOADING")]
    Uploading,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "REMOVED")]
    Removed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexStatus {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "TRANSFORMED")]
    Transformed,
    #[serde(rename = "INDEXING")]
    Indexing,
    #[serde(rename = "READY")]
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIndex {
    pub status: IndexStatus,
    pub job_id: Option<i64>,
}

/// 目录服务创建文件的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFile {
    pub study_id: i64,
    pub path: String,
    pub file_type: FileType,
    pub status: FileStatus,
    pub job_id: Option<i64>,
    pub description: String,
}

impl NewFile {
    pub fn uploading(study_id: i64, path: String, job_id: i64) -> Self {
        Self {
            study_id,
            path,
            file_type: FileType::File,
            status: FileStatus::Uploading,
            job_id: Some(job_id),
            description: String::new(),
        }
    }

    pub fn folder(study_id: i64, path: String) -> Self {
        let path = if path.ends_with('/') { path } else { format!("{path}/") };
        Self {
            study_id,
            path,
            file_type: FileType::Directory,
            status: FileStatus::Ready,
            job_id: None,
            description: String::new(),
        }
    }
}

/// 文件的点更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub status: Option<FileStatus>,
    pub uri: Option<Url>,
    pub checksum: Option<String>,
    pub size: Option<u64>,
    pub index_status: Option<IndexStatus>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl FileUpdate {
    pub fn status(status: FileStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// 登记校验和与大小，同时写入 attributes
    pub fn checksum_and_size(checksum: &str, size: u64) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(CHECKSUM_ATTRIBUTE.to_string(), serde_json::json!(checksum));
        attributes.insert(SIZE_ATTRIBUTE.to_string(), serde_json::json!(size));
        Self {
            checksum: Some(checksum.to_string()),
            size: Some(size),
            attributes,
            ..Default::default()
        }
    }

    pub fn apply(&self, file: &mut CatalogFile) {
        if let Some(status) = self.status {
            file.status = status;
        }
        if let Some(ref uri) = self.uri {
            file.uri = Some(uri.clone());
        }
        if let Some(ref checksum) = self.checksum {
            file.checksum = Some(checksum.clone());
        }
        if let Some(size) = self.size {
            file.size = size;
        }
        if let Some(index_status) = self.index_status {
            match file.index {
                Some(ref mut index) => index.status = index_status,
                None => {
                    file.index = Some(FileIndex {
                        status: index_status,
                        job_id: None,
                    })
                }
            }
        }
        for (key, value) in &self.attributes {
            file.attributes.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_path_gets_trailing_slash() {
        let folder = NewFile::folder(1, "data/results".to_string());
        assert_eq!(folder.path, "data/results/");
        assert_eq!(folder.file_type, FileType::Directory);
    }

    #[test]
    fn test_checksum_update_sets_attributes() {
        let mut file = CatalogFile {
            id: 1,
            study_id: 1,
            name: "a.txt".to_string(),
            path: "out/a.txt".to_string(),
            file_type: FileType::File,
            uri: None,
            size: 0,
            checksum: None,
            status: FileStatus::Uploading,
            job_id: Some(3),
            index: None,
            creation_time: Utc::now(),
            attributes: HashMap::new(),
        };

        FileUpdate::checksum_and_size("d41d8cd9", 12).apply(&mut file);
        FileUpdate {
            index_status: Some(IndexStatus::Ready),
            ..FileUpdate::status(FileStatus::Ready)
        }
        .apply(&mut file);

        assert_eq!(file.checksum.as_deref(), Some("d41d8cd9"));
        assert_eq!(file.size, 12);
        assert_eq!(file.attributes[CHECKSUM_ATTRIBUTE], serde_json::json!("d41d8cd9"));
        assert!(file.is_ready());
        assert_eq!(file.index.unwrap().status, IndexStatus::Ready);
    }
}
