use std::fs;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use analysis_core::traits::IoManager;
use analysis_errors::{AnalysisError, AnalysisResult};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

const BUFFER_SIZE: usize = 64 * 1024;

/// 本地文件系统IO，仅支持 `file` 协议
#[derive(Debug, Clone, Default)]
pub struct PosixIoManager;

impl PosixIoManager {
    pub fn new() -> Self {
        Self
    }

    fn to_path(uri: &Url) -> AnalysisResult<PathBuf> {
        if uri.scheme() != "file" {
            return Err(AnalysisError::UnsupportedUri(uri.to_string()));
        }
        uri.to_file_path()
            .map_err(|_| AnalysisError::UnsupportedUri(uri.to_string()))
    }
}

impl IoManager for PosixIoManager {
    fn exists(&self, uri: &Url) -> AnalysisResult<bool> {
        Ok(Self::to_path(uri)?.exists())
    }

    fn list_files(&self, dir: &Url) -> AnalysisResult<Vec<Url>> {
        let root = Self::to_path(dir)?;
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| AnalysisError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let uri = Url::from_file_path(entry.path())
                .map_err(|_| AnalysisError::UnsupportedUri(entry.path().display().to_string()))?;
            files.push(uri);
        }
        debug!("{} 下共 {} 个文件", root.display(), files.len());
        Ok(files)
    }

    fn calculate_checksum(&self, uri: &Url) -> AnalysisResult<String> {
        let file = fs::File::open(Self::to_path(uri)?)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn size(&self, uri: &Url) -> AnalysisResult<u64> {
        Ok(fs::metadata(Self::to_path(uri)?)?.len())
    }

    fn copy(&self, source: &Url, target: &Url) -> AnalysisResult<()> {
        let from = Self::to_path(source)?;
        let to = Self::to_path(target)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&from, &to)?;
        Ok(())
    }

    fn delete(&self, uri: &Url) -> AnalysisResult<()> {
        let path = Self::to_path(uri)?;
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn create_directory(&self, uri: &Url) -> AnalysisResult<()> {
        fs::create_dir_all(Self::to_path(uri)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(path: &std::path::Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[test]
    fn test_list_files_recurses_and_skips_dirs() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("nested/deeper")).unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("nested/deeper/b.txt"), "b").unwrap();

        let io = PosixIoManager::new();
        let files = io.list_files(&Url::from_directory_path(temp.path()).unwrap()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|u| u.path().ends_with("nested/deeper/b.txt")));
    }

    #[test]
    fn test_checksum_is_stable_across_copy() {
        let temp = tempfile::tempdir().unwrap();
        let origin = temp.path().join("in/data.vcf");
        fs::create_dir_all(origin.parent().unwrap()).unwrap();
        fs::write(&origin, "##fileformat=VCFv4.2\n").unwrap();
        let target = temp.path().join("out/sub/data.vcf");

        let io = PosixIoManager::new();
        io.copy(&uri(&origin), &uri(&target)).unwrap();
        let a = io.calculate_checksum(&uri(&origin)).unwrap();
        let b = io.calculate_checksum(&uri(&target)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(io.size(&uri(&target)).unwrap(), 21);

        io.delete(&uri(&origin)).unwrap();
        assert!(!io.exists(&uri(&origin)).unwrap());
    }

    #[test]
    fn test_known_sha256() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("empty");
        fs::write(&path, "").unwrap();
        assert_eq!(
            PosixIoManager::new().calculate_checksum(&uri(&path)).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_rejects_remote_scheme() {
        let io = PosixIoManager::new();
        let err = io
            .list_files(&Url::parse("hdfs://namenode/tmp/out/").unwrap())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedUri(_)));
    }
}
