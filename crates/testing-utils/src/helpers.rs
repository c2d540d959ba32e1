//! Filesystem fixtures and polling helpers

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::sleep;
use url::Url;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// Write `contents` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture parent");
    }
    std::fs::write(&path, contents).expect("write fixture file");
    path
}

pub fn file_uri(path: &Path) -> Url {
    Url::from_file_path(path).expect("absolute file path")
}

pub fn dir_uri(path: &Path) -> Url {
    Url::from_directory_path(path).expect("absolute directory path")
}
