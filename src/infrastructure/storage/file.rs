#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::MemoryStorage;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Storage;
use crate::domain::models::StorageScope;

/// One file per key. Device values live in the data directory, visit values in
/// a temp directory named after the visit id, which goes away with the
/// machine's temp files. Without a visit id the visit scope is kept in memory.
pub struct FileStorage {
    pub device_dir: path::PathBuf,
    pub visit_dir: Option<path::PathBuf>,
    visit_fallback: MemoryStorage,
}

impl Default for FileStorage {
    fn default() -> FileStorage {
        let device_dir = path::PathBuf::from(Config::get(ConfigKey::DataDir));

        let visit_id = Config::get(ConfigKey::VisitID);
        let mut visit_dir = None;
        if !visit_id.is_empty() {
            visit_dir = Some(env::temp_dir().join("parley/visits").join(visit_id));
        }

        return FileStorage::new(device_dir, visit_dir);
    }
}

impl FileStorage {
    pub fn new(device_dir: path::PathBuf, visit_dir: Option<path::PathBuf>) -> FileStorage {
        return FileStorage {
            device_dir,
            visit_dir,
            visit_fallback: MemoryStorage::default(),
        };
    }

    fn get_file_path(&self, scope: StorageScope, key: &str) -> Option<path::PathBuf> {
        match scope {
            StorageScope::Device => return Some(self.device_dir.join(key)),
            StorageScope::Visit => {
                return self.visit_dir.as_ref().map(|dir| return dir.join(key));
            }
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    #[allow(clippy::implicit_return)]
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        let file_path = match self.get_file_path(scope, key) {
            Some(file_path) => file_path,
            None => return self.visit_fallback.get(scope, key).await,
        };

        if !file_path.exists() {
            return Ok(None);
        }

        let payload = fs::read_to_string(file_path).await?;
        return Ok(Some(payload));
    }

    /// Writes next to the target, then renames over it.
    #[allow(clippy::implicit_return)]
    async fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        let file_path = match self.get_file_path(scope, key) {
            Some(file_path) => file_path,
            None => return self.visit_fallback.set(scope, key, value).await,
        };

        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = file_path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &file_path).await?;
        tracing::trace!(scope = %scope, key, bytes = value.len(), "Wrote storage key");

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        let file_path = match self.get_file_path(scope, key) {
            Some(file_path) => file_path,
            None => return self.visit_fallback.remove(scope, key).await,
        };

        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }
}
