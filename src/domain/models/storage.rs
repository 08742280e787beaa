use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// How long a stored value lives. `Device` survives restarts, `Visit` only
/// lasts as long as the shell the client was launched from.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StorageScope {
    Device,
    Visit,
}

#[async_trait]
pub trait Storage {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>>;

    /// Overwrites the whole value stored under `key`.
    async fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, scope: StorageScope, key: &str) -> Result<()>;
}

pub type StorageBox = Arc<dyn Storage + Send + Sync>;
