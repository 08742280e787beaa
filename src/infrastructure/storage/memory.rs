use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::models::Storage;
use crate::domain::models::StorageScope;

/// Storage that lives as long as the value does. Backs tests, and stands in
/// for the visit scope when no visit id can be determined.
#[derive(Default)]
pub struct MemoryStorage {
    values: DashMap<(StorageScope, String), String>,
}

impl MemoryStorage {
    #[cfg(test)]
    pub fn with_values(values: Vec<(StorageScope, &str, &str)>) -> MemoryStorage {
        let storage = MemoryStorage::default();
        for (scope, key, value) in values {
            storage
                .values
                .insert((scope, key.to_string()), value.to_string());
        }

        return storage;
    }

    pub fn peek(&self, scope: StorageScope, key: &str) -> Option<String> {
        return self
            .values
            .get(&(scope, key.to_string()))
            .map(|value| return value.value().to_string());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    #[allow(clippy::implicit_return)]
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        return Ok(self.peek(scope, key));
    }

    #[allow(clippy::implicit_return)]
    async fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        self.values
            .insert((scope, key.to_string()), value.to_string());
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        self.values.remove(&(scope, key.to_string()));
        return Ok(());
    }
}
