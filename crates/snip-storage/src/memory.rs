use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::RwLock;
use snip_core::error::StorageError;
use snip_core::repository::{Repository, Result, UrlRecord};
use snip_core::shortcode::ShortCode;
use std::collections::HashMap;

/// Volatile repository keeping every record in a process-local map.
///
/// Reads share the lock, writes take it exclusively. Nothing survives a
/// restart; use it for tests and throwaway deployments.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: RwLock<HashMap<String, UrlRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn create(
        &self,
        code: &ShortCode,
        original_url: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<()> {
        let mut storage = self.storage.write();

        // Expired codes stay reserved, same as the UNIQUE column in SQLite.
        if storage.contains_key(code.as_str()) {
            return Err(StorageError::Conflict(code.to_string()));
        }

        storage.insert(
            code.as_str().to_owned(),
            UrlRecord {
                code: code.clone(),
                original_url: original_url.to_owned(),
                created_at: Timestamp::now(),
                expires_at,
                click_count: 0,
            },
        );
        Ok(())
    }

    async fn get_by_code(&self, code: &ShortCode) -> Result<UrlRecord> {
        let storage = self.storage.read();
        match storage.get(code.as_str()) {
            Some(record) if !record.is_expired_at(Timestamp::now()) => Ok(record.clone()),
            _ => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn record_click(&self, code: &ShortCode) -> Result<()> {
        if let Some(record) = self.storage.write().get_mut(code.as_str()) {
            record.click_count += 1;
        }
        Ok(())
    }
}
