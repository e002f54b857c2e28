use crate::domain::ResponsePayload;
use crate::ports::ResponseStore;
use async_trait::async_trait;
use shared::Result;
use shared::config::CacheSettings;
use storage_engine::{ExpiringStore, StoreStats};

/// In-process response cache
pub type ResponseCache = ExpiringStore<ResponsePayload>;

pub fn response_cache(settings: &CacheSettings) -> ResponseCache {
    ExpiringStore::new(settings.ttl, settings.max_entries)
}

#[async_trait]
impl ResponseStore for ExpiringStore<ResponsePayload> {
    async fn lookup(&self, key: &str) -> Result<Option<ResponsePayload>> {
        Ok(ExpiringStore::lookup(self, key))
    }

    async fn store(&self, key: &str, response: ResponsePayload) -> Result<()> {
        ExpiringStore::store(self, key, response);
        Ok(())
    }

    async fn invalidate(&self, pattern: Option<&str>) -> Result<usize> {
        Ok(ExpiringStore::invalidate(self, pattern))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(ExpiringStore::stats(self))
    }
}
