use serde::Serialize;
use storage_engine::StoreStats;

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheStatsResponse {
    pub fn new(stats: StoreStats, ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            size: stats.size,
            hits: stats.hits,
            misses: stats.misses,
            ttl_secs,
            max_entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}
