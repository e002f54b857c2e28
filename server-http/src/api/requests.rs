use serde::Deserialize;

/// Query string of `DELETE /admin/cache`
#[derive(Debug, Default, Deserialize)]
pub struct InvalidateQuery {
    /// Substring of the cache keys to drop; everything when absent
    pub pattern: Option<String>,
}
