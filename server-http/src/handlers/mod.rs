pub mod cache_admin;
pub mod fallback;
pub mod health;

pub use cache_admin::{cache_stats, invalidate_cache};
pub use fallback::not_found;
pub use health::health_check;
