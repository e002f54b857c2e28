//! Bounded, time-expiring key/value storage used by the response cache.

mod expiring_store;

pub use expiring_store::{ExpiringStore, StoreStats, spawn_sweeper};
