//! # Core Traits (Ports)
//!
//! Any store plugin must implement `KeyValueStore` to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::Result;
use crate::models::AdId;

/// Storage contract: a flat map from string key to string value.
///
/// Implementations report connection and command failures as
/// `AppError::StoreUnavailable`; an absent key is `Ok(None)`, never an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites unconditionally.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Every live key, in no particular order.
    async fn scan_keys(&self) -> Result<Vec<String>>;

    /// Atomic create. Returns `false` (and writes nothing) if the key exists.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Atomic replace. Writes `value` only if the key currently holds exactly
    /// `expected`; returns whether the write happened.
    async fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> Result<bool>;
}

/// Hands out ids for new ads.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// Returns an id whose key was free in `store` at the time of the check.
    async fn generate(&self, store: &dyn KeyValueStore) -> Result<AdId>;
}

/// Source of wall-clock time for ids and timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}
