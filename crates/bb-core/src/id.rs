//! # Ad identifiers
//!
//! Ids come from the clock at microsecond precision, so they sort
//! chronologically. A candidate whose key is already taken is bumped forward
//! by one microsecond until a free key is found.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::AdId;
use crate::traits::{Clock, IdGenerator, KeyValueStore};

pub struct TimestampIdGenerator {
    clock: Arc<dyn Clock>,
}

impl TimestampIdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl IdGenerator for TimestampIdGenerator {
    async fn generate(&self, store: &dyn KeyValueStore) -> Result<AdId> {
        let mut candidate = AdId::from_time(&self.clock.now());
        while store.get(&candidate.key()).await?.is_some() {
            let next = candidate
                .successor()
                .ok_or_else(|| AppError::Internal("ad id space exhausted".to_string()))?;
            debug!(taken = %candidate, next = %next, "ad id collision");
            candidate = next;
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::MemoryStore;
    use crate::traits::MockKeyValueStore;

    const BASE: i64 = 1_700_000_000_000_000;

    #[tokio::test]
    async fn test_free_candidate_is_the_clock_reading() {
        let ids = TimestampIdGenerator::new(Arc::new(FixedClock::at_micros(BASE)));
        let id = ids.generate(&MemoryStore::new()).await.unwrap();
        assert_eq!(id, AdId::from_micros(BASE as u64));
    }

    #[tokio::test]
    async fn test_collisions_step_forward_one_microsecond() {
        let store = MemoryStore::new();
        store.set(&BASE.to_string(), "{}").await.unwrap();
        store.set(&(BASE + 1).to_string(), "{}").await.unwrap();

        let ids = TimestampIdGenerator::new(Arc::new(FixedClock::at_micros(BASE)));
        let id = ids.generate(&store).await.unwrap();
        assert_eq!(id, AdId::from_micros(BASE as u64 + 2));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_without_an_id() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Err(AppError::StoreUnavailable("connection refused".into())));

        let ids = TimestampIdGenerator::new(Arc::new(FixedClock::at_micros(BASE)));
        let err = ids.generate(&store).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
