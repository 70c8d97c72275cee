//! # AdRepository
//!
//! The only reader and writer of ad records. Handlers never touch the store
//! directly; they go through the four operations here.

use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{minute_precision, SystemClock};
use crate::codec;
use crate::error::{AppError, Result};
use crate::id::TimestampIdGenerator;
use crate::models::{Ad, AdId, AdListing, Comment, CorruptRecord};
use crate::traits::{Clock, IdGenerator, KeyValueStore};

const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// How `append_comment` guards its read-modify-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendMode {
    /// Plain read then write. Two comments racing on one ad can lose one of
    /// them. Kept to reproduce the historical behavior in compatibility tests.
    Lossy,
    /// Per-ad mutex around read and write. Safe for writers in this process only.
    Locked,
    /// Compare-and-set against the value that was read, re-reading on
    /// conflict. Safe across processes sharing the store.
    #[default]
    Optimistic,
}

pub struct AdRepository {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    append_mode: AppendMode,
    /// Bound on id claims in `create_ad` and on CAS rounds in optimistic appends.
    max_attempts: usize,
    /// Only populated in `AppendMode::Locked`; one entry per ad ever commented on.
    ad_locks: DashMap<AdId, Arc<Mutex<()>>>,
}

impl AdRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Uses `clock` for timestamps and for the default id generator.
    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ids: Arc::new(TimestampIdGenerator::new(Arc::clone(&clock))),
            clock,
            append_mode: AppendMode::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ad_locks: DashMap::new(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_append_mode(mut self, mode: AppendMode) -> Self {
        self.append_mode = mode;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn append_mode(&self) -> AppendMode {
        self.append_mode
    }

    /// Persists a new ad and returns its id.
    ///
    /// The record is written with `set_if_absent`; if another writer claimed
    /// the generated id first, a fresh id is generated and the write retried.
    pub async fn create_ad(&self, author: &str, title: &str, text: &str) -> Result<AdId> {
        require("author", author)?;
        require("title", title)?;
        require("text", text)?;

        let ad = Ad::new(author, title, text, self.now());
        let record = codec::encode(&ad)?;

        for _ in 0..self.max_attempts {
            let id = self.ids.generate(self.store.as_ref()).await?;
            if self.store.set_if_absent(&id.key(), &record).await? {
                info!(ad_id = %id, author, "ad created");
                return Ok(id);
            }
            debug!(ad_id = %id, "ad id claimed by a concurrent writer");
        }

        warn!(attempts = self.max_attempts, "gave up claiming an ad id");
        Err(AppError::Conflict(format!(
            "no free ad id after {} attempts",
            self.max_attempts
        )))
    }

    pub async fn get_ad(&self, id: AdId) -> Result<Ad> {
        self.load(id).await.map(|(_, ad)| ad)
    }

    /// Appends a comment to the end of an existing ad's thread.
    pub async fn append_comment(&self, id: AdId, author: &str, text: &str) -> Result<()> {
        require("comment author", author)?;
        require("comment text", text)?;

        let comment = Comment::new(author, text, self.now());
        match self.append_mode {
            AppendMode::Lossy => self.append_unguarded(id, comment).await?,
            AppendMode::Locked => {
                let lock = Arc::clone(&self.ad_locks.entry(id).or_default());
                let _guard = lock.lock().await;
                self.append_unguarded(id, comment).await?
            }
            AppendMode::Optimistic => self.append_optimistic(id, comment).await?,
        }

        info!(ad_id = %id, author, mode = ?self.append_mode, "comment appended");
        Ok(())
    }

    /// Every ad on the board, newest first.
    ///
    /// Keys that are not ad ids and values that fail to decode are collected
    /// in `AdListing::corrupt`. A key that disappears between the scan and
    /// the read is left out.
    pub async fn list_ads(&self) -> Result<AdListing> {
        let keys = self.store.scan_keys().await?;
        let mut listing = AdListing::default();

        for key in keys {
            let id = match key.parse::<AdId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(key = %key, "skipping key that is not an ad id");
                    listing.corrupt.push(CorruptRecord { key, reason: e.to_string() });
                    continue;
                }
            };
            let Some(raw) = self.store.get(&key).await? else {
                debug!(key = %key, "key vanished during listing");
                continue;
            };
            match codec::decode(&key, &raw) {
                Ok(ad) => listing.ads.push((id, ad)),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping corrupt ad record");
                    listing.corrupt.push(CorruptRecord { key, reason: e.to_string() });
                }
            }
        }

        listing.ads.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(listing)
    }

    /// Raw stored value plus its decoded form.
    async fn load(&self, id: AdId) -> Result<(String, Ad)> {
        let key = id.key();
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| AppError::ad_not_found(id))?;
        let ad = codec::decode(&key, &raw)?;
        Ok((raw, ad))
    }

    async fn append_unguarded(&self, id: AdId, comment: Comment) -> Result<()> {
        let (_, mut ad) = self.load(id).await?;
        ad.comments.push(comment);
        self.store.set(&id.key(), &codec::encode(&ad)?).await
    }

    async fn append_optimistic(&self, id: AdId, comment: Comment) -> Result<()> {
        let key = id.key();
        for attempt in 1..=self.max_attempts {
            let (current, mut ad) = self.load(id).await?;
            ad.comments.push(comment.clone());
            if self.store.compare_and_set(&key, &current, &codec::encode(&ad)?).await? {
                return Ok(());
            }
            debug!(ad_id = %id, attempt, "ad changed underneath comment, retrying");
        }

        warn!(ad_id = %id, attempts = self.max_attempts, "gave up appending comment");
        Err(AppError::Conflict(format!(
            "ad {id} kept changing across {} attempts",
            self.max_attempts
        )))
    }

    fn now(&self) -> chrono::NaiveDateTime {
        minute_precision(self.clock.now().naive_local())
    }
}

/// Rejects values that are empty or only whitespace.
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::MemoryStore;
    use crate::traits::MockKeyValueStore;
    use chrono::Duration;

    const BASE: i64 = 1_700_000_000_000_000;

    fn repo_at(clock: &Arc<FixedClock>) -> (Arc<MemoryStore>, AdRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = AdRepository::with_clock(store.clone(), clock.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (_, repo) = repo_at(&clock);

        let id = repo.create_ad("alice", "Bike", "For sale").await.unwrap();
        let ad = repo.get_ad(id).await.unwrap();

        assert_eq!(ad.author, "alice");
        assert_eq!(ad.title, "Bike");
        assert_eq!(ad.text, "For sale");
        assert_eq!(ad.created_at, minute_precision(clock.now().naive_local()));
        assert!(ad.comments.is_empty());
    }

    #[tokio::test]
    async fn test_fields_are_stored_verbatim() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (_, repo) = repo_at(&clock);

        let id = repo.create_ad("  alice ", "<b>Bike</b>", "line one\nline two").await.unwrap();
        let ad = repo.get_ad(id).await.unwrap();
        assert_eq!(ad.author, "  alice ");
        assert_eq!(ad.title, "<b>Bike</b>");
        assert_eq!(ad.text, "line one\nline two");
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_store_access() {
        // No expectations: any store call would panic.
        let store = Arc::new(MockKeyValueStore::new());
        let repo = AdRepository::new(store);

        for (author, title, text) in [("", "t", "x"), ("a", "   ", "x"), ("a", "t", "\n\t")] {
            let err = repo.create_ad(author, title, text).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "{err:?}");
        }
        let err = repo.append_comment(AdId::from_micros(1), "", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        let err = repo.append_comment(AdId::from_micros(1), "bob", " ").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (store, repo) = repo_at(&clock);
        let missing = AdId::from_micros(42);

        assert!(repo.get_ad(missing).await.unwrap_err().is_not_found());
        assert!(repo.append_comment(missing, "bob", "hello?").await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_comments_keep_call_order() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (_, repo) = repo_at(&clock);
        let id = repo.create_ad("alice", "Bike", "For sale").await.unwrap();

        for n in 0..5 {
            clock.advance(Duration::minutes(1));
            repo.append_comment(id, &format!("user{n}"), &format!("comment {n}")).await.unwrap();
        }

        let ad = repo.get_ad(id).await.unwrap();
        let texts: Vec<&str> = ad.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["comment 0", "comment 1", "comment 2", "comment 3", "comment 4"]);
        assert!(ad.comments.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }

    #[tokio::test]
    async fn test_appending_leaves_ad_fields_untouched() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (_, repo) = repo_at(&clock);
        let id = repo.create_ad("alice", "Bike", "For sale").await.unwrap();
        let before = repo.get_ad(id).await.unwrap();

        clock.advance(Duration::hours(2));
        for mode in [AppendMode::Lossy, AppendMode::Locked, AppendMode::Optimistic] {
            let repo = AdRepository::with_clock(repo.store.clone(), clock.clone()).with_append_mode(mode);
            repo.append_comment(id, "bob", "hi").await.unwrap();
        }

        let after = repo.get_ad(id).await.unwrap();
        assert_eq!(after.comments.len(), 3);
        assert_eq!(
            (&after.author, &after.title, &after.text, after.created_at),
            (&before.author, &before.title, &before.text, before.created_at)
        );
    }

    #[tokio::test]
    async fn test_create_regenerates_when_id_is_claimed_concurrently() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(2).returning(|_| Ok(None));
        let mut first = true;
        store.expect_set_if_absent().times(2).returning(move |_, _| {
            let claimed = !first;
            first = false;
            Ok(claimed)
        });

        let clock = Arc::new(FixedClock::at_micros(BASE));
        let repo = AdRepository::with_clock(Arc::new(store), clock);
        let id = repo.create_ad("alice", "Bike", "For sale").await.unwrap();
        assert_eq!(id, AdId::from_micros(BASE as u64));
    }

    #[tokio::test]
    async fn test_create_gives_up_after_bounded_attempts() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(3).returning(|_| Ok(None));
        store.expect_set_if_absent().times(3).returning(|_, _| Ok(false));

        let repo = AdRepository::new(Arc::new(store)).with_max_attempts(3);
        let err = repo.create_ad("alice", "Bike", "For sale").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_optimistic_append_gives_up_on_a_store_that_always_conflicts() {
        let record = codec::encode(&Ad::new("alice", "Bike", "For sale", minute_precision(chrono::Local::now().naive_local()))).unwrap();
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(2).returning(move |_| Ok(Some(record.clone())));
        store.expect_compare_and_set().times(2).returning(|_, _, _| Ok(false));

        let repo = AdRepository::new(Arc::new(store)).with_max_attempts(2);
        let err = repo.append_comment(AdId::from_micros(7), "bob", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_store_outage_is_reported_as_unavailable() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::StoreUnavailable("connection refused".into())));
        store
            .expect_scan_keys()
            .returning(|| Err(AppError::StoreUnavailable("connection refused".into())));

        let repo = AdRepository::new(Arc::new(store));
        let id = AdId::from_micros(1);
        assert!(matches!(repo.get_ad(id).await, Err(AppError::StoreUnavailable(_))));
        assert!(matches!(repo.append_comment(id, "bob", "hi").await, Err(AppError::StoreUnavailable(_))));
        assert!(matches!(repo.create_ad("a", "b", "c").await, Err(AppError::StoreUnavailable(_))));
        assert!(matches!(repo.list_ads().await, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_numeric() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (store, repo) = repo_at(&clock);
        let record = codec::encode(&Ad::new("x", "y", "z", minute_precision(clock.now().naive_local()))).unwrap();

        // Same board, ids of different digit lengths.
        for key in ["999999", "1000000", "98"] {
            store.set(key, &record).await.unwrap();
        }
        let ids: Vec<u64> = repo.list_ads().await.unwrap().ads.iter().map(|(id, _)| id.as_micros()).collect();
        assert_eq!(ids, vec![1_000_000, 999_999, 98]);
    }

    #[tokio::test]
    async fn test_listing_reports_corrupt_records_and_keeps_the_rest() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (store, repo) = repo_at(&clock);
        let good = repo.create_ad("alice", "Bike", "For sale").await.unwrap();
        store.set("12345", "{\"author\": \"half a rec").await.unwrap();
        store.set("session:abc", "{}").await.unwrap();

        let listing = repo.list_ads().await.unwrap();
        assert_eq!(listing.ads.len(), 1);
        assert_eq!(listing.ads[0].0, good);

        let mut keys: Vec<&str> = listing.corrupt.iter().map(|r| r.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["12345", "session:abc"]);
    }

    #[tokio::test]
    async fn test_get_surfaces_corruption() {
        let clock = Arc::new(FixedClock::at_micros(BASE));
        let (store, repo) = repo_at(&clock);
        store.set("77", "not json").await.unwrap();

        match repo.get_ad(AdId::from_micros(77)).await {
            Err(AppError::DataCorruption { key, .. }) => assert_eq!(key, "77"),
            other => panic!("expected DataCorruption, got {other:?}"),
        }
    }

    #[test]
    fn test_append_mode_parses_lowercase() {
        let mode: AppendMode = serde_json::from_str("\"locked\"").unwrap();
        assert_eq!(mode, AppendMode::Locked);
        assert_eq!(AppendMode::default(), AppendMode::Optimistic);
        assert!(serde_json::from_str::<AppendMode>("\"Locked\"").is_err());
    }
}
