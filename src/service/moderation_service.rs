//! Moderation service: submission, review and lookup for one content kind.

use std::sync::Arc;

use chrono::Utc;

use super::retry::{RetryPolicy, with_retry};
use crate::domain::{
    Content, ContentId, Decision, HistoryEntry, IdGenerator, Location, Lookup, Record, ReviewState,
};
use crate::error::MarketError;
use crate::persistence::ContentStore;

/// Largest `limit` a caller may ask a list query for.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Orchestrates the pending → approved / rejected workflow of `C`.
///
/// Stateless coordinator: owns the store for `C`'s tables, the shared id
/// generator and the retry policy applied to list queries. Every
/// mutation follows the pattern: validate → call the store → log.
#[derive(Debug)]
pub struct ModerationService<C: Content> {
    store: Arc<dyn ContentStore<C>>,
    ids: Arc<IdGenerator>,
    retry: RetryPolicy,
}

impl<C: Content> ModerationService<C> {
    /// Creates a new `ModerationService`.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore<C>>, ids: Arc<IdGenerator>, retry: RetryPolicy) -> Self {
        Self { store, ids, retry }
    }

    /// Returns the shared id generator.
    #[must_use]
    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    /// Clamps a caller-supplied limit, defaulting per content kind.
    #[must_use]
    pub fn effective_limit(limit: Option<i64>) -> i64 {
        limit
            .unwrap_or_else(|| C::KIND.default_list_limit())
            .clamp(1, MAX_LIST_LIMIT)
    }

    /// Inserts a new submission into the pending table.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] for invalid fields or a
    /// storage error.
    pub async fn submit(&self, mut content: C) -> Result<Record<C>, MarketError> {
        content.validate()?;
        content.prepare_submission();
        let record = Record::pending(self.ids.next_id(), content, Utc::now());
        self.store.insert_pending(&record).await?;

        tracing::info!(
            kind = %C::KIND,
            id = %record.id,
            owner = record.content.owner_id(),
            "submission received"
        );
        Ok(record)
    }

    /// Newest-first rows of one state table, retried on connection limits.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unavailable`] once retries are exhausted or
    /// [`MarketError::Persistence`] on any other failure.
    pub async fn list(
        &self,
        state: ReviewState,
        limit: Option<i64>,
    ) -> Result<Vec<Record<C>>, MarketError> {
        let limit = Self::effective_limit(limit);
        let operation = format!("list_{}", C::KIND.table(state));
        let rows = with_retry(&self.retry, &operation, || self.store.list(state, limit)).await?;
        Ok(rows)
    }

    /// Newest-first rows across all three state tables.
    ///
    /// # Errors
    ///
    /// Same as [`ModerationService::list`].
    pub async fn list_all(&self, limit: Option<i64>) -> Result<Vec<Record<C>>, MarketError> {
        let limit = Self::effective_limit(limit);
        let mut rows = Vec::new();
        for state in [
            ReviewState::Pending,
            ReviewState::Approved,
            ReviewState::Rejected,
        ] {
            rows.extend(self.list(state, Some(limit)).await?);
        }
        rows.sort_by(|a, b| b.listed_at().cmp(&a.listed_at()).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    /// Moves a pending row to the approved table.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if no pending row has `id`.
    pub async fn approve(
        &self,
        id: ContentId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<Record<C>, MarketError> {
        self.review(id, Decision::approve(reviewer, notes)?).await
    }

    /// Moves a pending row to the rejected table.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] for a blank reason and
    /// [`MarketError::NotFound`] if no pending row has `id`.
    pub async fn reject(
        &self,
        id: ContentId,
        reviewer: &str,
        reason: &str,
        notes: Option<String>,
    ) -> Result<Record<C>, MarketError> {
        self.review(id, Decision::reject(reviewer, reason, notes)?).await
    }

    /// Applies a reviewer decision to a pending row.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if no pending row has `id`; no
    /// table is changed then.
    pub async fn review(
        &self,
        id: ContentId,
        decision: Decision,
    ) -> Result<Record<C>, MarketError> {
        let moved = self
            .store
            .transition(id, &decision, Utc::now())
            .await?
            .ok_or(MarketError::NotFound { kind: C::KIND, id })?;

        tracing::info!(
            kind = %C::KIND,
            %id,
            reviewer = decision.reviewer(),
            state = %decision.target(),
            "submission reviewed"
        );
        Ok(moved)
    }

    /// Finds `id` wherever it currently lives.
    ///
    /// Probes approved, pending, rejected and finally the legacy table.
    ///
    /// # Errors
    ///
    /// Returns a storage error; absence is `Ok(None)`.
    pub async fn lookup(&self, id: ContentId) -> Result<Option<Lookup<C>>, MarketError> {
        for state in ReviewState::LOOKUP_ORDER {
            if let Some(record) = self.store.find(state, id).await? {
                return Ok(Some(Lookup {
                    location: state.into(),
                    record,
                }));
            }
        }
        Ok(self
            .store
            .find_legacy(id)
            .await?
            .map(|legacy| Lookup {
                location: Location::Legacy,
                record: legacy.into_record(),
            }))
    }

    /// The table holding `id`, provided `owner` submitted it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if no table holds `id` and
    /// [`MarketError::Forbidden`] if `owner` did not submit it.
    pub async fn locate_owned(&self, id: ContentId, owner: &str) -> Result<Location, MarketError> {
        let found = self
            .lookup(id)
            .await?
            .ok_or(MarketError::NotFound { kind: C::KIND, id })?;
        if found.record.content.owner_id() != owner {
            return Err(MarketError::Forbidden(format!(
                "{} {id} belongs to another user",
                C::KIND
            )));
        }
        Ok(found.location)
    }

    /// Deletes `id` from whichever table holds it, on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::locate_owned`], plus [`MarketError::Conflict`] if
    /// the row moved before it could be deleted.
    pub async fn delete(&self, id: ContentId, owner: &str) -> Result<Location, MarketError> {
        let location = self.locate_owned(id, owner).await?;
        if !self.store.delete(location, id).await? {
            // Reviewed or deleted between lookup and delete.
            return Err(MarketError::Conflict(format!(
                "{} {id} moved while being deleted",
                C::KIND
            )));
        }

        tracing::info!(kind = %C::KIND, %id, location = location.as_str(), "content deleted");
        Ok(location)
    }

    /// Audit trail of `id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn history(&self, id: ContentId) -> Result<Vec<HistoryEntry>, MarketError> {
        Ok(self.store.history(id).await?)
    }

    /// Moves up to `limit` legacy rows into the state tables.
    ///
    /// # Errors
    ///
    /// Returns a storage error; nothing is moved then.
    pub async fn migrate_legacy(&self, limit: Option<i64>) -> Result<Vec<Record<C>>, MarketError> {
        if C::KIND.legacy_table().is_none() {
            return Ok(Vec::new());
        }
        let limit = Self::effective_limit(limit);
        let migrated = self.store.migrate_legacy(limit, Utc::now()).await?;
        if !migrated.is_empty() {
            tracing::info!(kind = %C::KIND, count = migrated.len(), "legacy rows migrated");
        }
        Ok(migrated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::domain::content::tests::{ad, script};
    use crate::domain::{Ad, LegacyRecord, Review, Script};
    use crate::persistence::StoreError;
    use crate::persistence::memory::MemoryStore;

    pub(crate) fn service<C: Content>(store: Arc<MemoryStore<C>>) -> ModerationService<C> {
        ModerationService::new(
            store,
            Arc::new(IdGenerator::new()),
            RetryPolicy::new(3, Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn submitted_script_only_appears_in_pending() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let Ok(record) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };

        let pending = svc.list(ReviewState::Pending, None).await.unwrap_or_default();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.first().map(|r| r.id), Some(record.id));
        assert!(svc.list(ReviewState::Approved, None).await.unwrap_or_default().is_empty());
        assert!(svc.list(ReviewState::Rejected, None).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn invalid_submission_is_not_stored() {
        let store = Arc::new(MemoryStore::<Script>::new());
        let svc = service(Arc::clone(&store));
        let result = svc.submit(script("", 25.99)).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
        assert!(svc.list(ReviewState::Pending, None).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn reject_scenario_moves_script_to_rejected() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let Ok(submitted) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };

        let Ok(rejected) = svc
            .reject(submitted.id, "admin-1", "missing screenshots", None)
            .await
        else {
            panic!("rejection succeeds");
        };
        let Review::Rejected {
            rejection_reason, ..
        } = &rejected.review
        else {
            panic!("expected rejected review");
        };
        assert_eq!(rejection_reason, "missing screenshots");

        assert!(svc.list(ReviewState::Pending, None).await.unwrap_or_default().is_empty());
        assert!(svc.list(ReviewState::Approved, None).await.unwrap_or_default().is_empty());
        let listed = svc.list(ReviewState::Rejected, None).await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().map(|r| r.content.title.as_str()), Some("Banking v1"));
    }

    #[tokio::test]
    async fn approve_then_lookup_returns_approved_copy() {
        let svc = service(Arc::new(MemoryStore::<Ad>::new()));
        let Ok(submitted) = svc.submit(ad("Hosting")).await else {
            panic!("submission succeeds");
        };

        let Ok(Some(before)) = svc.lookup(submitted.id).await else {
            panic!("pending row found");
        };
        assert_eq!(before.location, Location::Pending);

        let approved = svc.approve(submitted.id, "admin-1", Some("ok".to_string())).await;
        assert!(approved.is_ok());

        let Ok(Some(after)) = svc.lookup(submitted.id).await else {
            panic!("approved row found");
        };
        assert_eq!(after.location, Location::Approved);
        assert_eq!(after.record.content, submitted.content);
        assert_eq!(after.record.admin_notes.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn reviewing_unknown_id_is_not_found_and_changes_nothing() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let Ok(submitted) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };

        let missing = ContentId::new(submitted.id.get() + 1);
        let result = svc.approve(missing, "admin-1", None).await;
        assert!(matches!(result, Err(MarketError::NotFound { .. })));
        let result = svc.reject(missing, "admin-1", "spam", None).await;
        assert!(matches!(result, Err(MarketError::NotFound { .. })));

        assert_eq!(svc.list(ReviewState::Pending, None).await.unwrap_or_default().len(), 1);
        assert!(svc.list(ReviewState::Approved, None).await.unwrap_or_default().is_empty());
        assert!(svc.list(ReviewState::Rejected, None).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn second_review_of_same_id_is_not_found() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let Ok(submitted) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };
        assert!(svc.approve(submitted.id, "admin-1", None).await.is_ok());
        let again = svc.reject(submitted.id, "admin-2", "late", None).await;
        assert!(matches!(again, Err(MarketError::NotFound { .. })));
        assert_eq!(svc.list(ReviewState::Approved, None).await.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_approvals_move_the_row_once() {
        let svc = Arc::new(service(Arc::new(MemoryStore::<Script>::new())));
        let Ok(submitted) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };

        let attempts = (0..8).map(|i| {
            let svc = Arc::clone(&svc);
            let id = submitted.id;
            tokio::spawn(async move { svc.approve(id, &format!("admin-{i}"), None).await })
        });
        let results = futures_util::future::join_all(attempts).await;
        let successes = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(svc.list(ReviewState::Approved, None).await.unwrap_or_default().len(), 1);
        assert_eq!(svc.history(submitted.id).await.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn lookup_falls_back_to_legacy_table() {
        let store = Arc::new(MemoryStore::<Script>::new());
        let svc = service(Arc::clone(&store));
        let legacy = LegacyRecord {
            id: ContentId::new(77),
            content: script("Old script", 5.0),
            status: "approved".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            rejection_reason: None,
            admin_notes: None,
        };
        assert!(store.insert_legacy(legacy).await.is_ok());

        let Ok(Some(found)) = svc.lookup(ContentId::new(77)).await else {
            panic!("legacy row found");
        };
        assert_eq!(found.location, Location::Legacy);
        assert_eq!(found.record.state(), ReviewState::Approved);
        assert!(matches!(svc.lookup(ContentId::new(78)).await, Ok(None)));
    }

    #[tokio::test]
    async fn delete_checks_owner_and_targets_current_table() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let Ok(submitted) = svc.submit(script("Banking v1", 25.99)).await else {
            panic!("submission succeeds");
        };
        let _ = svc.approve(submitted.id, "admin-1", None).await;

        let stranger = svc.delete(submitted.id, "someone-else").await;
        assert!(matches!(stranger, Err(MarketError::Forbidden(_))));

        let owner = svc.delete(submitted.id, "seller-1").await;
        assert!(matches!(owner, Ok(Location::Approved)));
        assert!(matches!(svc.lookup(submitted.id).await, Ok(None)));

        let again = svc.delete(submitted.id, "seller-1").await;
        assert!(matches!(again, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_all_merges_state_tables() {
        let svc = service(Arc::new(MemoryStore::<Script>::new()));
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let Ok(record) = svc.submit(script(title, 1.0)).await else {
                panic!("submission succeeds");
            };
            ids.push(record.id);
        }
        if let [a, b, _] = ids.as_slice() {
            let _ = svc.approve(*a, "admin", None).await;
            let _ = svc.reject(*b, "admin", "dupe", None).await;
        }
        let all = svc.list_all(None).await.unwrap_or_default();
        assert_eq!(all.len(), 3);
        assert_eq!(svc.list_all(Some(2)).await.unwrap_or_default().len(), 2);
    }

    #[test]
    fn limits_default_per_kind_and_clamp() {
        assert_eq!(ModerationService::<Script>::effective_limit(None), 100);
        assert_eq!(ModerationService::<Ad>::effective_limit(None), 50);
        assert_eq!(ModerationService::<Ad>::effective_limit(Some(0)), 1);
        assert_eq!(ModerationService::<Ad>::effective_limit(Some(10_000)), MAX_LIST_LIMIT);
    }

    /// Fails list queries with a connection-limit error a fixed number of
    /// times before delegating.
    #[derive(Debug)]
    struct SaturatedStore {
        inner: MemoryStore<Script>,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ContentStore<Script> for SaturatedStore {
        async fn insert_pending(&self, record: &Record<Script>) -> Result<(), StoreError> {
            self.inner.insert_pending(record).await
        }

        async fn list(
            &self,
            state: ReviewState,
            limit: i64,
        ) -> Result<Vec<Record<Script>>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::ConnectionLimit("too many connections".to_string()));
            }
            self.inner.list(state, limit).await
        }

        async fn find(
            &self,
            state: ReviewState,
            id: ContentId,
        ) -> Result<Option<Record<Script>>, StoreError> {
            self.inner.find(state, id).await
        }

        async fn find_legacy(
            &self,
            id: ContentId,
        ) -> Result<Option<LegacyRecord<Script>>, StoreError> {
            self.inner.find_legacy(id).await
        }

        async fn transition(
            &self,
            id: ContentId,
            decision: &Decision,
            at: DateTime<Utc>,
        ) -> Result<Option<Record<Script>>, StoreError> {
            self.inner.transition(id, decision, at).await
        }

        async fn delete(&self, location: Location, id: ContentId) -> Result<bool, StoreError> {
            self.inner.delete(location, id).await
        }

        async fn history(&self, id: ContentId) -> Result<Vec<HistoryEntry>, StoreError> {
            self.inner.history(id).await
        }

        async fn migrate_legacy(
            &self,
            limit: i64,
            at: DateTime<Utc>,
        ) -> Result<Vec<Record<Script>>, StoreError> {
            self.inner.migrate_legacy(limit, at).await
        }
    }

    fn saturated(failures: u32) -> (Arc<SaturatedStore>, ModerationService<Script>) {
        let store = Arc::new(SaturatedStore {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        });
        let svc = ModerationService::new(
            Arc::clone(&store) as Arc<dyn ContentStore<Script>>,
            Arc::new(IdGenerator::new()),
            RetryPolicy::new(3, Duration::from_millis(1000)),
        );
        (store, svc)
    }

    #[tokio::test(start_paused = true)]
    async fn list_survives_two_connection_limit_errors() {
        let (store, svc) = saturated(2);
        let _ = svc.submit(script("Banking v1", 25.99)).await;

        let rows = svc.list(ReviewState::Pending, None).await;
        assert_eq!(rows.map(|r| r.len()).ok(), Some(1));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn list_reports_unavailable_after_exhausting_retries() {
        let (store, svc) = saturated(5);
        let rows = svc.list(ReviewState::Pending, None).await;
        assert!(matches!(rows, Err(MarketError::Unavailable(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}
