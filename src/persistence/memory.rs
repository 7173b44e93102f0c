//! In-process store with the same semantics as the PostgreSQL one.
//!
//! Each content kind keeps its tables behind a single
//! [`tokio::sync::RwLock`], so a transition (remove from pending, insert
//! into the destination, append history) happens under one write guard
//! and is never observed half done.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ContentStore, GiveawayStore, StoreError};
use crate::domain::{
    Content, ContentId, Decision, Giveaway, GiveawayEntry, HistoryEntry, LegacyRecord, Location,
    Prize, Record, Requirement, ReviewState,
};

#[derive(Debug)]
struct Tables<C> {
    pending: HashMap<ContentId, Record<C>>,
    approved: HashMap<ContentId, Record<C>>,
    rejected: HashMap<ContentId, Record<C>>,
    legacy: BTreeMap<ContentId, LegacyRecord<C>>,
    history: Vec<HistoryEntry>,
}

impl<C> Tables<C> {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
            approved: HashMap::new(),
            rejected: HashMap::new(),
            legacy: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    fn state(&self, state: ReviewState) -> &HashMap<ContentId, Record<C>> {
        match state {
            ReviewState::Pending => &self.pending,
            ReviewState::Approved => &self.approved,
            ReviewState::Rejected => &self.rejected,
        }
    }

    fn state_mut(&mut self, state: ReviewState) -> &mut HashMap<ContentId, Record<C>> {
        match state {
            ReviewState::Pending => &mut self.pending,
            ReviewState::Approved => &mut self.approved,
            ReviewState::Rejected => &mut self.rejected,
        }
    }

    fn in_state_tables(&self, id: ContentId) -> bool {
        self.pending.contains_key(&id)
            || self.approved.contains_key(&id)
            || self.rejected.contains_key(&id)
    }

    fn holds(&self, id: ContentId) -> bool {
        self.in_state_tables(id) || self.legacy.contains_key(&id)
    }
}

/// In-memory tables for one content kind.
#[derive(Debug)]
pub struct MemoryStore<C> {
    tables: RwLock<Tables<C>>,
}

impl<C: Content> MemoryStore<C> {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    /// Loads a row into the legacy unified table, as an import from a
    /// pre-split dump would.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the id is taken and
    /// [`StoreError::Database`] if the kind has no legacy table.
    pub async fn insert_legacy(&self, record: LegacyRecord<C>) -> Result<(), StoreError> {
        if C::KIND.legacy_table().is_none() {
            return Err(StoreError::Database(format!(
                "{} has no legacy table",
                C::KIND
            )));
        }
        let mut tables = self.tables.write().await;
        if tables.holds(record.id) {
            return Err(StoreError::UniqueViolation(format!(
                "{} {} already exists",
                C::KIND,
                record.id
            )));
        }
        tables.legacy.insert(record.id, record);
        Ok(())
    }
}

impl<C: Content> Default for MemoryStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore<Giveaway> {
    /// Bumps `entries_count` of an approved giveaway unless it already
    /// holds `max_entries` entries.
    async fn increment_entries(&self, id: ContentId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.approved.get_mut(&id) else {
            return Err(StoreError::Conflict(format!(
                "giveaway {id} is no longer approved"
            )));
        };
        let giveaway = &mut record.content;
        if let Some(max) = giveaway.max_entries
            && giveaway.entries_count >= max
        {
            return Err(StoreError::EntriesFull(format!(
                "giveaway reached its limit of {max} entries"
            )));
        }
        giveaway.entries_count = giveaway.entries_count.saturating_add(1);
        Ok(())
    }
}

#[async_trait]
impl<C: Content> ContentStore<C> for MemoryStore<C> {
    async fn insert_pending(&self, record: &Record<C>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.holds(record.id) {
            return Err(StoreError::UniqueViolation(format!(
                "{} {} already exists",
                C::KIND,
                record.id
            )));
        }
        tables.pending.insert(record.id, record.clone());
        Ok(())
    }

    async fn list(&self, state: ReviewState, limit: i64) -> Result<Vec<Record<C>>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Record<C>> = tables.state(state).values().cloned().collect();
        rows.sort_by(|a, b| b.listed_at().cmp(&a.listed_at()).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn find(
        &self,
        state: ReviewState,
        id: ContentId,
    ) -> Result<Option<Record<C>>, StoreError> {
        Ok(self.tables.read().await.state(state).get(&id).cloned())
    }

    async fn find_legacy(&self, id: ContentId) -> Result<Option<LegacyRecord<C>>, StoreError> {
        Ok(self.tables.read().await.legacy.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: ContentId,
        decision: &Decision,
        at: DateTime<Utc>,
    ) -> Result<Option<Record<C>>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(pending) = tables.pending.remove(&id) else {
            return Ok(None);
        };
        let decided = match pending.clone().decide(decision, at) {
            Ok(decided) => decided,
            Err(err) => {
                tables.pending.insert(id, pending);
                return Err(StoreError::Conflict(err.to_string()));
            }
        };
        tables
            .state_mut(decision.target())
            .insert(id, decided.clone());
        tables
            .history
            .push(HistoryEntry::for_decision(C::KIND, id, decision, at));
        Ok(Some(decided))
    }

    async fn delete(&self, location: Location, id: ContentId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let removed = match location {
            Location::Pending => tables.pending.remove(&id).is_some(),
            Location::Approved => tables.approved.remove(&id).is_some(),
            Location::Rejected => tables.rejected.remove(&id).is_some(),
            Location::Legacy => tables.legacy.remove(&id).is_some(),
        };
        Ok(removed)
    }

    async fn history(&self, id: ContentId) -> Result<Vec<HistoryEntry>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .filter(|entry| entry.content_id == id)
            .cloned()
            .collect())
    }

    async fn migrate_legacy(
        &self,
        limit: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<Record<C>>, StoreError> {
        let mut tables = self.tables.write().await;
        let ids: Vec<ContentId> = tables
            .legacy
            .keys()
            .take(usize::try_from(limit).unwrap_or(0))
            .copied()
            .collect();
        // A taken id aborts the whole batch, as the primary key does in
        // PostgreSQL.
        if let Some(taken) = ids.iter().find(|id| tables.in_state_tables(**id)) {
            return Err(StoreError::UniqueViolation(format!(
                "{} {taken} already exists",
                C::KIND
            )));
        }

        let mut migrated = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(legacy) = tables.legacy.remove(&id) else {
                continue;
            };
            let record = legacy.into_record();
            tables
                .history
                .push(HistoryEntry::for_migration(&record, at));
            tables
                .state_mut(record.state())
                .insert(record.id, record.clone());
            migrated.push(record);
        }
        Ok(migrated)
    }
}

#[derive(Debug, Default)]
struct Children {
    requirements: Vec<Requirement>,
    prizes: Vec<Prize>,
    entries: Vec<GiveawayEntry>,
}

/// In-memory giveaway children and entries, sharing the giveaway tables
/// of a [`MemoryStore<Giveaway>`] for the entry counter.
#[derive(Debug)]
pub struct MemoryGiveawayStore {
    giveaways: Arc<MemoryStore<Giveaway>>,
    children: RwLock<Children>,
}

impl MemoryGiveawayStore {
    /// Creates child tables bound to `giveaways`.
    #[must_use]
    pub fn new(giveaways: Arc<MemoryStore<Giveaway>>) -> Self {
        Self {
            giveaways,
            children: RwLock::new(Children::default()),
        }
    }

    /// The giveaway state tables this store counts entries in.
    #[must_use]
    pub fn giveaways(&self) -> &Arc<MemoryStore<Giveaway>> {
        &self.giveaways
    }
}

#[async_trait]
impl GiveawayStore for MemoryGiveawayStore {
    async fn submit(
        &self,
        record: &Record<Giveaway>,
        requirements: &[Requirement],
        prizes: &[Prize],
    ) -> Result<(), StoreError> {
        self.giveaways.insert_pending(record).await?;
        let mut children = self.children.write().await;
        children.requirements.extend_from_slice(requirements);
        children.prizes.extend_from_slice(prizes);
        Ok(())
    }

    async fn requirements(&self, giveaway_id: ContentId) -> Result<Vec<Requirement>, StoreError> {
        let children = self.children.read().await;
        let mut rows: Vec<Requirement> = children
            .requirements
            .iter()
            .filter(|r| r.giveaway_id == giveaway_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn prizes(&self, giveaway_id: ContentId) -> Result<Vec<Prize>, StoreError> {
        let children = self.children.read().await;
        let mut rows: Vec<Prize> = children
            .prizes
            .iter()
            .filter(|p| p.giveaway_id == giveaway_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.position, p.id));
        Ok(rows)
    }

    async fn record_entry(&self, entry: &GiveawayEntry) -> Result<(), StoreError> {
        let mut children = self.children.write().await;
        if children
            .entries
            .iter()
            .any(|e| e.giveaway_id == entry.giveaway_id && e.user_id == entry.user_id)
        {
            return Err(StoreError::UniqueViolation(format!(
                "entry ({}, {}) already exists",
                entry.giveaway_id, entry.user_id
            )));
        }
        self.giveaways.increment_entries(entry.giveaway_id).await?;
        children.entries.push(entry.clone());
        Ok(())
    }

    async fn find_entry(
        &self,
        giveaway_id: ContentId,
        user_id: &str,
    ) -> Result<Option<GiveawayEntry>, StoreError> {
        let children = self.children.read().await;
        Ok(children
            .entries
            .iter()
            .find(|e| e.giveaway_id == giveaway_id && e.user_id == user_id)
            .cloned())
    }

    async fn entries(
        &self,
        giveaway_id: ContentId,
        limit: i64,
    ) -> Result<Vec<GiveawayEntry>, StoreError> {
        let children = self.children.read().await;
        Ok(children
            .entries
            .iter()
            .filter(|e| e.giveaway_id == giveaway_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn delete_with_children(
        &self,
        location: Location,
        giveaway_id: ContentId,
    ) -> Result<bool, StoreError> {
        // Children first, then the giveaway tables: same order as
        // `record_entry`.
        let mut children = self.children.write().await;
        if !self.giveaways.delete(location, giveaway_id).await? {
            return Ok(false);
        }
        children.requirements.retain(|r| r.giveaway_id != giveaway_id);
        children.prizes.retain(|p| p.giveaway_id != giveaway_id);
        children.entries.retain(|e| e.giveaway_id != giveaway_id);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Script;
    use crate::domain::content::tests::{giveaway, script};

    fn pending(id: i64, title: &str) -> Record<Script> {
        Record::pending(ContentId::new(id), script(title, 10.0), Utc::now())
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = MemoryStore::<Script>::new();
        assert!(store.insert_pending(&pending(1, "A")).await.is_ok());
        let again = store.insert_pending(&pending(1, "B")).await;
        assert!(matches!(again, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn transition_moves_row_and_records_history() {
        let store = MemoryStore::<Script>::new();
        let _ = store.insert_pending(&pending(1, "A")).await;
        let Ok(decision) = Decision::approve("admin", None) else {
            panic!("valid decision");
        };

        let moved = store.transition(ContentId::new(1), &decision, Utc::now()).await;
        let Ok(Some(moved)) = moved else {
            panic!("pending row should move");
        };
        assert_eq!(moved.state(), ReviewState::Approved);

        let still_pending = store.find(ReviewState::Pending, ContentId::new(1)).await;
        assert!(matches!(still_pending, Ok(None)));
        let approved = store.find(ReviewState::Approved, ContentId::new(1)).await;
        assert!(matches!(approved, Ok(Some(_))));

        let history = store.history(ContentId::new(1)).await.unwrap_or_default();
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().map(|h| h.to), Some(ReviewState::Approved));
    }

    #[tokio::test]
    async fn transition_of_missing_row_writes_nothing() {
        let store = MemoryStore::<Script>::new();
        let Ok(decision) = Decision::reject("admin", "spam", None) else {
            panic!("valid decision");
        };
        let result = store.transition(ContentId::new(9), &decision, Utc::now()).await;
        assert!(matches!(result, Ok(None)));
        assert!(store.history(ContentId::new(9)).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = MemoryStore::<Script>::new();
        let now = Utc::now();
        for (id, offset) in [(1, 3), (2, 1), (3, 2)] {
            let record = Record::pending(
                ContentId::new(id),
                script("S", 1.0),
                now + chrono::Duration::seconds(offset),
            );
            let _ = store.insert_pending(&record).await;
        }
        let Ok(rows) = store.list(ReviewState::Pending, 2).await else {
            panic!("list succeeds");
        };
        let ids: Vec<i64> = rows.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn entries_increment_counter_once_per_user() {
        let giveaways = Arc::new(MemoryStore::<Giveaway>::new());
        let store = MemoryGiveawayStore::new(Arc::clone(&giveaways));
        let record = Record::pending(ContentId::new(5), giveaway("Pack"), Utc::now());
        let _ = store.submit(&record, &[], &[]).await;
        let Ok(decision) = Decision::approve("admin", None) else {
            panic!("valid decision");
        };
        let _ = giveaways.transition(ContentId::new(5), &decision, Utc::now()).await;

        let entry = GiveawayEntry {
            id: ContentId::new(100),
            giveaway_id: ContentId::new(5),
            user_id: "u1".to_string(),
            user_name: "User".to_string(),
            user_email: None,
            entered_at: Utc::now(),
            points_earned: 0,
            completed_requirements: Vec::new(),
        };
        assert!(store.record_entry(&entry).await.is_ok());
        let duplicate = store.record_entry(&entry).await;
        assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));

        let Ok(Some(approved)) = giveaways.find(ReviewState::Approved, ContentId::new(5)).await
        else {
            panic!("approved giveaway present");
        };
        assert_eq!(approved.content.entries_count, 1);
    }

    fn entry_by(id: i64, giveaway_id: i64, user: &str) -> GiveawayEntry {
        GiveawayEntry {
            id: ContentId::new(id),
            giveaway_id: ContentId::new(giveaway_id),
            user_id: user.to_string(),
            user_name: "User".to_string(),
            user_email: None,
            entered_at: Utc::now(),
            points_earned: 0,
            completed_requirements: Vec::new(),
        }
    }

    #[tokio::test]
    async fn entries_stop_at_max_entries() {
        let giveaways = Arc::new(MemoryStore::<Giveaway>::new());
        let store = MemoryGiveawayStore::new(Arc::clone(&giveaways));
        let mut capped = giveaway("Pack");
        capped.max_entries = Some(1);
        let record = Record::pending(ContentId::new(5), capped, Utc::now());
        let _ = store.submit(&record, &[], &[]).await;
        let Ok(decision) = Decision::approve("admin", None) else {
            panic!("valid decision");
        };
        let _ = giveaways.transition(ContentId::new(5), &decision, Utc::now()).await;

        assert!(store.record_entry(&entry_by(100, 5, "u1")).await.is_ok());
        let late = store.record_entry(&entry_by(101, 5, "u2")).await;
        assert!(matches!(late, Err(StoreError::EntriesFull(_))));
        assert!(matches!(
            store.find_entry(ContentId::new(5), "u2").await,
            Ok(None)
        ));

        let Ok(Some(approved)) = giveaways.find(ReviewState::Approved, ContentId::new(5)).await
        else {
            panic!("approved giveaway present");
        };
        assert_eq!(approved.content.entries_count, 1);
    }

    #[tokio::test]
    async fn delete_with_children_leaves_moved_rows_alone() {
        let giveaways = Arc::new(MemoryStore::<Giveaway>::new());
        let store = MemoryGiveawayStore::new(Arc::clone(&giveaways));
        let id = ContentId::new(5);
        let requirement = Requirement {
            id: ContentId::new(50),
            giveaway_id: id,
            kind: "discord".to_string(),
            description: "Join".to_string(),
            points: 1,
            required: true,
            link: None,
        };
        let record = Record::pending(id, giveaway("Pack"), Utc::now());
        let _ = store.submit(&record, &[requirement], &[]).await;

        let missed = store.delete_with_children(Location::Approved, id).await;
        assert!(matches!(missed, Ok(false)));
        assert_eq!(store.requirements(id).await.unwrap_or_default().len(), 1);

        let removed = store.delete_with_children(Location::Pending, id).await;
        assert!(matches!(removed, Ok(true)));
        assert!(store.requirements(id).await.unwrap_or_default().is_empty());
        assert!(matches!(giveaways.find(ReviewState::Pending, id).await, Ok(None)));
    }

    #[tokio::test]
    async fn entries_require_an_approved_giveaway() {
        let giveaways = Arc::new(MemoryStore::<Giveaway>::new());
        let store = MemoryGiveawayStore::new(Arc::clone(&giveaways));
        let record = Record::pending(ContentId::new(5), giveaway("Pack"), Utc::now());
        let _ = store.submit(&record, &[], &[]).await;

        let entry = GiveawayEntry {
            id: ContentId::new(100),
            giveaway_id: ContentId::new(5),
            user_id: "u1".to_string(),
            user_name: "User".to_string(),
            user_email: None,
            entered_at: Utc::now(),
            points_earned: 0,
            completed_requirements: Vec::new(),
        };
        let result = store.record_entry(&entry).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(matches!(
            store.find_entry(ContentId::new(5), "u1").await,
            Ok(None)
        ));
    }

    #[tokio::test]
    async fn migrate_legacy_moves_rows_by_status() {
        let store = MemoryStore::<Script>::new();
        for (id, status) in [(1, "approved"), (2, "rejected"), (3, "pending")] {
            let legacy = LegacyRecord {
                id: ContentId::new(id),
                content: script("Old", 3.0),
                status: status.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                rejection_reason: None,
                admin_notes: None,
            };
            assert!(store.insert_legacy(legacy).await.is_ok());
        }

        let Ok(migrated) = store.migrate_legacy(10, Utc::now()).await else {
            panic!("migration succeeds");
        };
        assert_eq!(migrated.len(), 3);
        assert!(matches!(
            store.find(ReviewState::Approved, ContentId::new(1)).await,
            Ok(Some(_))
        ));
        assert!(matches!(
            store.find(ReviewState::Rejected, ContentId::new(2)).await,
            Ok(Some(_))
        ));
        assert!(matches!(
            store.find(ReviewState::Pending, ContentId::new(3)).await,
            Ok(Some(_))
        ));
        assert!(matches!(store.find_legacy(ContentId::new(1)).await, Ok(None)));
    }

    #[tokio::test]
    async fn migrate_legacy_refuses_taken_ids() {
        let store = MemoryStore::<Script>::new();
        let legacy = LegacyRecord {
            id: ContentId::new(1),
            content: script("Old", 3.0),
            status: "approved".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            rejection_reason: None,
            admin_notes: None,
        };
        assert!(store.insert_legacy(legacy).await.is_ok());
        store
            .tables
            .write()
            .await
            .pending
            .insert(ContentId::new(1), pending(1, "Live"));

        let result = store.migrate_legacy(10, Utc::now()).await;
        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
        assert!(matches!(store.find_legacy(ContentId::new(1)).await, Ok(Some(_))));
        let Ok(Some(live)) = store.find(ReviewState::Pending, ContentId::new(1)).await else {
            panic!("pending row kept");
        };
        assert_eq!(live.content.title, "Live");
        assert!(store.history(ContentId::new(1)).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn ads_refuse_legacy_rows() {
        let store = MemoryStore::<crate::domain::Ad>::new();
        let legacy = LegacyRecord {
            id: ContentId::new(1),
            content: crate::domain::content::tests::ad("Hosting"),
            status: "approved".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            rejection_reason: None,
            admin_notes: None,
        };
        assert!(store.insert_legacy(legacy).await.is_err());
    }
}
