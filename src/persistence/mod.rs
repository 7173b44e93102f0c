//! Persistence layer: the state-table stores behind the services.
//!
//! [`ContentStore`] covers the pending / approved / rejected / legacy
//! tables of one content kind and [`GiveawayStore`] the giveaway child
//! rows and entries. Services receive them as trait objects, so the
//! PostgreSQL backend ([`postgres::PostgresStore`]) and the in-process
//! backend ([`memory`]) are interchangeable.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Content, ContentId, Decision, Giveaway, GiveawayEntry, HistoryEntry, LegacyRecord, Location,
    Prize, Record, Requirement, ReviewState,
};

/// SQLSTATE `too_many_connections`.
const TOO_MANY_CONNECTIONS: &str = "53300";
/// SQLSTATE `configuration_limit_exceeded`.
const CONFIGURATION_LIMIT_EXCEEDED: &str = "53400";
/// SQLSTATE `sqlserver_rejected_establishment_of_sqlconnection`.
const CONNECTION_REJECTED: &str = "08004";
/// SQLSTATE `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Storage failure, classified for retry and HTTP mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The pool or the server is at its connection cap. Worth retrying.
    #[error("connection limit reached: {0}")]
    ConnectionLimit(String),

    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row changed state underneath the operation.
    #[error("{0}")]
    Conflict(String),

    /// The giveaway already holds `max_entries` entries.
    #[error("{0}")]
    EntriesFull(String),

    /// Any other database failure.
    #[error("{0}")]
    Database(String),
}

impl StoreError {
    /// Whether the retry wrapper should try the operation again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLimit(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => Self::ConnectionLimit(err.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(TOO_MANY_CONNECTIONS | CONFIGURATION_LIMIT_EXCEEDED | CONNECTION_REJECTED) => {
                    Self::ConnectionLimit(db.message().to_string())
                }
                Some(UNIQUE_VIOLATION) => Self::UniqueViolation(db.message().to_string()),
                _ => Self::Database(err.to_string()),
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// The state tables (and legacy table, if any) of one content kind.
#[async_trait]
pub trait ContentStore<C: Content>: Send + Sync + fmt::Debug {
    /// Inserts a freshly submitted row into the pending table.
    async fn insert_pending(&self, record: &Record<C>) -> Result<(), StoreError>;

    /// Newest-first rows of one state table, at most `limit`.
    async fn list(&self, state: ReviewState, limit: i64) -> Result<Vec<Record<C>>, StoreError>;

    /// The row with `id` in one state table.
    async fn find(
        &self,
        state: ReviewState,
        id: ContentId,
    ) -> Result<Option<Record<C>>, StoreError>;

    /// The row with `id` in the legacy unified table. Always `None` for
    /// kinds without one.
    async fn find_legacy(&self, id: ContentId) -> Result<Option<LegacyRecord<C>>, StoreError>;

    /// Atomically moves a pending row to the decision's table and writes
    /// an audit row. `None` when no pending row has `id`; nothing is
    /// written then.
    async fn transition(
        &self,
        id: ContentId,
        decision: &Decision,
        at: DateTime<Utc>,
    ) -> Result<Option<Record<C>>, StoreError>;

    /// Deletes the row with `id` from one location. `false` if absent.
    async fn delete(&self, location: Location, id: ContentId) -> Result<bool, StoreError>;

    /// Audit rows for `id`, oldest first.
    async fn history(&self, id: ContentId) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Moves up to `limit` legacy rows into the state tables matching
    /// their status and returns them in their new form.
    async fn migrate_legacy(
        &self,
        limit: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<Record<C>>, StoreError>;
}

/// Giveaway child rows and entries.
#[async_trait]
pub trait GiveawayStore: Send + Sync + fmt::Debug {
    /// Inserts a pending giveaway together with its children.
    async fn submit(
        &self,
        record: &Record<Giveaway>,
        requirements: &[Requirement],
        prizes: &[Prize],
    ) -> Result<(), StoreError>;

    /// Requirements of a giveaway, ordered by id.
    async fn requirements(&self, giveaway_id: ContentId) -> Result<Vec<Requirement>, StoreError>;

    /// Prizes of a giveaway, ordered by position.
    async fn prizes(&self, giveaway_id: ContentId) -> Result<Vec<Prize>, StoreError>;

    /// Inserts an entry and increments the approved giveaway's
    /// `entries_count` in one transaction. The increment itself re-checks
    /// `max_entries`, so concurrent entries never overshoot the cap.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the user already
    /// entered, [`StoreError::EntriesFull`] if the cap is reached and
    /// [`StoreError::Conflict`] if the giveaway is no longer in the
    /// approved table. Nothing is written on failure.
    async fn record_entry(&self, entry: &GiveawayEntry) -> Result<(), StoreError>;

    /// A user's entry in a giveaway.
    async fn find_entry(
        &self,
        giveaway_id: ContentId,
        user_id: &str,
    ) -> Result<Option<GiveawayEntry>, StoreError>;

    /// Entries of a giveaway, oldest first, at most `limit`.
    async fn entries(
        &self,
        giveaway_id: ContentId,
        limit: i64,
    ) -> Result<Vec<GiveawayEntry>, StoreError>;

    /// Deletes the giveaway row at `location` together with its
    /// requirements, prizes and entries in one transaction. `false` if
    /// the row is not there; nothing is deleted then.
    async fn delete_with_children(
        &self,
        location: Location,
        giveaway_id: ContentId,
    ) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_limits_are_transient() {
        assert!(StoreError::ConnectionLimit("cap".to_string()).is_transient());
        assert!(!StoreError::Database("syntax".to_string()).is_transient());
        assert!(!StoreError::UniqueViolation("dup".to_string()).is_transient());
        assert!(!StoreError::Conflict("moved".to_string()).is_transient());
        assert!(!StoreError::EntriesFull("cap".to_string()).is_transient());
    }

    #[test]
    fn pool_timeout_is_a_connection_limit() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn other_sqlx_errors_are_not_retried() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
