//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

use super::models::{
    PgContent, bind_review, decode_entry, decode_history, decode_legacy, decode_prize,
    decode_record, decode_requirement, order_column, review_columns,
};
use super::{ContentStore, GiveawayStore, StoreError};
use crate::config::MarketConfig;
use crate::domain::{
    ContentId, ContentKind, Decision, Giveaway, GiveawayEntry, HistoryEntry, LegacyRecord,
    Location, Prize, Record, Requirement, ReviewState,
};

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// One value serves every content kind; the pool is built once at
/// startup and cloned into each service.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized and timed from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the first connection cannot be made.
    pub async fn connect(config: &MarketConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.database_idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.database_max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "database connection pool ready"
        );
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

/// `INSERT` statement for a full row of `C` in a table of `state`.
fn insert_sql<C: PgContent>(table: &str, state: ReviewState) -> String {
    let columns: Vec<&str> = std::iter::once("id")
        .chain(C::COLUMNS.iter().copied())
        .chain(["submitted_at", "admin_notes"])
        .chain(review_columns(state).iter().copied())
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

async fn insert_record<C: PgContent>(
    conn: &mut PgConnection,
    record: &Record<C>,
) -> Result<(), sqlx::Error> {
    let table = C::KIND.table(record.state());
    let sql = insert_sql::<C>(table, record.state());
    let query = sqlx::query(&sql).bind(record.id.get());
    let query = record
        .content
        .bind_fields(query)
        .bind(record.submitted_at)
        .bind(record.admin_notes.as_deref());
    bind_review(&record.review, query).execute(conn).await?;
    Ok(())
}

async fn insert_history(conn: &mut PgConnection, entry: &HistoryEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO moderation_history \
         (content_kind, content_id, from_state, to_state, actor, reason, recorded_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.kind.as_str())
    .bind(entry.content_id.get())
    .bind(entry.from.as_str())
    .bind(entry.to.as_str())
    .bind(entry.actor.as_str())
    .bind(entry.reason.as_deref())
    .bind(entry.recorded_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn location_table(kind: ContentKind, location: Location) -> Option<&'static str> {
    match location {
        Location::Pending => Some(kind.table(ReviewState::Pending)),
        Location::Approved => Some(kind.table(ReviewState::Approved)),
        Location::Rejected => Some(kind.table(ReviewState::Rejected)),
        Location::Legacy => kind.legacy_table(),
    }
}

#[async_trait]
impl<C: PgContent> ContentStore<C> for PostgresStore {
    async fn insert_pending(&self, record: &Record<C>) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, record).await?;
        Ok(())
    }

    async fn list(&self, state: ReviewState, limit: i64) -> Result<Vec<Record<C>>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} DESC, id DESC LIMIT $1",
            C::KIND.table(state),
            order_column(state)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_record::<C>(row, state).map_err(StoreError::from))
            .collect()
    }

    async fn find(
        &self,
        state: ReviewState,
        id: ContentId,
    ) -> Result<Option<Record<C>>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", C::KIND.table(state));
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .as_ref()
            .map(|row| decode_record::<C>(row, state))
            .transpose()?)
    }

    async fn find_legacy(&self, id: ContentId) -> Result<Option<LegacyRecord<C>>, StoreError> {
        let Some(table) = C::KIND.legacy_table() else {
            return Ok(None);
        };
        let sql = format!("SELECT * FROM {table} WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(decode_legacy::<C>).transpose()?)
    }

    async fn transition(
        &self,
        id: ContentId,
        decision: &Decision,
        at: DateTime<Utc>,
    ) -> Result<Option<Record<C>>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock taken by the DELETE makes a concurrent second review
        // of the same id find nothing once this one commits.
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 RETURNING *",
            C::KIND.table(ReviewState::Pending)
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let pending = decode_record::<C>(&row, ReviewState::Pending)?;
        let decided = pending
            .decide(decision, at)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        insert_record(&mut tx, &decided).await?;
        insert_history(&mut tx, &HistoryEntry::for_decision(C::KIND, id, decision, at)).await?;
        tx.commit().await?;

        Ok(Some(decided))
    }

    async fn delete(&self, location: Location, id: ContentId) -> Result<bool, StoreError> {
        let Some(table) = location_table(C::KIND, location) else {
            return Ok(false);
        };
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql).bind(id.get()).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn history(&self, id: ContentId) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM moderation_history WHERE content_kind = $1 AND content_id = $2 \
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(C::KIND.as_str())
        .bind(id.get())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode_history(row).map_err(StoreError::from))
            .collect()
    }

    async fn migrate_legacy(
        &self,
        limit: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<Record<C>>, StoreError> {
        let Some(table) = C::KIND.legacy_table() else {
            return Ok(Vec::new());
        };
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT * FROM {table} ORDER BY id LIMIT $1 FOR UPDATE SKIP LOCKED");
        let rows = sqlx::query(&select).bind(limit).fetch_all(&mut *tx).await?;

        let delete = format!("DELETE FROM {table} WHERE id = $1");
        let mut migrated = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = decode_legacy::<C>(row)?.into_record();
            insert_record(&mut tx, &record).await?;
            sqlx::query(&delete)
                .bind(record.id.get())
                .execute(&mut *tx)
                .await?;
            insert_history(&mut tx, &HistoryEntry::for_migration(&record, at)).await?;
            migrated.push(record);
        }
        tx.commit().await?;

        Ok(migrated)
    }
}

async fn insert_requirement(
    conn: &mut PgConnection,
    req: &Requirement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO giveaway_requirements \
         (id, giveaway_id, kind, description, points, required, link) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(req.id.get())
    .bind(req.giveaway_id.get())
    .bind(req.kind.as_str())
    .bind(req.description.as_str())
    .bind(req.points)
    .bind(req.required)
    .bind(req.link.as_deref())
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_prize(conn: &mut PgConnection, prize: &Prize) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO giveaway_prizes \
         (id, giveaway_id, position, name, description, value, winner_name) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(prize.id.get())
    .bind(prize.giveaway_id.get())
    .bind(prize.position)
    .bind(prize.name.as_str())
    .bind(prize.description.as_deref())
    .bind(prize.value.as_str())
    .bind(prize.winner_name.as_deref())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl GiveawayStore for PostgresStore {
    async fn submit(
        &self,
        record: &Record<Giveaway>,
        requirements: &[Requirement],
        prizes: &[Prize],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_record(&mut tx, record).await?;
        for requirement in requirements {
            insert_requirement(&mut tx, requirement).await?;
        }
        for prize in prizes {
            insert_prize(&mut tx, prize).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn requirements(&self, giveaway_id: ContentId) -> Result<Vec<Requirement>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM giveaway_requirements WHERE giveaway_id = $1 ORDER BY id",
        )
        .bind(giveaway_id.get())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode_requirement(row).map_err(StoreError::from))
            .collect()
    }

    async fn prizes(&self, giveaway_id: ContentId) -> Result<Vec<Prize>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM giveaway_prizes WHERE giveaway_id = $1 ORDER BY position, id",
        )
        .bind(giveaway_id.get())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode_prize(row).map_err(StoreError::from))
            .collect()
    }

    async fn record_entry(&self, entry: &GiveawayEntry) -> Result<(), StoreError> {
        let completed: Vec<i64> = entry
            .completed_requirements
            .iter()
            .map(|id| id.get())
            .collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO giveaway_entries \
             (id, giveaway_id, user_id, user_name, user_email, entered_at, points_earned, \
             completed_requirements) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id.get())
        .bind(entry.giveaway_id.get())
        .bind(entry.user_id.as_str())
        .bind(entry.user_name.as_str())
        .bind(entry.user_email.as_deref())
        .bind(entry.entered_at)
        .bind(entry.points_earned)
        .bind(completed)
        .execute(&mut *tx)
        .await?;

        // Concurrent entries queue on the row lock and re-evaluate the cap
        // against the committed count.
        let updated = sqlx::query(
            "UPDATE approved_giveaways SET entries_count = entries_count + 1 \
             WHERE id = $1 AND (max_entries IS NULL OR entries_count < max_entries)",
        )
        .bind(entry.giveaway_id.get())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let cap: Option<Option<i32>> =
                sqlx::query_scalar("SELECT max_entries FROM approved_giveaways WHERE id = $1")
                    .bind(entry.giveaway_id.get())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match cap {
                Some(max) => StoreError::EntriesFull(format!(
                    "giveaway reached its limit of {} entries",
                    max.unwrap_or_default()
                )),
                None => StoreError::Conflict(format!(
                    "giveaway {} is no longer approved",
                    entry.giveaway_id
                )),
            });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_entry(
        &self,
        giveaway_id: ContentId,
        user_id: &str,
    ) -> Result<Option<GiveawayEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM giveaway_entries WHERE giveaway_id = $1 AND user_id = $2",
        )
        .bind(giveaway_id.get())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(decode_entry).transpose()?)
    }

    async fn entries(
        &self,
        giveaway_id: ContentId,
        limit: i64,
    ) -> Result<Vec<GiveawayEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM giveaway_entries WHERE giveaway_id = $1 \
             ORDER BY entered_at ASC, id ASC LIMIT $2",
        )
        .bind(giveaway_id.get())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode_entry(row).map_err(StoreError::from))
            .collect()
    }

    async fn delete_with_children(
        &self,
        location: Location,
        giveaway_id: ContentId,
    ) -> Result<bool, StoreError> {
        let Some(table) = location_table(ContentKind::Giveaway, location) else {
            return Ok(false);
        };
        let mut tx = self.pool.begin().await?;
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let deleted = sqlx::query(&sql)
            .bind(giveaway_id.get())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }
        for table in ["giveaway_entries", "giveaway_requirements", "giveaway_prizes"] {
            let sql = format!("DELETE FROM {table} WHERE giveaway_id = $1");
            sqlx::query(&sql)
                .bind(giveaway_id.get())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ad, Script};

    #[test]
    fn pending_insert_lists_shared_columns_only() {
        let sql = insert_sql::<Ad>("pending_ads", ReviewState::Pending);
        assert!(sql.starts_with("INSERT INTO pending_ads (id, title, description"));
        assert!(sql.ends_with(
            "submitted_at, admin_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ));
    }

    #[test]
    fn rejected_insert_appends_review_columns() {
        let sql = insert_sql::<Script>("rejected_scripts", ReviewState::Rejected);
        assert!(sql.contains("admin_notes, rejected_at, rejected_by, rejection_reason)"));
        let placeholders = sql.matches('$').count();
        assert_eq!(placeholders, 1 + Script::COLUMNS.len() + 2 + 3);
    }

    #[test]
    fn ads_have_no_legacy_location() {
        assert_eq!(location_table(ContentKind::Ad, Location::Legacy), None);
        assert_eq!(
            location_table(ContentKind::Script, Location::Legacy),
            Some("scripts")
        );
    }
}
