//! Giveaway service: submission with child rows, enriched lookup and
//! user entries.

use std::sync::Arc;

use chrono::Utc;

use super::moderation_service::ModerationService;
use crate::domain::{
    Content, ContentId, ContentKind, EntrySubmission, Giveaway, GiveawayDetail, GiveawayEntry,
    GiveawaySubmission, Location, Lookup, Record, score_entry,
};
use crate::error::MarketError;
use crate::persistence::{GiveawayStore, StoreError};

/// Giveaway-specific operations layered over the generic moderation
/// workflow.
#[derive(Debug)]
pub struct GiveawayService {
    moderation: Arc<ModerationService<Giveaway>>,
    store: Arc<dyn GiveawayStore>,
}

impl GiveawayService {
    /// Creates a new `GiveawayService`.
    #[must_use]
    pub fn new(
        moderation: Arc<ModerationService<Giveaway>>,
        store: Arc<dyn GiveawayStore>,
    ) -> Self {
        Self { moderation, store }
    }

    /// The generic workflow for giveaway rows.
    #[must_use]
    pub fn moderation(&self) -> &Arc<ModerationService<Giveaway>> {
        &self.moderation
    }

    /// Inserts a pending giveaway with its requirements and prizes.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] for invalid fields or a
    /// storage error; nothing is stored then.
    pub async fn submit(
        &self,
        submission: GiveawaySubmission,
    ) -> Result<GiveawayDetail, MarketError> {
        submission.validate_children()?;
        let GiveawaySubmission {
            mut giveaway,
            requirements,
            prizes,
        } = submission;
        giveaway.validate()?;
        giveaway.prepare_submission();

        let ids = self.moderation.ids();
        let record = Record::pending(ids.next_id(), giveaway, Utc::now());
        let requirements: Vec<_> = requirements
            .into_iter()
            .map(|r| r.into_requirement(ids.next_id(), record.id))
            .collect();
        let mut prizes: Vec<_> = prizes
            .into_iter()
            .map(|p| p.into_prize(ids.next_id(), record.id))
            .collect();
        prizes.sort_by_key(|p| p.position);

        self.store.submit(&record, &requirements, &prizes).await?;

        tracing::info!(
            id = %record.id,
            owner = record.content.owner_id(),
            requirements = requirements.len(),
            prizes = prizes.len(),
            "giveaway submitted"
        );
        Ok(GiveawayDetail {
            lookup: Lookup {
                location: Location::Pending,
                record,
            },
            requirements,
            prizes,
        })
    }

    /// Cross-table lookup joined with requirements and prizes.
    ///
    /// # Errors
    ///
    /// Returns a storage error; absence is `Ok(None)`.
    pub async fn detail(&self, id: ContentId) -> Result<Option<GiveawayDetail>, MarketError> {
        let Some(lookup) = self.moderation.lookup(id).await? else {
            return Ok(None);
        };
        let requirements = self.store.requirements(id).await?;
        let prizes = self.store.prizes(id).await?;
        Ok(Some(GiveawayDetail {
            lookup,
            requirements,
            prizes,
        }))
    }

    /// Records a user's entry in an approved giveaway.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] unless the giveaway is approved,
    /// [`MarketError::InvalidRequest`] when it is closed or the completed
    /// tasks are wrong, and [`MarketError::DuplicateEntry`] when the user
    /// already entered.
    pub async fn enter(
        &self,
        giveaway_id: ContentId,
        submission: EntrySubmission,
    ) -> Result<GiveawayEntry, MarketError> {
        if submission.user_id.trim().is_empty() || submission.user_name.trim().is_empty() {
            return Err(MarketError::InvalidRequest(
                "user_id and user_name must not be empty".to_string(),
            ));
        }
        let not_found = || MarketError::NotFound {
            kind: ContentKind::Giveaway,
            id: giveaway_id,
        };
        let found = self.moderation.lookup(giveaway_id).await?.ok_or_else(not_found)?;
        if found.location != Location::Approved {
            return Err(not_found());
        }

        let now = Utc::now();
        found.record.content.ensure_accepting_entries(now)?;
        let requirements = self.store.requirements(giveaway_id).await?;
        let points_earned = score_entry(&requirements, &submission.completed_requirements)?;

        let entry = GiveawayEntry {
            id: self.moderation.ids().next_id(),
            giveaway_id,
            user_id: submission.user_id,
            user_name: submission.user_name,
            user_email: submission.user_email,
            entered_at: now,
            points_earned,
            completed_requirements: submission.completed_requirements,
        };
        match self.store.record_entry(&entry).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => {
                return Err(MarketError::DuplicateEntry {
                    giveaway_id,
                    user_id: entry.user_id,
                });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            giveaway = %giveaway_id,
            user = %entry.user_id,
            points = entry.points_earned,
            "giveaway entry recorded"
        );
        Ok(entry)
    }

    /// A user's entry in a giveaway.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::EntryNotFound`] if the user has not entered.
    pub async fn entry_for_user(
        &self,
        giveaway_id: ContentId,
        user_id: &str,
    ) -> Result<GiveawayEntry, MarketError> {
        self.store
            .find_entry(giveaway_id, user_id)
            .await?
            .ok_or_else(|| MarketError::EntryNotFound {
                giveaway_id,
                user_id: user_id.to_string(),
            })
    }

    /// Entries of a giveaway, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn entries(
        &self,
        giveaway_id: ContentId,
        limit: Option<i64>,
    ) -> Result<Vec<GiveawayEntry>, MarketError> {
        let limit = ModerationService::<Giveaway>::effective_limit(limit);
        Ok(self.store.entries(giveaway_id, limit).await?)
    }

    /// Owner delete of a giveaway together with its child rows.
    ///
    /// # Errors
    ///
    /// Same as [`ModerationService::delete`]. On a storage error neither
    /// the giveaway nor its children are removed.
    pub async fn delete(&self, id: ContentId, owner: &str) -> Result<Location, MarketError> {
        let location = self.moderation.locate_owned(id, owner).await?;
        if !self.store.delete_with_children(location, id).await? {
            return Err(MarketError::Conflict(format!(
                "giveaway {id} moved while being deleted"
            )));
        }

        tracing::info!(%id, location = location.as_str(), "giveaway deleted with children");
        Ok(location)
    }
}
