//! Moderation records: a content item plus the metadata of the state
//! table currently holding it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::content::{Content, ContentKind, ReviewState};
use super::content_id::ContentId;
use crate::error::MarketError;

/// Reviewer recorded for rows imported from a legacy unified table.
pub const LEGACY_REVIEWER: &str = "legacy-import";

/// Rejection reason recorded when a legacy rejected row carried none.
pub const MISSING_REASON: &str = "no reason recorded";

/// State-specific columns of a record.
///
/// Serialized inline with a `status` tag, so a record reads as one flat
/// JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Review {
    /// Row lives in the pending table.
    Pending,
    /// Row lives in the approved table.
    Approved {
        /// Instant of approval.
        approved_at: DateTime<Utc>,
        /// Reviewer who approved.
        approved_by: String,
    },
    /// Row lives in the rejected table.
    Rejected {
        /// Instant of rejection.
        rejected_at: DateTime<Utc>,
        /// Reviewer who rejected.
        rejected_by: String,
        /// Non-empty reason shown to the creator.
        rejection_reason: String,
    },
}

impl Review {
    /// The state table this review places a row in.
    #[must_use]
    pub const fn state(&self) -> ReviewState {
        match self {
            Self::Pending => ReviewState::Pending,
            Self::Approved { .. } => ReviewState::Approved,
            Self::Rejected { .. } => ReviewState::Rejected,
        }
    }

    /// Timestamp the state table sorts by, `None` for pending rows.
    #[must_use]
    pub const fn decided_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Approved { approved_at, .. } => Some(*approved_at),
            Self::Rejected { rejected_at, .. } => Some(*rejected_at),
        }
    }
}

/// One row of a state table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<C> {
    /// Identity shared across the state tables.
    pub id: ContentId,
    /// Creator-supplied fields.
    #[serde(flatten)]
    pub content: C,
    /// When the creator submitted the item.
    pub submitted_at: DateTime<Utc>,
    /// State-specific metadata.
    #[serde(flatten)]
    pub review: Review,
    /// Free-form notes left by a reviewer.
    pub admin_notes: Option<String>,
}

impl<C: Content> Record<C> {
    /// A freshly submitted pending row.
    #[must_use]
    pub fn pending(id: ContentId, content: C, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content,
            submitted_at,
            review: Review::Pending,
            admin_notes: None,
        }
    }

    /// The state table holding this row.
    #[must_use]
    pub const fn state(&self) -> ReviewState {
        self.review.state()
    }

    /// Sort key for newest-first listings.
    #[must_use]
    pub fn listed_at(&self) -> DateTime<Utc> {
        self.review.decided_at().unwrap_or(self.submitted_at)
    }

    /// Builds the destination row for `decision`, copying every field.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Conflict`] if the row is not pending.
    pub fn decide(self, decision: &Decision, at: DateTime<Utc>) -> Result<Self, MarketError> {
        if self.state() != ReviewState::Pending {
            return Err(MarketError::Conflict(format!(
                "{} {} is already {}",
                C::KIND,
                self.id,
                self.state()
            )));
        }
        let review = match decision {
            Decision::Approve { reviewer, .. } => Review::Approved {
                approved_at: at,
                approved_by: reviewer.clone(),
            },
            Decision::Reject {
                reviewer, reason, ..
            } => Review::Rejected {
                rejected_at: at,
                rejected_by: reviewer.clone(),
                rejection_reason: reason.clone(),
            },
        };
        let Self {
            id,
            content,
            submitted_at,
            admin_notes,
            ..
        } = self;
        Ok(Self {
            id,
            content,
            submitted_at,
            review,
            admin_notes: decision.notes().map(str::to_string).or(admin_notes),
        })
    }
}

/// A reviewer's verdict on a pending row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Move to the approved table.
    Approve {
        /// Acting reviewer.
        reviewer: String,
        /// Optional note.
        notes: Option<String>,
    },
    /// Move to the rejected table.
    Reject {
        /// Acting reviewer.
        reviewer: String,
        /// Mandatory, non-empty reason.
        reason: String,
        /// Optional note.
        notes: Option<String>,
    },
}

impl Decision {
    /// An approval by `reviewer`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] if `reviewer` is blank.
    pub fn approve(reviewer: &str, notes: Option<String>) -> Result<Self, MarketError> {
        Ok(Self::Approve {
            reviewer: non_blank("reviewer", reviewer)?,
            notes: normalize_notes(notes),
        })
    }

    /// A rejection by `reviewer` for `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] if `reviewer` or `reason`
    /// is blank.
    pub fn reject(
        reviewer: &str,
        reason: &str,
        notes: Option<String>,
    ) -> Result<Self, MarketError> {
        Ok(Self::Reject {
            reviewer: non_blank("reviewer", reviewer)?,
            reason: non_blank("rejection reason", reason)?,
            notes: normalize_notes(notes),
        })
    }

    /// Destination state.
    #[must_use]
    pub const fn target(&self) -> ReviewState {
        match self {
            Self::Approve { .. } => ReviewState::Approved,
            Self::Reject { .. } => ReviewState::Rejected,
        }
    }

    /// Acting reviewer.
    #[must_use]
    pub fn reviewer(&self) -> &str {
        match self {
            Self::Approve { reviewer, .. } | Self::Reject { reviewer, .. } => reviewer,
        }
    }

    /// Rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Approve { .. } => None,
            Self::Reject { reason, .. } => Some(reason),
        }
    }

    /// Reviewer note, if any.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        match self {
            Self::Approve { notes, .. } | Self::Reject { notes, .. } => notes.as_deref(),
        }
    }
}

fn non_blank(field: &str, value: &str) -> Result<String, MarketError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MarketError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Where a lookup found a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Pending table.
    Pending,
    /// Approved table.
    Approved,
    /// Rejected table.
    Rejected,
    /// Pre-split unified table.
    Legacy,
}

impl Location {
    /// Lowercase name stored in the history table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Legacy => "legacy",
        }
    }

    /// Parses a stored history value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "legacy" => Some(Self::Legacy),
            _ => None,
        }
    }
}

impl From<ReviewState> for Location {
    fn from(state: ReviewState) -> Self {
        match state {
            ReviewState::Pending => Self::Pending,
            ReviewState::Approved => Self::Approved,
            ReviewState::Rejected => Self::Rejected,
        }
    }
}

/// Result of a cross-table lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup<C> {
    /// Table the row was found in.
    pub location: Location,
    /// The row, with legacy rows presented in state-table form.
    #[serde(flatten)]
    pub record: Record<C>,
}

/// A row of a pre-split unified table.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord<C> {
    /// Row id.
    pub id: ContentId,
    /// Creator-supplied fields.
    pub content: C,
    /// Free-text status column.
    pub status: String,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification, used as the decision time.
    pub updated_at: DateTime<Utc>,
    /// Rejection reason, when the legacy row has one.
    pub rejection_reason: Option<String>,
    /// Reviewer notes.
    pub admin_notes: Option<String>,
}

impl<C: Content> LegacyRecord<C> {
    /// The state table the legacy `status` maps to.
    #[must_use]
    pub fn state(&self) -> ReviewState {
        ReviewState::from_legacy_status(&self.status)
    }

    /// Presents the legacy row as a state-table record.
    #[must_use]
    pub fn into_record(self) -> Record<C> {
        let review = match self.state() {
            ReviewState::Pending => Review::Pending,
            ReviewState::Approved => Review::Approved {
                approved_at: self.updated_at,
                approved_by: LEGACY_REVIEWER.to_string(),
            },
            ReviewState::Rejected => Review::Rejected {
                rejected_at: self.updated_at,
                rejected_by: LEGACY_REVIEWER.to_string(),
                rejection_reason: self
                    .rejection_reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| MISSING_REASON.to_string()),
            },
        };
        Record {
            id: self.id,
            content: self.content,
            submitted_at: self.created_at,
            review,
            admin_notes: self.admin_notes,
        }
    }
}

/// One audit row of the moderation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HistoryEntry {
    /// Content kind of the moved row.
    pub kind: ContentKind,
    /// Id of the moved row.
    pub content_id: ContentId,
    /// Table the row left.
    pub from: Location,
    /// Table the row entered.
    pub to: ReviewState,
    /// Reviewer, or [`LEGACY_REVIEWER`] for migrations.
    pub actor: String,
    /// Rejection reason, if any.
    pub reason: Option<String>,
    /// When the move was committed.
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Audit row for a reviewer decision on a pending row.
    #[must_use]
    pub fn for_decision(
        kind: ContentKind,
        id: ContentId,
        decision: &Decision,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            content_id: id,
            from: Location::Pending,
            to: decision.target(),
            actor: decision.reviewer().to_string(),
            reason: decision.reason().map(str::to_string),
            recorded_at: at,
        }
    }

    /// Audit row for moving a legacy row into its state table.
    #[must_use]
    pub fn for_migration<C: Content>(record: &Record<C>, at: DateTime<Utc>) -> Self {
        let reason = match &record.review {
            Review::Rejected {
                rejection_reason, ..
            } => Some(rejection_reason.clone()),
            _ => None,
        };
        Self {
            kind: C::KIND,
            content_id: record.id,
            from: Location::Legacy,
            to: record.state(),
            actor: LEGACY_REVIEWER.to_string(),
            reason,
            recorded_at: at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::content::Script;
    use crate::domain::content::tests::script;

    fn pending() -> Record<Script> {
        Record::pending(ContentId::new(7), script("Banking v1", 25.99), Utc::now())
    }

    #[test]
    fn approve_copies_content_and_stamps_reviewer() {
        let Ok(decision) = Decision::approve("admin-1", Some("  looks good ".to_string())) else {
            panic!("valid decision");
        };
        let at = Utc::now();
        let original = pending();
        let Ok(approved) = original.clone().decide(&decision, at) else {
            panic!("pending rows can be decided");
        };
        assert_eq!(approved.id, original.id);
        assert_eq!(approved.content, original.content);
        assert_eq!(approved.submitted_at, original.submitted_at);
        assert_eq!(
            approved.review,
            Review::Approved {
                approved_at: at,
                approved_by: "admin-1".to_string()
            }
        );
        assert_eq!(approved.admin_notes.as_deref(), Some("looks good"));
    }

    #[test]
    fn reject_requires_reason() {
        assert!(Decision::reject("admin-1", "   ", None).is_err());
        assert!(Decision::reject("", "missing screenshots", None).is_err());
        let Ok(decision) = Decision::reject("admin-1", "missing screenshots", None) else {
            panic!("valid decision");
        };
        assert_eq!(decision.target(), ReviewState::Rejected);
        assert_eq!(decision.reason(), Some("missing screenshots"));
    }

    #[test]
    fn decided_rows_cannot_be_decided_again() {
        let Ok(decision) = Decision::approve("admin-1", None) else {
            panic!("valid decision");
        };
        let Ok(approved) = pending().decide(&decision, Utc::now()) else {
            panic!("first decision succeeds");
        };
        let result = approved.decide(&decision, Utc::now());
        assert!(matches!(result, Err(MarketError::Conflict(_))));
    }

    #[test]
    fn record_serializes_flat_with_status_tag() {
        let Ok(decision) = Decision::reject("admin-1", "missing screenshots", None) else {
            panic!("valid decision");
        };
        let Ok(rejected) = pending().decide(&decision, Utc::now()) else {
            panic!("decision succeeds");
        };
        let Ok(json) = serde_json::to_value(&rejected) else {
            panic!("record serializes");
        };
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["rejection_reason"], "missing screenshots");
        assert_eq!(json["title"], "Banking v1");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn legacy_rejected_without_reason_gets_placeholder() {
        let legacy = LegacyRecord {
            id: ContentId::new(3),
            content: script("Old", 5.0),
            status: "rejected".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            rejection_reason: None,
            admin_notes: None,
        };
        let record = legacy.into_record();
        let Review::Rejected {
            rejection_reason,
            rejected_by,
            ..
        } = record.review
        else {
            panic!("expected rejected review");
        };
        assert_eq!(rejection_reason, MISSING_REASON);
        assert_eq!(rejected_by, LEGACY_REVIEWER);
    }

    #[test]
    fn location_round_trips_through_storage_names() {
        for location in [
            Location::Pending,
            Location::Approved,
            Location::Rejected,
            Location::Legacy,
        ] {
            assert_eq!(Location::parse(location.as_str()), Some(location));
        }
        assert_eq!(Location::parse("archived"), None);
    }
}
