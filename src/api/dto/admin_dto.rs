//! Admin review DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ContentId, Decision, ReviewState};
use crate::error::MarketError;

/// Which state table(s) an admin listing reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    /// Awaiting review.
    #[default]
    Pending,
    /// Approved rows.
    Approved,
    /// Rejected rows.
    Rejected,
    /// All three tables merged.
    All,
}

impl StateFilter {
    /// The single table to read, or `None` for all of them.
    #[must_use]
    pub const fn state(self) -> Option<ReviewState> {
        match self {
            Self::Pending => Some(ReviewState::Pending),
            Self::Approved => Some(ReviewState::Approved),
            Self::Rejected => Some(ReviewState::Rejected),
            Self::All => None,
        }
    }
}

/// Query parameters of `GET /api/admin/{kind}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminListParams {
    /// State table to list. Defaults to `pending`.
    #[serde(default)]
    pub state: StateFilter,
    /// Maximum number of rows returned.
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Reviewer verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Publish the item.
    Approved,
    /// Refuse the item; a reason is required.
    Rejected,
}

/// Body of `PATCH /api/admin/{kind}`.
///
/// The id is accepted under the generic `id` key or the per-kind
/// `scriptId` / `giveawayId` / `adId` keys older clients send.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// Pending row to review.
    #[serde(alias = "scriptId", alias = "giveawayId", alias = "adId")]
    pub id: ContentId,
    /// Verdict.
    pub status: ReviewStatus,
    /// Rejection reason; required when rejecting.
    #[serde(default, alias = "rejectionReason", alias = "rejection_reason")]
    pub reason: Option<String>,
    /// Id of the admin making the decision.
    #[serde(alias = "reviewedBy", alias = "reviewed_by")]
    pub reviewer: String,
    /// Free-form note kept with the row.
    #[serde(default, alias = "adminNotes")]
    pub admin_notes: Option<String>,
}

impl ReviewRequest {
    /// Splits the request into the target id and a validated decision.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] for a blank reviewer or a
    /// rejection without a reason.
    pub fn into_decision(self) -> Result<(ContentId, Decision), MarketError> {
        let decision = match self.status {
            ReviewStatus::Approved => Decision::approve(&self.reviewer, self.admin_notes)?,
            ReviewStatus::Rejected => Decision::reject(
                &self.reviewer,
                self.reason.as_deref().unwrap_or_default(),
                self.admin_notes,
            )?,
        };
        Ok((self.id, decision))
    }
}

/// Rows moved out of the legacy tables by one migration call.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MigrationReport {
    /// Script rows moved.
    pub scripts: usize,
    /// Giveaway rows moved.
    pub giveaways: usize,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn legacy_id_keys_are_accepted() {
        for key in ["id", "scriptId", "giveawayId", "adId"] {
            let body = format!(r#"{{"{key}": 7, "status": "approved", "reviewer": "admin-1"}}"#);
            let Ok(req) = serde_json::from_str::<ReviewRequest>(&body) else {
                panic!("{key} should deserialize");
            };
            assert_eq!(req.id, ContentId::new(7));
        }
    }

    #[test]
    fn rejection_without_reason_is_invalid() {
        let body = r#"{"id": 7, "status": "rejected", "reviewer": "admin-1"}"#;
        let Ok(req) = serde_json::from_str::<ReviewRequest>(body) else {
            panic!("body deserializes");
        };
        assert!(matches!(req.into_decision(), Err(MarketError::InvalidRequest(_))));
    }

    #[test]
    fn rejection_carries_reason_and_notes() {
        let body = r#"{"id": 7, "status": "rejected", "reason": "missing screenshots",
                       "reviewer": "admin-1", "adminNotes": "resubmit"}"#;
        let Ok(req) = serde_json::from_str::<ReviewRequest>(body) else {
            panic!("body deserializes");
        };
        let Ok((id, decision)) = req.into_decision() else {
            panic!("valid decision");
        };
        assert_eq!(id, ContentId::new(7));
        assert_eq!(decision.target(), ReviewState::Rejected);
        assert_eq!(decision.reason(), Some("missing screenshots"));
        assert_eq!(decision.notes(), Some("resubmit"));
    }

    #[test]
    fn state_filter_defaults_to_pending() {
        assert_eq!(StateFilter::default().state(), Some(ReviewState::Pending));
        assert_eq!(StateFilter::All.state(), None);
    }
}
