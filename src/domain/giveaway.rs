//! Giveaway child rows (requirements, prizes) and user entries.
//!
//! Children are keyed by the giveaway's id and stay put while the
//! giveaway itself moves between state tables.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::content::Giveaway;
use super::content_id::ContentId;
use super::record::Lookup;
use crate::error::MarketError;

/// A task a user completes to earn points in a giveaway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Requirement {
    /// Requirement id.
    pub id: ContentId,
    /// Owning giveaway.
    pub giveaway_id: ContentId,
    /// Task type (`discord`, `youtube`, `visit`, ...).
    pub kind: String,
    /// Instructions shown to users.
    pub description: String,
    /// Points awarded on completion.
    pub points: i32,
    /// Entry is refused unless this task is completed.
    pub required: bool,
    /// External link for the task.
    pub link: Option<String>,
}

/// Requirement as supplied with a giveaway submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct NewRequirement {
    /// Task type.
    pub kind: String,
    /// Instructions shown to users.
    pub description: String,
    /// Points awarded on completion.
    #[serde(default = "default_points")]
    pub points: i32,
    /// Entry is refused unless this task is completed.
    #[serde(default)]
    pub required: bool,
    /// External link for the task.
    #[serde(default)]
    pub link: Option<String>,
}

fn default_points() -> i32 {
    1
}

impl NewRequirement {
    /// Attaches ids to the submitted requirement.
    #[must_use]
    pub fn into_requirement(self, id: ContentId, giveaway_id: ContentId) -> Requirement {
        Requirement {
            id,
            giveaway_id,
            kind: self.kind,
            description: self.description,
            points: self.points,
            required: self.required,
            link: self.link,
        }
    }
}

/// A ranked prize of a giveaway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Prize {
    /// Prize id.
    pub id: ContentId,
    /// Owning giveaway.
    pub giveaway_id: ContentId,
    /// Rank, 1 for the first prize.
    pub position: i32,
    /// Prize name.
    pub name: String,
    /// Optional details.
    pub description: Option<String>,
    /// Advertised value, free text.
    pub value: String,
    /// Filled in once a winner is drawn.
    pub winner_name: Option<String>,
}

/// Prize as supplied with a giveaway submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct NewPrize {
    /// Rank, 1 for the first prize.
    pub position: i32,
    /// Prize name.
    pub name: String,
    /// Optional details.
    #[serde(default)]
    pub description: Option<String>,
    /// Advertised value.
    pub value: String,
}

impl NewPrize {
    /// Attaches ids to the submitted prize.
    #[must_use]
    pub fn into_prize(self, id: ContentId, giveaway_id: ContentId) -> Prize {
        Prize {
            id,
            giveaway_id,
            position: self.position,
            name: self.name,
            description: self.description,
            value: self.value,
            winner_name: None,
        }
    }
}

/// Everything a creator sends to open a giveaway.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GiveawaySubmission {
    /// Giveaway fields.
    #[serde(flatten)]
    pub giveaway: Giveaway,
    /// Tasks users complete.
    #[serde(default)]
    pub requirements: Vec<NewRequirement>,
    /// Ranked prizes.
    #[serde(default)]
    pub prizes: Vec<NewPrize>,
}

impl GiveawaySubmission {
    /// Checks the child rows. Giveaway fields are checked separately.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] on a blank description,
    /// negative points, a non-positive or repeated prize position, or a
    /// blank prize name.
    pub fn validate_children(&self) -> Result<(), MarketError> {
        for requirement in &self.requirements {
            if requirement.description.trim().is_empty() {
                return Err(MarketError::InvalidRequest(
                    "requirement description must not be empty".to_string(),
                ));
            }
            if requirement.points < 0 {
                return Err(MarketError::InvalidRequest(format!(
                    "requirement points must not be negative, got {}",
                    requirement.points
                )));
            }
        }
        let mut positions = HashSet::new();
        for prize in &self.prizes {
            if prize.position <= 0 || !positions.insert(prize.position) {
                return Err(MarketError::InvalidRequest(format!(
                    "prize positions must be positive and unique, got {}",
                    prize.position
                )));
            }
            if prize.name.trim().is_empty() {
                return Err(MarketError::InvalidRequest(
                    "prize name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A user's participation in one giveaway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GiveawayEntry {
    /// Entry id.
    pub id: ContentId,
    /// Entered giveaway.
    pub giveaway_id: ContentId,
    /// Participating user.
    pub user_id: String,
    /// User display name.
    pub user_name: String,
    /// User contact address.
    pub user_email: Option<String>,
    /// When the entry was recorded.
    pub entered_at: DateTime<Utc>,
    /// Sum of points of the completed requirements.
    pub points_earned: i32,
    /// Requirements the user completed.
    pub completed_requirements: Vec<ContentId>,
}

/// What a user sends to enter a giveaway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct EntrySubmission {
    /// Participating user.
    pub user_id: String,
    /// User display name.
    pub user_name: String,
    /// User contact address.
    #[serde(default)]
    pub user_email: Option<String>,
    /// Requirements the user completed.
    #[serde(default)]
    pub completed_requirements: Vec<ContentId>,
}

/// Checks a user's completed tasks and returns the points they earn.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] if a completed id does not
/// belong to the giveaway or a required task is missing.
pub fn score_entry(
    requirements: &[Requirement],
    completed: &[ContentId],
) -> Result<i32, MarketError> {
    let done: HashSet<ContentId> = completed.iter().copied().collect();
    if let Some(unknown) = done
        .iter()
        .find(|id| !requirements.iter().any(|r| r.id == **id))
    {
        return Err(MarketError::InvalidRequest(format!(
            "requirement {unknown} does not belong to this giveaway"
        )));
    }
    if let Some(missing) = requirements
        .iter()
        .find(|r| r.required && !done.contains(&r.id))
    {
        return Err(MarketError::InvalidRequest(format!(
            "required task {} ({}) is not completed",
            missing.id, missing.kind
        )));
    }
    Ok(requirements
        .iter()
        .filter(|r| done.contains(&r.id))
        .fold(0_i32, |total, r| total.saturating_add(r.points)))
}

impl Giveaway {
    /// Refuses entries once the giveaway ended or is full.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] when closed.
    pub fn ensure_accepting_entries(&self, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.end_date <= now {
            return Err(MarketError::InvalidRequest(format!(
                "giveaway ended at {}",
                self.end_date.to_rfc3339()
            )));
        }
        if let Some(max) = self.max_entries
            && self.entries_count >= max
        {
            return Err(MarketError::InvalidRequest(format!(
                "giveaway reached its limit of {max} entries"
            )));
        }
        Ok(())
    }
}

/// A giveaway lookup joined with its child rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiveawayDetail {
    /// The giveaway and where it was found.
    #[serde(flatten)]
    pub lookup: Lookup<Giveaway>,
    /// Tasks, ordered by id.
    pub requirements: Vec<Requirement>,
    /// Prizes, ordered by position.
    pub prizes: Vec<Prize>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::content::tests::giveaway;

    fn requirement(id: i64, points: i32, required: bool) -> Requirement {
        Requirement {
            id: ContentId::new(id),
            giveaway_id: ContentId::new(1),
            kind: "discord".to_string(),
            description: "Join the Discord".to_string(),
            points,
            required,
            link: None,
        }
    }

    #[test]
    fn scoring_sums_completed_points() {
        let reqs = [requirement(10, 5, true), requirement(11, 3, false)];
        let points = score_entry(&reqs, &[ContentId::new(10), ContentId::new(11)]);
        assert_eq!(points.ok(), Some(8));
    }

    #[test]
    fn scoring_ignores_duplicate_ids() {
        let reqs = [requirement(10, 5, true)];
        let points = score_entry(&reqs, &[ContentId::new(10), ContentId::new(10)]);
        assert_eq!(points.ok(), Some(5));
    }

    #[test]
    fn scoring_rejects_missing_required_task() {
        let reqs = [requirement(10, 5, true), requirement(11, 3, false)];
        assert!(score_entry(&reqs, &[ContentId::new(11)]).is_err());
    }

    #[test]
    fn scoring_rejects_foreign_requirement() {
        let reqs = [requirement(10, 5, false)];
        assert!(score_entry(&reqs, &[ContentId::new(99)]).is_err());
    }

    #[test]
    fn full_giveaway_refuses_entries() {
        let mut g = giveaway("Pack");
        g.max_entries = Some(2);
        g.entries_count = 2;
        assert!(g.ensure_accepting_entries(Utc::now()).is_err());
        g.entries_count = 1;
        assert!(g.ensure_accepting_entries(Utc::now()).is_ok());
    }

    #[test]
    fn ended_giveaway_refuses_entries() {
        let g = giveaway("Pack");
        assert!(g.ensure_accepting_entries(g.end_date + Duration::seconds(1)).is_err());
    }

    #[test]
    fn submission_rejects_repeated_prize_positions() {
        let json = serde_json::json!({
            "title": "Pack",
            "description": "desc",
            "total_value": "$50",
            "category": "scripts",
            "end_date": (Utc::now() + Duration::days(1)).to_rfc3339(),
            "creator_id": "c1",
            "creator_name": "Creator",
            "prizes": [
                {"position": 1, "name": "Script A", "value": "$25"},
                {"position": 1, "name": "Script B", "value": "$25"}
            ]
        });
        let Ok(submission) = serde_json::from_value::<GiveawaySubmission>(json) else {
            panic!("submission should deserialize");
        };
        assert_eq!(submission.prizes.len(), 2);
        assert!(submission.validate_children().is_err());
    }
}
