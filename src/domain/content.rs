//! The three moderated content types and the kind/state vocabulary
//! shared by stores, services and handlers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::MarketError;

/// Which family of tables a content item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A script listed for sale.
    Script,
    /// A community giveaway.
    Giveaway,
    /// An advertisement placement.
    Ad,
}

impl ContentKind {
    /// Singular lowercase name, also stored in the history table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Giveaway => "giveaway",
            Self::Ad => "ad",
        }
    }

    /// Name of the table holding items of this kind in `state`.
    #[must_use]
    pub const fn table(self, state: ReviewState) -> &'static str {
        match (self, state) {
            (Self::Script, ReviewState::Pending) => "pending_scripts",
            (Self::Script, ReviewState::Approved) => "approved_scripts",
            (Self::Script, ReviewState::Rejected) => "rejected_scripts",
            (Self::Giveaway, ReviewState::Pending) => "pending_giveaways",
            (Self::Giveaway, ReviewState::Approved) => "approved_giveaways",
            (Self::Giveaway, ReviewState::Rejected) => "rejected_giveaways",
            (Self::Ad, ReviewState::Pending) => "pending_ads",
            (Self::Ad, ReviewState::Approved) => "approved_ads",
            (Self::Ad, ReviewState::Rejected) => "rejected_ads",
        }
    }

    /// The pre-split unified table, if this kind ever had one.
    #[must_use]
    pub const fn legacy_table(self) -> Option<&'static str> {
        match self {
            Self::Script => Some("scripts"),
            Self::Giveaway => Some("giveaways"),
            Self::Ad => None,
        }
    }

    /// Row cap applied to list queries when the caller gives no limit.
    #[must_use]
    pub const fn default_list_limit(self) -> i64 {
        match self {
            Self::Script | Self::Giveaway => 100,
            Self::Ad => 50,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state, one per state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    /// Submitted, awaiting review.
    Pending,
    /// Visible in public listings.
    Approved,
    /// Refused with a reason.
    Rejected,
}

impl ReviewState {
    /// All states in table-probe order for lookups.
    pub const LOOKUP_ORDER: [Self; 3] = [Self::Approved, Self::Pending, Self::Rejected];

    /// Lowercase name used in the history table and legacy `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses the legacy `status` column. Unknown values read as pending.
    #[must_use]
    pub fn from_legacy_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "approved" | "active" | "published" => Self::Approved,
            "rejected" | "declined" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour common to every moderated content type.
pub trait Content:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Table family of this type.
    const KIND: ContentKind;

    /// Id of the user who submitted the item and may delete it.
    fn owner_id(&self) -> &str;

    /// Checks the fields a creator supplied.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] naming the first bad field.
    fn validate(&self) -> Result<(), MarketError>;

    /// Resets server-maintained fields before the first insert.
    fn prepare_submission(&mut self) {}
}

fn require_text(field: &str, value: &str) -> Result<(), MarketError> {
    if value.trim().is_empty() {
        return Err(MarketError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// A script listed on the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Script {
    /// Listing title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// Current price.
    pub price: f64,
    /// Price before a discount, shown struck through.
    #[serde(default)]
    pub original_price: Option<f64>,
    /// Storefront category.
    pub category: String,
    /// Target framework (ESX, QBCore, standalone, ...).
    #[serde(default)]
    pub framework: Option<String>,
    /// Submitting user.
    pub seller_id: String,
    /// Seller display name.
    pub seller_name: String,
    /// Seller contact address.
    #[serde(default)]
    pub seller_email: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Feature bullet points.
    #[serde(default)]
    pub features: Vec<String>,
    /// Gallery image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Cover image URL.
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Live demo link.
    #[serde(default)]
    pub demo_url: Option<String>,
    /// Documentation link.
    #[serde(default)]
    pub documentation_url: Option<String>,
    /// Release version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Highlighted on the landing page.
    #[serde(default)]
    pub featured: bool,
}

impl Content for Script {
    const KIND: ContentKind = ContentKind::Script;

    fn owner_id(&self) -> &str {
        &self.seller_id
    }

    fn validate(&self) -> Result<(), MarketError> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("category", &self.category)?;
        require_text("seller_id", &self.seller_id)?;
        require_text("seller_name", &self.seller_name)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(MarketError::InvalidRequest(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if let Some(original) = self.original_price
            && (!original.is_finite() || original < 0.0)
        {
            return Err(MarketError::InvalidRequest(format!(
                "original_price must be a non-negative number, got {original}"
            )));
        }
        Ok(())
    }
}

/// A giveaway run by a creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Giveaway {
    /// Giveaway title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// Advertised total prize value, free text (e.g. `"$120"`).
    pub total_value: String,
    /// Storefront category.
    pub category: String,
    /// Entries close at this instant.
    pub end_date: DateTime<Utc>,
    /// Optional cap on the number of entries.
    #[serde(default)]
    pub max_entries: Option<i32>,
    /// Effort label (easy, medium, hard).
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    /// Highlighted on the landing page.
    #[serde(default)]
    pub featured: bool,
    /// Cover image URL.
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Gallery image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Participation rules, one per line.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Submitting user.
    pub creator_id: String,
    /// Creator display name.
    pub creator_name: String,
    /// Creator contact address.
    #[serde(default)]
    pub creator_email: Option<String>,
    /// Number of recorded entries. Maintained by the server.
    #[serde(default)]
    pub entries_count: i32,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

impl Content for Giveaway {
    const KIND: ContentKind = ContentKind::Giveaway;

    fn owner_id(&self) -> &str {
        &self.creator_id
    }

    fn validate(&self) -> Result<(), MarketError> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("category", &self.category)?;
        require_text("creator_id", &self.creator_id)?;
        require_text("creator_name", &self.creator_name)?;
        if self.end_date <= Utc::now() {
            return Err(MarketError::InvalidRequest(
                "end_date must be in the future".to_string(),
            ));
        }
        if let Some(max) = self.max_entries
            && max <= 0
        {
            return Err(MarketError::InvalidRequest(format!(
                "max_entries must be positive, got {max}"
            )));
        }
        Ok(())
    }

    fn prepare_submission(&mut self) {
        self.entries_count = 0;
    }
}

/// A paid advertisement placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ad {
    /// Headline.
    pub title: String,
    /// Body copy.
    pub description: String,
    /// Banner image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Click-through target.
    pub link_url: String,
    /// Storefront category the ad targets.
    pub category: String,
    /// Slot on the page (sidebar, banner, ...).
    #[serde(default = "default_placement")]
    pub placement: String,
    /// Higher values are shown first.
    #[serde(default)]
    pub priority: i32,
    /// Submitting user.
    pub creator_id: String,
    /// Creator display name.
    pub creator_name: String,
    /// Creator contact address.
    #[serde(default)]
    pub creator_email: Option<String>,
}

fn default_placement() -> String {
    "sidebar".to_string()
}

impl Content for Ad {
    const KIND: ContentKind = ContentKind::Ad;

    fn owner_id(&self) -> &str {
        &self.creator_id
    }

    fn validate(&self) -> Result<(), MarketError> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("link_url", &self.link_url)?;
        require_text("category", &self.category)?;
        require_text("creator_id", &self.creator_id)?;
        require_text("creator_name", &self.creator_name)?;
        Ok(())
    }
}
