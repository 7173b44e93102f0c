//! Row mapping between the PostgreSQL tables and domain types.
//!
//! Each content type lists its columns once in [`PgContent::COLUMNS`];
//! the generic SQL in [`super::postgres`] is built from that list, so
//! the pending, approved, rejected and legacy tables of a kind share one
//! binding and one decoding routine.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::domain::{
    Ad, Content, ContentId, ContentKind, Giveaway, GiveawayEntry, HistoryEntry, LegacyRecord,
    Location, Prize, Record, Requirement, Review, ReviewState, Script,
};

/// A bindable PostgreSQL statement.
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Content whose fields map onto PostgreSQL columns.
pub trait PgContent: Content {
    /// Content columns, in the order [`PgContent::bind_fields`] binds them.
    const COLUMNS: &'static [&'static str];

    /// Binds every content column, in [`PgContent::COLUMNS`] order.
    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q>;

    /// Reads the content columns of a row.
    ///
    /// # Errors
    ///
    /// Returns the sqlx error of the first missing or mistyped column.
    fn decode(row: &PgRow) -> Result<Self, sqlx::Error>;
}

impl PgContent for Script {
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "price",
        "original_price",
        "category",
        "framework",
        "seller_id",
        "seller_name",
        "seller_email",
        "tags",
        "features",
        "images",
        "cover_image",
        "demo_url",
        "documentation_url",
        "version",
        "featured",
    ];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.title.as_str())
            .bind(self.description.as_str())
            .bind(self.price)
            .bind(self.original_price)
            .bind(self.category.as_str())
            .bind(self.framework.as_deref())
            .bind(self.seller_id.as_str())
            .bind(self.seller_name.as_str())
            .bind(self.seller_email.as_deref())
            .bind(self.tags.as_slice())
            .bind(self.features.as_slice())
            .bind(self.images.as_slice())
            .bind(self.cover_image.as_deref())
            .bind(self.demo_url.as_deref())
            .bind(self.documentation_url.as_deref())
            .bind(self.version.as_deref())
            .bind(self.featured)
    }

    fn decode(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            original_price: row.try_get("original_price")?,
            category: row.try_get("category")?,
            framework: row.try_get("framework")?,
            seller_id: row.try_get("seller_id")?,
            seller_name: row.try_get("seller_name")?,
            seller_email: row.try_get("seller_email")?,
            tags: row.try_get("tags")?,
            features: row.try_get("features")?,
            images: row.try_get("images")?,
            cover_image: row.try_get("cover_image")?,
            demo_url: row.try_get("demo_url")?,
            documentation_url: row.try_get("documentation_url")?,
            version: row.try_get("version")?,
            featured: row.try_get("featured")?,
        })
    }
}

impl PgContent for Giveaway {
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "total_value",
        "category",
        "end_date",
        "max_entries",
        "difficulty",
        "featured",
        "cover_image",
        "images",
        "tags",
        "rules",
        "creator_id",
        "creator_name",
        "creator_email",
        "entries_count",
    ];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.title.as_str())
            .bind(self.description.as_str())
            .bind(self.total_value.as_str())
            .bind(self.category.as_str())
            .bind(self.end_date)
            .bind(self.max_entries)
            .bind(self.difficulty.as_str())
            .bind(self.featured)
            .bind(self.cover_image.as_deref())
            .bind(self.images.as_slice())
            .bind(self.tags.as_slice())
            .bind(self.rules.as_slice())
            .bind(self.creator_id.as_str())
            .bind(self.creator_name.as_str())
            .bind(self.creator_email.as_deref())
            .bind(self.entries_count)
    }

    fn decode(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            total_value: row.try_get("total_value")?,
            category: row.try_get("category")?,
            end_date: row.try_get("end_date")?,
            max_entries: row.try_get("max_entries")?,
            difficulty: row.try_get("difficulty")?,
            featured: row.try_get("featured")?,
            cover_image: row.try_get("cover_image")?,
            images: row.try_get("images")?,
            tags: row.try_get("tags")?,
            rules: row.try_get("rules")?,
            creator_id: row.try_get("creator_id")?,
            creator_name: row.try_get("creator_name")?,
            creator_email: row.try_get("creator_email")?,
            entries_count: row.try_get("entries_count")?,
        })
    }
}

impl PgContent for Ad {
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "image_url",
        "link_url",
        "category",
        "placement",
        "priority",
        "creator_id",
        "creator_name",
        "creator_email",
    ];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.title.as_str())
            .bind(self.description.as_str())
            .bind(self.image_url.as_deref())
            .bind(self.link_url.as_str())
            .bind(self.category.as_str())
            .bind(self.placement.as_str())
            .bind(self.priority)
            .bind(self.creator_id.as_str())
            .bind(self.creator_name.as_str())
            .bind(self.creator_email.as_deref())
    }

    fn decode(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            link_url: row.try_get("link_url")?,
            category: row.try_get("category")?,
            placement: row.try_get("placement")?,
            priority: row.try_get("priority")?,
            creator_id: row.try_get("creator_id")?,
            creator_name: row.try_get("creator_name")?,
            creator_email: row.try_get("creator_email")?,
        })
    }
}

/// State-specific columns appended after the shared ones.
#[must_use]
pub const fn review_columns(state: ReviewState) -> &'static [&'static str] {
    match state {
        ReviewState::Pending => &[],
        ReviewState::Approved => &["approved_at", "approved_by"],
        ReviewState::Rejected => &["rejected_at", "rejected_by", "rejection_reason"],
    }
}

/// Column a state table is listed by, newest first.
#[must_use]
pub const fn order_column(state: ReviewState) -> &'static str {
    match state {
        ReviewState::Pending => "submitted_at",
        ReviewState::Approved => "approved_at",
        ReviewState::Rejected => "rejected_at",
    }
}

/// Binds the state-specific columns of a review.
pub fn bind_review<'q>(review: &'q Review, query: PgQuery<'q>) -> PgQuery<'q> {
    match review {
        Review::Pending => query,
        Review::Approved {
            approved_at,
            approved_by,
        } => query.bind(*approved_at).bind(approved_by.as_str()),
        Review::Rejected {
            rejected_at,
            rejected_by,
            rejection_reason,
        } => query
            .bind(*rejected_at)
            .bind(rejected_by.as_str())
            .bind(rejection_reason.as_str()),
    }
}

/// Reads a full state-table row.
///
/// # Errors
///
/// Returns the sqlx error of the first missing or mistyped column.
pub fn decode_record<C: PgContent>(
    row: &PgRow,
    state: ReviewState,
) -> Result<Record<C>, sqlx::Error> {
    let review = match state {
        ReviewState::Pending => Review::Pending,
        ReviewState::Approved => Review::Approved {
            approved_at: row.try_get("approved_at")?,
            approved_by: row.try_get("approved_by")?,
        },
        ReviewState::Rejected => Review::Rejected {
            rejected_at: row.try_get("rejected_at")?,
            rejected_by: row.try_get("rejected_by")?,
            rejection_reason: row.try_get("rejection_reason")?,
        },
    };
    Ok(Record {
        id: ContentId::new(row.try_get("id")?),
        content: C::decode(row)?,
        submitted_at: row.try_get("submitted_at")?,
        review,
        admin_notes: row.try_get("admin_notes")?,
    })
}

/// Reads a legacy unified-table row.
///
/// # Errors
///
/// Returns the sqlx error of the first missing or mistyped column.
pub fn decode_legacy<C: PgContent>(row: &PgRow) -> Result<LegacyRecord<C>, sqlx::Error> {
    Ok(LegacyRecord {
        id: ContentId::new(row.try_get("id")?),
        content: C::decode(row)?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        rejection_reason: row.try_get("rejection_reason")?,
        admin_notes: row.try_get("admin_notes")?,
    })
}

/// Reads a `giveaway_requirements` row.
///
/// # Errors
///
/// Returns the sqlx error of the first missing or mistyped column.
pub fn decode_requirement(row: &PgRow) -> Result<Requirement, sqlx::Error> {
    Ok(Requirement {
        id: ContentId::new(row.try_get("id")?),
        giveaway_id: ContentId::new(row.try_get("giveaway_id")?),
        kind: row.try_get("kind")?,
        description: row.try_get("description")?,
        points: row.try_get("points")?,
        required: row.try_get("required")?,
        link: row.try_get("link")?,
    })
}

/// Reads a `giveaway_prizes` row.
///
/// # Errors
///
/// Returns the sqlx error of the first missing or mistyped column.
pub fn decode_prize(row: &PgRow) -> Result<Prize, sqlx::Error> {
    Ok(Prize {
        id: ContentId::new(row.try_get("id")?),
        giveaway_id: ContentId::new(row.try_get("giveaway_id")?),
        position: row.try_get("position")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        value: row.try_get("value")?,
        winner_name: row.try_get("winner_name")?,
    })
}

/// Reads a `giveaway_entries` row.
///
/// # Errors
///
/// Returns the sqlx error of the first missing or mistyped column.
pub fn decode_entry(row: &PgRow) -> Result<GiveawayEntry, sqlx::Error> {
    let completed: Vec<i64> = row.try_get("completed_requirements")?;
    Ok(GiveawayEntry {
        id: ContentId::new(row.try_get("id")?),
        giveaway_id: ContentId::new(row.try_get("giveaway_id")?),
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        user_email: row.try_get("user_email")?,
        entered_at: row.try_get("entered_at")?,
        points_earned: row.try_get("points_earned")?,
        completed_requirements: completed.into_iter().map(ContentId::new).collect(),
    })
}

/// Reads a `moderation_history` row.
///
/// # Errors
///
/// Returns a decode error for unknown kind or state names.
pub fn decode_history(row: &PgRow) -> Result<HistoryEntry, sqlx::Error> {
    let kind: String = row.try_get("content_kind")?;
    let from: String = row.try_get("from_state")?;
    let to: String = row.try_get("to_state")?;
    Ok(HistoryEntry {
        kind: parse_kind(&kind)?,
        content_id: ContentId::new(row.try_get("content_id")?),
        from: Location::parse(&from)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown from_state {from}").into()))?,
        to: parse_state(&to)?,
        actor: row.try_get("actor")?,
        reason: row.try_get("reason")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn parse_kind(value: &str) -> Result<ContentKind, sqlx::Error> {
    [ContentKind::Script, ContentKind::Giveaway, ContentKind::Ad]
        .into_iter()
        .find(|kind| kind.as_str() == value)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown content_kind {value}").into()))
}

fn parse_state(value: &str) -> Result<ReviewState, sqlx::Error> {
    [
        ReviewState::Pending,
        ReviewState::Approved,
        ReviewState::Rejected,
    ]
    .into_iter()
    .find(|state| state.as_str() == value)
    .ok_or_else(|| sqlx::Error::Decode(format!("unknown to_state {value}").into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_columns_match_state_tables() {
        assert!(review_columns(ReviewState::Pending).is_empty());
        assert_eq!(review_columns(ReviewState::Approved).len(), 2);
        assert_eq!(review_columns(ReviewState::Rejected).len(), 3);
    }

    #[test]
    fn column_lists_have_no_duplicates() {
        for columns in [Script::COLUMNS, Giveaway::COLUMNS, Ad::COLUMNS] {
            let mut sorted = columns.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), columns.len());
        }
    }

    #[test]
    fn kind_and_state_names_parse_back() {
        assert_eq!(parse_kind("giveaway").ok(), Some(ContentKind::Giveaway));
        assert!(parse_kind("user").is_err());
        assert_eq!(parse_state("rejected").ok(), Some(ReviewState::Rejected));
        assert!(parse_state("legacy").is_err());
    }
}
