//! Domain layer: content types, moderation records and giveaway children.
//!
//! Every content kind (script, giveaway, ad) lives in one of three state
//! tables at a time. The types here describe those rows and the decisions
//! that move them, independent of any storage backend.

pub mod content;
pub mod content_id;
pub mod giveaway;
pub mod record;

pub use content::{Ad, Content, ContentKind, Giveaway, ReviewState, Script};
pub use content_id::{ContentId, IdGenerator};
pub use giveaway::{
    EntrySubmission, GiveawayDetail, GiveawayEntry, GiveawaySubmission, NewPrize, NewRequirement,
    Prize, Requirement, score_entry,
};
pub use record::{Decision, HistoryEntry, LegacyRecord, Location, Lookup, Record, Review};
