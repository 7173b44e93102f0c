//! Service layer: business logic orchestration.
//!
//! [`ModerationService`] runs the pending → approved / rejected workflow
//! for one content kind over a [`crate::persistence::ContentStore`].
//! [`GiveawayService`] adds child rows and entries on top of the
//! giveaway instance. List queries go through [`retry::with_retry`].

pub mod giveaway_service;
pub mod moderation_service;
pub mod retry;

pub use giveaway_service::GiveawayService;
pub use moderation_service::{MAX_LIST_LIMIT, ModerationService};
pub use retry::RetryPolicy;
