//! Data Transfer Objects for REST request/response serialization.
//!
//! Content bodies are the domain types themselves; the types here cover
//! query strings, envelopes and admin requests.

pub mod admin_dto;
pub mod common_dto;
pub mod giveaway_dto;

pub use admin_dto::*;
pub use common_dto::*;
pub use giveaway_dto::*;
