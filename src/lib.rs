//! # script-market
//!
//! Moderation workflow and REST API for a FiveM script storefront.
//!
//! Scripts, giveaways and ads are submitted into a pending table,
//! reviewed by an admin, and moved atomically into an approved or a
//! rejected table. Reads can locate an item wherever it currently lives,
//! including the legacy unified tables. Approved giveaways accept one
//! entry per user with a database-side entry counter.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── ModerationService<C> / GiveawayService (service/)
//!     ├── Retry wrapper (service/retry)
//!     │
//!     ├── ContentStore<C> / GiveawayStore (persistence/)
//!     │
//!     └── PostgreSQL (sqlx) or in-memory tables
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
