//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod content;
pub mod giveaways;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(content::routes())
        .merge(giveaways::routes())
        .merge(admin::routes())
}
