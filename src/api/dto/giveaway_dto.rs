//! Giveaway entry DTOs.

use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters of `GET /api/giveaways/{id}/entries`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntryQuery {
    /// Return only this user's entry.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Maximum number of entries returned.
    #[serde(default)]
    pub limit: Option<i64>,
}
