//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ContentId, Location};

/// Optional row cap for list endpoints.
///
/// Absent means the per-kind default; values are clamped to `1..=500`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of rows returned.
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Identifies the caller of an owner-only operation.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OwnerParams {
    /// Id of the user who submitted the item.
    pub user_id: String,
}

/// Envelope for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    /// Rows, newest first unless stated otherwise.
    pub data: Vec<T>,
    /// Number of rows in `data`.
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Result of an owner delete.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// Deleted id.
    pub id: ContentId,
    /// Table the row was removed from.
    pub deleted_from: Location,
}
