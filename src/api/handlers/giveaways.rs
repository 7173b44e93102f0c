//! Giveaway endpoints: submission with children, enriched lookup,
//! owner delete and entries.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use super::content::list_approved;
use crate::api::dto::{DeleteResponse, EntryQuery, LimitParams, ListResponse, OwnerParams};
use crate::app_state::AppState;
use crate::domain::{
    ContentId, ContentKind, EntrySubmission, Giveaway, GiveawayEntry, GiveawaySubmission,
};
use crate::error::{ErrorResponse, MarketError};
use crate::service::{GiveawayService, ModerationService};

/// `GET /giveaways`: Approved giveaways, newest first.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/giveaways",
    tag = "Giveaways",
    summary = "List approved giveaways",
    description = "Returns rows of the approved table, newest approval first. Connection-limit failures are retried with linear backoff before giving up with 503.",
    params(LimitParams),
    responses(
        (status = 200, description = "Approved giveaways", body = serde_json::Value),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_giveaways(
    service: State<Arc<ModerationService<Giveaway>>>,
    params: Query<LimitParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_approved(service, params).await
}

/// `POST /giveaways`: Submit a giveaway with requirements and prizes.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] on invalid fields.
#[utoipa::path(
    post,
    path = "/api/giveaways",
    tag = "Giveaways",
    summary = "Submit a giveaway",
    description = "Stores the giveaway in the pending table together with its requirements and prizes. The entry counter always starts at zero.",
    request_body = GiveawaySubmission,
    responses(
        (status = 201, description = "Giveaway queued for review"),
        (status = 400, description = "Invalid giveaway", body = ErrorResponse),
    )
)]
pub async fn submit_giveaway(
    State(service): State<Arc<GiveawayService>>,
    Json(submission): Json<GiveawaySubmission>,
) -> Result<impl IntoResponse, MarketError> {
    let detail = service.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /giveaways/{id}`: Giveaway with requirements and prizes.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if no table holds `id`.
#[utoipa::path(
    get,
    path = "/api/giveaways/{id}",
    tag = "Giveaways",
    summary = "Get giveaway",
    description = "Looks the giveaway up in the approved, pending, rejected and legacy tables, in that order, and joins its requirements and prizes.",
    params(("id" = i64, Path, description = "Giveaway id")),
    responses(
        (status = 200, description = "Giveaway found"),
        (status = 404, description = "Giveaway not found", body = ErrorResponse),
    )
)]
pub async fn get_giveaway(
    State(service): State<Arc<GiveawayService>>,
    Path(id): Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    let detail = service.detail(id).await?.ok_or(MarketError::NotFound {
        kind: ContentKind::Giveaway,
        id,
    })?;
    Ok(Json(detail))
}

/// `DELETE /giveaways/{id}?user_id=`: Owner delete, purging entries.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] or [`MarketError::Forbidden`].
#[utoipa::path(
    delete,
    path = "/api/giveaways/{id}",
    tag = "Giveaways",
    summary = "Delete giveaway",
    description = "Deletes the giveaway from whichever table holds it, together with its requirements, prizes and entries, when `user_id` is its creator.",
    params(("id" = i64, Path, description = "Giveaway id"), OwnerParams),
    responses(
        (status = 200, description = "Giveaway deleted", body = DeleteResponse),
        (status = 403, description = "Caller is not the creator", body = ErrorResponse),
        (status = 404, description = "Giveaway not found", body = ErrorResponse),
    )
)]
pub async fn delete_giveaway(
    State(service): State<Arc<GiveawayService>>,
    Path(id): Path<ContentId>,
    Query(owner): Query<OwnerParams>,
) -> Result<impl IntoResponse, MarketError> {
    let deleted_from = service.delete(id, &owner.user_id).await?;
    Ok(Json(DeleteResponse { id, deleted_from }))
}

/// `POST /giveaways/{id}/entries`: Enter an approved giveaway.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`], [`MarketError::InvalidRequest`] or
/// [`MarketError::DuplicateEntry`].
#[utoipa::path(
    post,
    path = "/api/giveaways/{id}/entries",
    tag = "Giveaways",
    summary = "Enter giveaway",
    description = "Records one entry per user and increments the giveaway's entry counter in the same transaction.",
    params(("id" = i64, Path, description = "Giveaway id")),
    request_body = EntrySubmission,
    responses(
        (status = 201, description = "Entry recorded", body = GiveawayEntry),
        (status = 400, description = "Giveaway closed or tasks incomplete", body = ErrorResponse),
        (status = 404, description = "No approved giveaway with this id", body = ErrorResponse),
        (status = 409, description = "User already entered", body = ErrorResponse),
    )
)]
pub async fn enter_giveaway(
    State(service): State<Arc<GiveawayService>>,
    Path(id): Path<ContentId>,
    Json(submission): Json<EntrySubmission>,
) -> Result<impl IntoResponse, MarketError> {
    let entry = service.enter(id, submission).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /giveaways/{id}/entries`: All entries, or one user's entry.
///
/// # Errors
///
/// Returns [`MarketError::EntryNotFound`] when `user_id` has no entry.
#[utoipa::path(
    get,
    path = "/api/giveaways/{id}/entries",
    tag = "Giveaways",
    summary = "List entries",
    description = "Returns entries oldest first. With `user_id`, returns that user's entry alone.",
    params(("id" = i64, Path, description = "Giveaway id"), EntryQuery),
    responses(
        (status = 200, description = "Entries or a single entry"),
        (status = 404, description = "User has no entry", body = ErrorResponse),
    )
)]
pub async fn list_entries(
    State(service): State<Arc<GiveawayService>>,
    Path(id): Path<ContentId>,
    Query(query): Query<EntryQuery>,
) -> Result<Response, MarketError> {
    if let Some(user_id) = query.user_id {
        let entry = service.entry_for_user(id, &user_id).await?;
        return Ok(Json(entry).into_response());
    }
    let entries = service.entries(id, query.limit).await?;
    Ok(Json(ListResponse::from(entries)).into_response())
}

/// Giveaway routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/giveaways",
            get(list_giveaways).post(submit_giveaway),
        )
        .route(
            "/giveaways/{id}",
            get(get_giveaway).delete(delete_giveaway),
        )
        .route(
            "/giveaways/{id}/entries",
            get(list_entries).post(enter_giveaway),
        )
}
