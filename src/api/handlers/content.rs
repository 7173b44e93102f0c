//! Public content endpoints for scripts and ads.
//!
//! The request handling is generic over the content kind; each kind gets
//! thin documented handlers on top so the OpenAPI document lists every
//! route.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{DeleteResponse, LimitParams, ListResponse, OwnerParams};
use crate::app_state::AppState;
use crate::domain::{Ad, Content, ContentId, ReviewState, Script};
use crate::error::{ErrorResponse, MarketError};
use crate::service::ModerationService;

/// `GET /{kind}`: Approved rows, newest first.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
pub(crate) async fn list_approved<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, MarketError> {
    let rows = service.list(ReviewState::Approved, params.limit).await?;
    Ok(Json(ListResponse::from(rows)))
}

/// `POST /{kind}`: Submit an item for review.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] on invalid fields.
pub(crate) async fn submit<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Json(content): Json<C>,
) -> Result<impl IntoResponse, MarketError> {
    let record = service.submit(content).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /{kind}/{id}`: Find an item in whichever table holds it.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if no table holds `id`.
pub(crate) async fn get_by_id<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Path(id): Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    let found = service
        .lookup(id)
        .await?
        .ok_or(MarketError::NotFound { kind: C::KIND, id })?;
    Ok(Json(found))
}

/// `DELETE /{kind}/{id}?user_id=`: Owner delete.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] or [`MarketError::Forbidden`].
pub(crate) async fn delete<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Path(id): Path<ContentId>,
    Query(owner): Query<OwnerParams>,
) -> Result<impl IntoResponse, MarketError> {
    let deleted_from = service.delete(id, &owner.user_id).await?;
    Ok(Json(DeleteResponse { id, deleted_from }))
}

/// `GET /scripts`: Approved scripts, newest first.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/scripts",
    tag = "Scripts",
    summary = "List approved scripts",
    description = "Returns rows of the approved table, newest approval first. Connection-limit failures are retried with linear backoff before giving up with 503.",
    params(LimitParams),
    responses(
        (status = 200, description = "Approved scripts", body = serde_json::Value),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_scripts(
    service: State<Arc<ModerationService<Script>>>,
    params: Query<LimitParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_approved(service, params).await
}

/// `POST /scripts`: Submit a script for review.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] on invalid fields.
#[utoipa::path(
    post,
    path = "/api/scripts",
    tag = "Scripts",
    summary = "Submit a script",
    description = "Validates the script and stores it in the pending table with a generated id.",
    request_body = Script,
    responses(
        (status = 201, description = "Script queued for review", body = serde_json::Value),
        (status = 400, description = "Invalid script", body = ErrorResponse),
    )
)]
pub async fn submit_script(
    service: State<Arc<ModerationService<Script>>>,
    content: Json<Script>,
) -> Result<impl IntoResponse, MarketError> {
    submit(service, content).await
}

/// `GET /scripts/{id}`: Find a script in whichever table holds it.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if no table holds `id`.
#[utoipa::path(
    get,
    path = "/api/scripts/{id}",
    tag = "Scripts",
    summary = "Get script",
    description = "Probes the approved, pending and rejected tables, then the legacy scripts table, in that order, and reports where the row was found.",
    params(("id" = i64, Path, description = "Script id")),
    responses(
        (status = 200, description = "Script found", body = serde_json::Value),
        (status = 404, description = "Script not found", body = ErrorResponse),
    )
)]
pub async fn get_script(
    service: State<Arc<ModerationService<Script>>>,
    id: Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    get_by_id(service, id).await
}

/// `DELETE /scripts/{id}?user_id=`: Owner delete.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] or [`MarketError::Forbidden`].
#[utoipa::path(
    delete,
    path = "/api/scripts/{id}",
    tag = "Scripts",
    summary = "Delete script",
    description = "Deletes the script from whichever table holds it when `user_id` is its owner.",
    params(("id" = i64, Path, description = "Script id"), OwnerParams),
    responses(
        (status = 200, description = "Script deleted", body = DeleteResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Script not found", body = ErrorResponse),
    )
)]
pub async fn delete_script(
    service: State<Arc<ModerationService<Script>>>,
    id: Path<ContentId>,
    owner: Query<OwnerParams>,
) -> Result<impl IntoResponse, MarketError> {
    delete(service, id, owner).await
}

/// `GET /ads`: Approved ads, newest first.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/ads",
    tag = "Ads",
    summary = "List approved ads",
    description = "Returns rows of the approved table, newest approval first. Connection-limit failures are retried with linear backoff before giving up with 503.",
    params(LimitParams),
    responses(
        (status = 200, description = "Approved ads", body = serde_json::Value),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_ads(
    service: State<Arc<ModerationService<Ad>>>,
    params: Query<LimitParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_approved(service, params).await
}

/// `POST /ads`: Submit an ad for review.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] on invalid fields.
#[utoipa::path(
    post,
    path = "/api/ads",
    tag = "Ads",
    summary = "Submit an ad",
    description = "Validates the ad and stores it in the pending table with a generated id.",
    request_body = Ad,
    responses(
        (status = 201, description = "Ad queued for review", body = serde_json::Value),
        (status = 400, description = "Invalid ad", body = ErrorResponse),
    )
)]
pub async fn submit_ad(
    service: State<Arc<ModerationService<Ad>>>,
    content: Json<Ad>,
) -> Result<impl IntoResponse, MarketError> {
    submit(service, content).await
}

/// `GET /ads/{id}`: Find an ad in whichever table holds it.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if no table holds `id`.
#[utoipa::path(
    get,
    path = "/api/ads/{id}",
    tag = "Ads",
    summary = "Get ad",
    description = "Probes the approved, pending and rejected tables, in that order, and reports where the row was found.",
    params(("id" = i64, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Ad found", body = serde_json::Value),
        (status = 404, description = "Ad not found", body = ErrorResponse),
    )
)]
pub async fn get_ad(
    service: State<Arc<ModerationService<Ad>>>,
    id: Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    get_by_id(service, id).await
}

/// `DELETE /ads/{id}?user_id=`: Owner delete.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] or [`MarketError::Forbidden`].
#[utoipa::path(
    delete,
    path = "/api/ads/{id}",
    tag = "Ads",
    summary = "Delete ad",
    description = "Deletes the ad from whichever table holds it when `user_id` is its owner.",
    params(("id" = i64, Path, description = "Ad id"), OwnerParams),
    responses(
        (status = 200, description = "Ad deleted", body = DeleteResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Ad not found", body = ErrorResponse),
    )
)]
pub async fn delete_ad(
    service: State<Arc<ModerationService<Ad>>>,
    id: Path<ContentId>,
    owner: Query<OwnerParams>,
) -> Result<impl IntoResponse, MarketError> {
    delete(service, id, owner).await
}

/// Script and ad routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scripts", get(list_scripts).post(submit_script))
        .route("/scripts/{id}", get(get_script).delete(delete_script))
        .route("/ads", get(list_ads).post(submit_ad))
        .route("/ads/{id}", get(get_ad).delete(delete_ad))
}
