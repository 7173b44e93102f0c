//! Admin endpoints: review queues, decisions, audit trail and legacy
//! migration.
//!
//! Review handling is generic over the content kind, with documented
//! per-kind handlers on top.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AdminListParams, LimitParams, ListResponse, MigrationReport, ReviewRequest};
use crate::app_state::AppState;
use crate::domain::{Ad, Content, ContentId, Giveaway, Script};
use crate::error::{ErrorResponse, MarketError};
use crate::service::ModerationService;

/// `GET /admin/{kind}?state=`: Rows of one state table, or all three.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
pub(crate) async fn list_for_review<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Query(params): Query<AdminListParams>,
) -> Result<impl IntoResponse, MarketError> {
    let rows = match params.state.state() {
        Some(state) => service.list(state, params.limit).await?,
        None => service.list_all(params.limit).await?,
    };
    Ok(Json(ListResponse::from(rows)))
}

/// `PATCH /admin/{kind}`: Approve or reject a pending row.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for a rejection without a
/// reason and [`MarketError::NotFound`] if the row is not pending.
pub(crate) async fn review<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Json(request): Json<ReviewRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let (id, decision) = request.into_decision()?;
    let record = service.review(id, decision).await?;
    Ok(Json(record))
}

/// `GET /admin/{kind}/{id}/history`: Audit rows, oldest first.
///
/// # Errors
///
/// Returns a persistence error.
pub(crate) async fn history<C: Content>(
    State(service): State<Arc<ModerationService<C>>>,
    Path(id): Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    let entries = service.history(id).await?;
    Ok(Json(ListResponse::from(entries)))
}

/// `GET /admin/scripts?state=`: Script rows awaiting or past review.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/admin/scripts",
    tag = "Admin",
    summary = "List scripts by review state",
    description = "Lists one state table (`pending` by default), or with `state=all` merges pending, approved and rejected rows newest first.",
    params(AdminListParams),
    responses(
        (status = 200, description = "Script rows", body = serde_json::Value),
        (status = 400, description = "Unknown state filter", body = ErrorResponse),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_scripts_for_review(
    service: State<Arc<ModerationService<Script>>>,
    params: Query<AdminListParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_for_review(service, params).await
}

/// `PATCH /admin/scripts`: Approve or reject a pending script.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for a rejection without a
/// reason and [`MarketError::NotFound`] if the script is not pending.
#[utoipa::path(
    patch,
    path = "/api/admin/scripts",
    tag = "Admin",
    summary = "Review a script",
    description = "Moves the pending row to the approved or rejected table in one transaction and appends an audit row. A rejection requires a non-empty reason.",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Reviewed script", body = serde_json::Value),
        (status = 400, description = "Rejection without a reason", body = ErrorResponse),
        (status = 404, description = "No pending script with this id", body = ErrorResponse),
    )
)]
pub async fn review_script(
    service: State<Arc<ModerationService<Script>>>,
    request: Json<ReviewRequest>,
) -> Result<impl IntoResponse, MarketError> {
    review(service, request).await
}

/// `GET /admin/scripts/{id}/history`: Audit trail of a script.
///
/// # Errors
///
/// Returns a persistence error.
#[utoipa::path(
    get,
    path = "/api/admin/scripts/{id}/history",
    tag = "Admin",
    summary = "Script audit trail",
    description = "Returns the recorded decisions and migrations of one script, oldest first.",
    params(("id" = i64, Path, description = "Script id")),
    responses(
        (status = 200, description = "Audit rows, oldest first", body = serde_json::Value),
    )
)]
pub async fn script_history(
    service: State<Arc<ModerationService<Script>>>,
    id: Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    history(service, id).await
}

/// `GET /admin/giveaways?state=`: Giveaway rows awaiting or past review.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/admin/giveaways",
    tag = "Admin",
    summary = "List giveaways by review state",
    description = "Lists one state table (`pending` by default), or with `state=all` merges pending, approved and rejected rows newest first.",
    params(AdminListParams),
    responses(
        (status = 200, description = "Giveaway rows", body = serde_json::Value),
        (status = 400, description = "Unknown state filter", body = ErrorResponse),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_giveaways_for_review(
    service: State<Arc<ModerationService<Giveaway>>>,
    params: Query<AdminListParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_for_review(service, params).await
}

/// `PATCH /admin/giveaways`: Approve or reject a pending giveaway.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for a rejection without a
/// reason and [`MarketError::NotFound`] if the giveaway is not pending.
#[utoipa::path(
    patch,
    path = "/api/admin/giveaways",
    tag = "Admin",
    summary = "Review a giveaway",
    description = "Moves the pending row to the approved or rejected table in one transaction and appends an audit row. A rejection requires a non-empty reason.",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Reviewed giveaway", body = serde_json::Value),
        (status = 400, description = "Rejection without a reason", body = ErrorResponse),
        (status = 404, description = "No pending giveaway with this id", body = ErrorResponse),
    )
)]
pub async fn review_giveaway(
    service: State<Arc<ModerationService<Giveaway>>>,
    request: Json<ReviewRequest>,
) -> Result<impl IntoResponse, MarketError> {
    review(service, request).await
}

/// `GET /admin/giveaways/{id}/history`: Audit trail of a giveaway.
///
/// # Errors
///
/// Returns a persistence error.
#[utoipa::path(
    get,
    path = "/api/admin/giveaways/{id}/history",
    tag = "Admin",
    summary = "Giveaway audit trail",
    description = "Returns the recorded decisions and migrations of one giveaway, oldest first.",
    params(("id" = i64, Path, description = "Giveaway id")),
    responses(
        (status = 200, description = "Audit rows, oldest first", body = serde_json::Value),
    )
)]
pub async fn giveaway_history(
    service: State<Arc<ModerationService<Giveaway>>>,
    id: Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    history(service, id).await
}

/// `GET /admin/ads?state=`: Ad rows awaiting or past review.
///
/// # Errors
///
/// Returns [`MarketError::Unavailable`] when the database stays saturated.
#[utoipa::path(
    get,
    path = "/api/admin/ads",
    tag = "Admin",
    summary = "List ads by review state",
    description = "Lists one state table (`pending` by default), or with `state=all` merges pending, approved and rejected rows newest first.",
    params(AdminListParams),
    responses(
        (status = 200, description = "Ad rows", body = serde_json::Value),
        (status = 400, description = "Unknown state filter", body = ErrorResponse),
        (status = 503, description = "Database saturated", body = ErrorResponse),
    )
)]
pub async fn list_ads_for_review(
    service: State<Arc<ModerationService<Ad>>>,
    params: Query<AdminListParams>,
) -> Result<impl IntoResponse, MarketError> {
    list_for_review(service, params).await
}

/// `PATCH /admin/ads`: Approve or reject a pending ad.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for a rejection without a
/// reason and [`MarketError::NotFound`] if the ad is not pending.
#[utoipa::path(
    patch,
    path = "/api/admin/ads",
    tag = "Admin",
    summary = "Review an ad",
    description = "Moves the pending row to the approved or rejected table in one transaction and appends an audit row. A rejection requires a non-empty reason.",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Reviewed ad", body = serde_json::Value),
        (status = 400, description = "Rejection without a reason", body = ErrorResponse),
        (status = 404, description = "No pending ad with this id", body = ErrorResponse),
    )
)]
pub async fn review_ad(
    service: State<Arc<ModerationService<Ad>>>,
    request: Json<ReviewRequest>,
) -> Result<impl IntoResponse, MarketError> {
    review(service, request).await
}

/// `GET /admin/ads/{id}/history`: Audit trail of an ad.
///
/// # Errors
///
/// Returns a persistence error.
#[utoipa::path(
    get,
    path = "/api/admin/ads/{id}/history",
    tag = "Admin",
    summary = "Ad audit trail",
    description = "Returns the recorded decisions and migrations of one ad, oldest first.",
    params(("id" = i64, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Audit rows, oldest first", body = serde_json::Value),
    )
)]
pub async fn ad_history(
    service: State<Arc<ModerationService<Ad>>>,
    id: Path<ContentId>,
) -> Result<impl IntoResponse, MarketError> {
    history(service, id).await
}

/// `POST /admin/legacy/migrate`: Move legacy rows into the state tables.
///
/// # Errors
///
/// Returns a persistence error; nothing of that kind is moved then.
#[utoipa::path(
    post,
    path = "/api/admin/legacy/migrate",
    tag = "Admin",
    summary = "Migrate legacy rows",
    description = "Moves up to `limit` rows per kind from the legacy scripts and giveaways tables into the state table matching their status, writing one audit row each.",
    params(LimitParams),
    responses(
        (status = 200, description = "Rows moved per kind", body = MigrationReport),
        (status = 500, description = "Migration failed", body = ErrorResponse),
    )
)]
pub async fn migrate_legacy(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, MarketError> {
    let scripts = state.scripts.migrate_legacy(params.limit).await?;
    let giveaways = state
        .giveaways
        .moderation()
        .migrate_legacy(params.limit)
        .await?;
    Ok(Json(MigrationReport {
        scripts: scripts.len(),
        giveaways: giveaways.len(),
    }))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/scripts",
            get(list_scripts_for_review).patch(review_script),
        )
        .route("/admin/scripts/{id}/history", get(script_history))
        .route(
            "/admin/giveaways",
            get(list_giveaways_for_review).patch(review_giveaway),
        )
        .route("/admin/giveaways/{id}/history", get(giveaway_history))
        .route("/admin/ads", get(list_ads_for_review).patch(review_ad))
        .route("/admin/ads/{id}/history", get(ad_history))
        .route("/admin/legacy/migrate", post(migrate_legacy))
}
