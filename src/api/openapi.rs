//! OpenAPI document for the annotated endpoints.
//!
//! Served at `/api-docs/openapi.json` with Swagger UI at `/swagger-ui`
//! when the `swagger-ui` feature is enabled.

use utoipa::OpenApi;

use super::dto::{DeleteResponse, MigrationReport, ReviewRequest, ReviewStatus, StateFilter};
use super::handlers::{admin, content, giveaways, system};
use crate::domain::{Ad, ContentKind, HistoryEntry, Location, ReviewState, Script};

/// Generated API description.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "script-market",
        description = "Moderation workflow for scripts, giveaways and ads of a FiveM script \
                       storefront."
    ),
    paths(
        system::health_handler,
        content::list_scripts,
        content::submit_script,
        content::get_script,
        content::delete_script,
        content::list_ads,
        content::submit_ad,
        content::get_ad,
        content::delete_ad,
        giveaways::list_giveaways,
        giveaways::submit_giveaway,
        giveaways::get_giveaway,
        giveaways::delete_giveaway,
        giveaways::enter_giveaway,
        giveaways::list_entries,
        admin::list_scripts_for_review,
        admin::review_script,
        admin::script_history,
        admin::list_giveaways_for_review,
        admin::review_giveaway,
        admin::giveaway_history,
        admin::list_ads_for_review,
        admin::review_ad,
        admin::ad_history,
        admin::migrate_legacy,
    ),
    components(schemas(
        Script,
        Ad,
        ContentKind,
        ReviewState,
        Location,
        HistoryEntry,
        ReviewRequest,
        ReviewStatus,
        StateFilter,
        DeleteResponse,
        MigrationReport,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Scripts", description = "Script submission and lookup"),
        (name = "Ads", description = "Ad submission and lookup"),
        (name = "Giveaways", description = "Giveaway submission and entries"),
        (name = "Admin", description = "Moderation and legacy migration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_annotated_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/scripts",
            "/api/scripts/{id}",
            "/api/ads",
            "/api/ads/{id}",
            "/api/giveaways",
            "/api/giveaways/{id}",
            "/api/giveaways/{id}/entries",
            "/api/admin/scripts",
            "/api/admin/scripts/{id}/history",
            "/api/admin/giveaways",
            "/api/admin/giveaways/{id}/history",
            "/api/admin/ads",
            "/api/admin/ads/{id}/history",
            "/api/admin/legacy/migrate",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn every_kind_documents_its_methods() {
        let doc = ApiDoc::openapi();
        for kind in ["scripts", "ads", "giveaways"] {
            let Some(collection) = doc.paths.paths.get(&format!("/api/{kind}")) else {
                panic!("missing /api/{kind}");
            };
            assert!(collection.get.is_some() && collection.post.is_some());

            let Some(item) = doc.paths.paths.get(&format!("/api/{kind}/{{id}}")) else {
                panic!("missing /api/{kind}/{{id}}");
            };
            assert!(item.get.is_some() && item.delete.is_some());

            let Some(admin) = doc.paths.paths.get(&format!("/api/admin/{kind}")) else {
                panic!("missing /api/admin/{kind}");
            };
            assert!(admin.get.is_some() && admin.patch.is_some());
        }
    }

    #[test]
    fn document_serializes_to_json() {
        let json = ApiDoc::openapi().to_json().unwrap_or_default();
        assert!(json.contains("script-market"));
    }
}
