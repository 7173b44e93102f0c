//! script-market server entry point.
//!
//! Loads configuration, opens the selected store and serves the REST API.

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use script_market::api;
use script_market::app_state::AppState;
use script_market::config::{LogFormat, MarketConfig, StorageBackend};
use script_market::persistence::postgres::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MarketConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.storage_backend,
        "starting script-market"
    );

    // Build storage and service layers
    let state = match config.storage_backend {
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(&config)
                .await
                .context("connecting to PostgreSQL")?;
            if config.run_migrations {
                store.migrate().await.context("running migrations")?;
            }
            AppState::postgres(&store, &config)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            AppState::in_memory(&config)
        }
    };

    // Build router
    let app = api::build_router();
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Installs the global subscriber, filtered by `RUST_LOG` (default `info`).
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
    }
}

/// Resolves on Ctrl-C so in-flight requests can finish.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
