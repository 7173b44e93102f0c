//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::MarketConfig;
use crate::domain::{Ad, ContentKind, Giveaway, IdGenerator, Script};
use crate::persistence::memory::{MemoryGiveawayStore, MemoryStore};
use crate::persistence::postgres::PostgresStore;
use crate::persistence::{ContentStore, GiveawayStore};
use crate::service::{GiveawayService, ModerationService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Handlers generic over the content kind extract
/// `State<Arc<ModerationService<C>>>` through the [`FromRef`] impls.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Script workflow.
    pub scripts: Arc<ModerationService<Script>>,
    /// Giveaway workflow, children and entries.
    pub giveaways: Arc<GiveawayService>,
    /// Ad workflow.
    pub ads: Arc<ModerationService<Ad>>,
}

impl AppState {
    /// Wires services over the given stores. All kinds share one id
    /// generator.
    #[must_use]
    pub fn from_stores(
        scripts: Arc<dyn ContentStore<Script>>,
        giveaways: Arc<dyn ContentStore<Giveaway>>,
        giveaway_children: Arc<dyn GiveawayStore>,
        ads: Arc<dyn ContentStore<Ad>>,
        config: &MarketConfig,
    ) -> Self {
        let ids = Arc::new(IdGenerator::new());
        let giveaway_moderation = Arc::new(ModerationService::new(
            giveaways,
            Arc::clone(&ids),
            config.retry_policy(ContentKind::Giveaway),
        ));
        Self {
            scripts: Arc::new(ModerationService::new(
                scripts,
                Arc::clone(&ids),
                config.retry_policy(ContentKind::Script),
            )),
            giveaways: Arc::new(GiveawayService::new(giveaway_moderation, giveaway_children)),
            ads: Arc::new(ModerationService::new(
                ads,
                ids,
                config.retry_policy(ContentKind::Ad),
            )),
        }
    }

    /// State over PostgreSQL tables.
    #[must_use]
    pub fn postgres(store: &PostgresStore, config: &MarketConfig) -> Self {
        Self::from_stores(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            config,
        )
    }

    /// State over process memory.
    #[must_use]
    pub fn in_memory(config: &MarketConfig) -> Self {
        let giveaways = Arc::new(MemoryStore::<Giveaway>::new());
        Self::from_stores(
            Arc::new(MemoryStore::<Script>::new()),
            Arc::clone(&giveaways) as Arc<dyn ContentStore<Giveaway>>,
            Arc::new(MemoryGiveawayStore::new(giveaways)),
            Arc::new(MemoryStore::<Ad>::new()),
            config,
        )
    }
}

impl FromRef<AppState> for Arc<ModerationService<Script>> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.scripts)
    }
}

impl FromRef<AppState> for Arc<ModerationService<Giveaway>> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(state.giveaways.moderation())
    }
}

impl FromRef<AppState> for Arc<ModerationService<Ad>> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.ads)
    }
}

impl FromRef<AppState> for Arc<GiveawayService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.giveaways)
    }
}
