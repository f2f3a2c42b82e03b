use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::auth::{
    admin::{AdminAuthService, NewAdmin},
    credentials::AdvertiserCredentialStore,
    orchestrator::{AuthorizationOrchestrator, OrchestratorSettings},
    refresher,
    session::SessionTokenIssuer,
    state::OAuthStateStore,
};
use crate::cache::{MemoryStateCache, RedisStateCache, StateCache};
use crate::clock::{SystemTimeProvider, TimeProvider};
use crate::config::AppConfig;
use crate::platform::{AdPlatformOAuth, PlatformClient};
use crate::repos::{sqlite::SqliteRepo, AdminUsersRepo};
use crate::security::PasswordPolicy;
use crate::web::handlers;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub admin: Arc<AdminAuthService>,
    pub orchestrator: Arc<AuthorizationOrchestrator>,
}

impl AppState {
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let platform = Arc::new(PlatformClient::new(&config.platform, config.platform_redirect_uri())?);
        Self::assemble(config, platform, Arc::new(SystemTimeProvider)).await
    }

    /// Wires every component from `config`, with the platform client and clock
    /// supplied by the caller.
    pub async fn assemble(
        config: AppConfig,
        platform: Arc<dyn AdPlatformOAuth>,
        clock: Arc<dyn TimeProvider>,
    ) -> anyhow::Result<Self> {
        let pool = crate::db::sqlite::open(&config.db.url)?;
        let repo = SqliteRepo::new(pool);

        let cache: Arc<dyn StateCache> = match config.cache.redis_url.as_deref() {
            Some(url) => Arc::new(RedisStateCache::connect(url).await?),
            None => {
                tracing::warn!("cache.redis_url not set; OAuth state is kept in process memory and not shared across instances");
                Arc::new(MemoryStateCache::new(clock.clone()))
            }
        };
        let states = OAuthStateStore::new(cache, clock.clone(), config.cache.key_namespace.clone());

        let orchestrator = Arc::new(AuthorizationOrchestrator::new(
            states,
            AdvertiserCredentialStore::new(repo.clone()),
            platform,
            clock.clone(),
            OrchestratorSettings::from_cfg(&config.platform),
        ));

        let passwords = PasswordPolicy::new(config.password.cost)?;
        let tokens = SessionTokenIssuer::new(&config.jwt, clock.clone());
        let admin = Arc::new(AdminAuthService::new(repo.clone(), passwords, tokens, clock)?);

        bootstrap_admin(&config, repo.as_ref(), &admin).await?;

        Ok(Self { config, admin, orchestrator })
    }
}

async fn bootstrap_admin(config: &AppConfig, users: &dyn AdminUsersRepo, admin: &AdminAuthService) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (
        config.admin.bootstrap_username.as_deref(),
        config.admin.bootstrap_password.as_deref(),
    ) else {
        return Ok(());
    };
    if users.find_by_username(username).await?.is_some() {
        return Ok(());
    }
    admin
        .create_user(NewAdmin {
            username: username.to_string(),
            password: password.to_string(),
            nickname: username.to_string(),
            role_id: 1,
            role_key: "admin".to_string(),
            data_scope: "all".to_string(),
        })
        .await?;
    tracing::info!(%username, "bootstrap admin created");
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    // logging
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = AppConfig::load()?;
    tracing::info!(?config, "loaded config");

    let state = AppState::from_config(config.clone()).await?;

    if config.refresher.enabled {
        refresher::spawn_token_refresh(
            state.orchestrator.clone(),
            std::time::Duration::from_secs(config.refresher.interval_secs),
            chrono::Duration::minutes(config.refresher.window_minutes),
        );
    }

    let app = build_router(state);

    let addr = config.server.bind_addr.clone();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        .route("/api/v1/auth/password", put(handlers::auth::change_password))
        .route("/api/v1/platform/oauth/url", get(handlers::oauth::auth_url))
        .route("/api/v1/platform/oauth/callback", get(handlers::oauth::callback))
        .route("/api/v1/platform/oauth/refresh", post(handlers::oauth::refresh))
        .route("/api/v1/platform/advertisers/{id}/link", delete(handlers::oauth::unlink))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
