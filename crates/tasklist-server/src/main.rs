mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use tasklist_api::auth::{AppState, AppStateInner};
use tasklist_api::password::CredentialHasher;
use tasklist_api::routes;
use tasklist_api::service::RegistrationPolicy;
use tasklist_api::token::TokenService;
use tasklist_cache::{CacheStore, MemoryCache, RedisCache};
use tasklist_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tasklist_server=debug,tasklist_api=debug,tasklist_db=info,\
                 tasklist_cache=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Cache backend
    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisCache::connect(url).await?),
        None => {
            info!("TASKLIST_REDIS_URL not set, using in-process cache");
            let memory = MemoryCache::new();
            tokio::spawn(sweep_expired(memory.clone(), Duration::from_secs(60)));
            Arc::new(memory)
        }
    };

    let token_ttl = chrono::Duration::from_std(config.token_ttl)?;
    let tokens = TokenService::new(&config.jwt_secret, token_ttl)?;

    let state: AppState = Arc::new(AppStateInner::new(
        db,
        cache,
        config.cache_ttl,
        tokens,
        CredentialHasher::new(),
        RegistrationPolicy {
            allow_admin_signup: config.allow_admin_signup,
        },
    )?);

    if let Some((username, password)) = &config.bootstrap_admin {
        if state.users.ensure_admin(username, password).await? {
            info!("Created bootstrap admin '{}'", username);
        }
    }

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tasklist server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn sweep_expired(cache: MemoryCache, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let evicted = cache.evict_expired();
        if evicted > 0 {
            debug!("Evicted {} expired cache entries", evicted);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
