//! Pitch Pulse binary entrypoint wiring REST, WebSocket, pub/sub and storage layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, http::HeaderValue};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitch_pulse::{
    config::{AppConfig, StoreKind},
    dao::match_store::memory::MemoryMatchStore,
    pubsub::{UpdateBus, memory::MemoryBus},
    routes,
    services::bridge,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let cors = cors_layer(&config.allowed_origins)?;
    let bus = build_bus(&config).await?;

    let app_state = AppState::new(config, bus);
    start_store(&app_state).await?;

    let bridge_task = tokio::spawn(bridge::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state, cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    let served = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum");

    bridge_task.abort();
    info!("server stopped");
    served
}

/// Pick the pub/sub transport: Redis when configured, otherwise the in-process bus.
async fn build_bus(config: &AppConfig) -> anyhow::Result<Arc<dyn UpdateBus>> {
    match config.redis_url.as_deref() {
        None => {
            info!("no redis_url configured; using in-process pub/sub");
            Ok(Arc::new(MemoryBus::default()))
        }
        #[cfg(feature = "redis-bus")]
        Some(url) => {
            let bus = pitch_pulse::pubsub::redis_bus::RedisBus::connect(url)
                .await
                .context("connecting to Redis")?;
            info!("connected to Redis pub/sub");
            Ok(Arc::new(bus))
        }
        #[cfg(not(feature = "redis-bus"))]
        Some(_) => anyhow::bail!("redis_url is set but the `redis-bus` feature is disabled"),
    }
}

/// Install the in-memory store, or start supervising MongoDB in the background.
async fn start_store(state: &SharedState) -> anyhow::Result<()> {
    match state.config().store {
        StoreKind::Memory => {
            info!("using in-memory match store");
            state
                .install_match_store(Arc::new(MemoryMatchStore::new()))
                .await;
            Ok(())
        }
        #[cfg(feature = "mongo-store")]
        StoreKind::Mongo => {
            spawn_mongo_supervisor(state.clone());
            Ok(())
        }
        #[cfg(not(feature = "mongo-store"))]
        StoreKind::Mongo => anyhow::bail!("store is `mongo` but the `mongo-store` feature is disabled"),
    }
}

/// Connects to MongoDB with retries and toggles degraded mode when connectivity changes.
#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) {
    use pitch_pulse::{
        dao::{
            match_store::{
                MatchStore,
                mongodb::{MongoConfig, MongoMatchStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor::{self, SupervisorTiming},
    };

    let uri = state.config().mongo_uri.clone();
    let db_name = state.config().mongo_db.clone();

    tokio::spawn(storage_supervisor::run(
        state,
        SupervisorTiming::default(),
        move || {
            let uri = uri.clone();
            let db_name = db_name.clone();
            async move {
                let config = MongoConfig::from_uri(&uri, Some(&db_name)).await?;
                let store = MongoMatchStore::connect(config).await?;
                let store: Arc<dyn MatchStore> = Arc::new(store);
                Ok::<_, StorageError>(store)
            }
        },
    ));
}

/// CORS allow-list from configuration; an empty list is permissive.
fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin `{origin}`"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState, cors: CorsLayer) -> Router<()> {
    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
