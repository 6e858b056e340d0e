//! Heardle Back binary entrypoint wiring the cron routes, media and storage collaborators and the rotation store.

use std::{env, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use axum::Router;
use heardle_back::{
    config::AppConfig,
    dao::{
        assets::{SupabaseStorage, SupabaseStorageConfig},
        media::HttpMediaSource,
        persistence::PersistenceError,
        rotation_store::{RotationStore, memory::MemoryRotationStore},
    },
    routes,
    services::{clip::ThreadRandom, storage_supervisor},
    state::{AppState, Collaborators, SharedState},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let media = HttpMediaSource::from_env().context("configuring media collaborator")?;
    let storage_config = SupabaseStorageConfig::from_env(config.assets.bucket.clone())
        .context("configuring object storage")?;
    let assets = SupabaseStorage::new(storage_config).context("building object storage client")?;

    let app_state = AppState::new(
        config,
        Collaborators {
            media: Arc::new(media),
            assets: Arc::new(assets),
            random: Arc::new(ThreadRandom),
        },
    );

    spawn_store_supervisor(app_state.clone()).await?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(app_state.shutdown_token().clone()))
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the background supervisor for the backend selected by `STORE_BACKEND`.
async fn spawn_store_supervisor(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "mongo".into());
    info!(%backend, "selecting rotation store backend");

    match backend.as_str() {
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use heardle_back::dao::rotation_store::mongodb::{MongoConfig, MongoRotationStore};

            let mongo_config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let mongo_config = mongo_config.clone();
                async move {
                    let store = MongoRotationStore::connect(mongo_config).await?;
                    Ok::<_, PersistenceError>(Arc::new(store) as Arc<dyn RotationStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use heardle_back::dao::rotation_store::couchdb::{CouchConfig, CouchRotationStore};

            let couch_config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch_config = couch_config.clone();
                async move {
                    let store = CouchRotationStore::connect(couch_config).await?;
                    Ok::<_, PersistenceError>(Arc::new(store) as Arc<dyn RotationStore>)
                }
            }));
        }
        "memory" => {
            let store = match env::var_os("MEMORY_SEED_PATH") {
                Some(path) => MemoryRotationStore::from_seed_file(Path::new(&path))
                    .context("loading memory store seed")?,
                None => MemoryRotationStore::new(),
            };
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, PersistenceError>(Arc::new(store) as Arc<dyn RotationStore>) }
            }));
        }
        other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
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

/// Wait for Ctrl+C or SIGTERM, then cancel in-flight rotation runs and shut the server down.
async fn shutdown_signal(shutdown: CancellationToken) {
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
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
    shutdown.cancel();
}
