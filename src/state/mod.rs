use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    dao::{assets::AssetStorage, media::MediaSource, rotation_store::RotationStore},
    error::ServiceError,
    services::{clip::RandomSource, pipeline::StepRunner},
};

pub type SharedState = Arc<AppState>;

/// External collaborators used by the staging selector.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaSource>,
    pub assets: Arc<dyn AssetStorage>,
    pub random: Arc<dyn RandomSource>,
}

/// Central application state holding the store handle and collaborators.
pub struct AppState {
    store: RwLock<Option<Arc<dyn RotationStore>>>,
    collaborators: Collaborators,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    rotation_gate: Mutex<()>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            collaborators,
            config,
            degraded: degraded_tx,
            rotation_gate: Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn RotationStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn RotationStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn RotationStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        if self.store.read().await.is_none() {
            return true;
        }
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn media(&self) -> &Arc<dyn MediaSource> {
        &self.collaborators.media
    }

    pub fn assets(&self) -> &Arc<dyn AssetStorage> {
        &self.collaborators.assets
    }

    pub fn random(&self) -> &Arc<dyn RandomSource> {
        &self.collaborators.random
    }

    /// Serialises rotation runs inside this process.
    pub fn rotation_gate(&self) -> &Mutex<()> {
        &self.rotation_gate
    }

    /// Token cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Step runner bound to the configured timeouts and the shutdown token.
    pub fn step_runner(&self) -> StepRunner {
        StepRunner::new(self.config.timeouts, self.shutdown.child_token())
    }
}
