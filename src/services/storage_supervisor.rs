use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{persistence::PersistenceError, rotation_store::RotationStore},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the rotation store and keep the shared state in degraded mode while it is unavailable.
///
/// Returns once the shutdown token of `state` is cancelled.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RotationStore>, PersistenceError>> + Send,
{
    let shutdown = state.shutdown_token().clone();
    tokio::select! {
        _ = shutdown.cancelled() => info!("storage supervisor stopped"),
        _ = supervise(&state, &mut connect) => {},
    }
}

async fn supervise<F, Fut>(state: &SharedState, connect: &mut F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Arc<dyn RotationStore>, PersistenceError>>,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("store connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded().await {
                                info!("store healthy again; leaving degraded mode");
                                state.update_degraded(false).await;
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(_) => {
                            if reconnect(state, store.as_ref()).await {
                                state.update_degraded(false).await;
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted store reconnect attempts; staying in degraded mode");
                            state.clear_store().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Retry `try_reconnect` with backoff, entering degraded mode after the first failure.
async fn reconnect(state: &SharedState, store: &dyn RotationStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "store reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "store reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::rotation_store::memory::MemoryRotationStore,
        services::test_support::{FakeAssets, FakeMedia, FixedRandom, collaborators},
        state::AppState,
    };

    fn fresh_state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            collaborators(
                FakeMedia::with_durations(&[]),
                FakeAssets::signing("https://cdn/signed"),
                FixedRandom::new(0, 0),
            ),
        )
    }

    #[tokio::test]
    async fn successful_connection_leaves_degraded_mode() {
        let state = fresh_state();
        assert!(state.is_degraded().await);

        let task = tokio::spawn(run(state.clone(), || async {
            Ok::<_, PersistenceError>(Arc::new(MemoryRotationStore::new()) as Arc<dyn RotationStore>)
        }));

        sleep(Duration::from_millis(100)).await;
        assert!(!state.is_degraded().await);
        assert!(state.store().await.is_some());

        state.shutdown_token().cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_connection_stays_degraded() {
        let state = fresh_state();

        let task = tokio::spawn(run(state.clone(), || async {
            Err::<Arc<dyn RotationStore>, _>(PersistenceError::unavailable(
                "connection refused".into(),
                std::io::Error::other("refused"),
            ))
        }));

        sleep(Duration::from_millis(100)).await;
        assert!(state.is_degraded().await);

        state.shutdown_token().cancel();
        task.await.unwrap();
    }
}
