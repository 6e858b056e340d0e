//! In-process rotation store used for local runs and tests.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::dao::{
    models::{DailySongEntity, GuessesEntity, SlotKey, SongEntity, StatisticsEntity, UserEntity},
    persistence::{PersistenceError, PersistenceResult},
    rotation_store::RotationStore,
};

#[derive(Clone, Default)]
pub struct MemoryRotationStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    songs: BTreeMap<String, SongEntity>,
    slots: HashMap<SlotKey, DailySongEntity>,
    users: BTreeMap<String, UserEntity>,
    statistics: HashMap<String, StatisticsEntity>,
    guesses: HashMap<String, GuessesEntity>,
}

/// JSON document used to pre-populate a memory store.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemorySeed {
    pub songs: Vec<SongEntity>,
    pub users: Vec<UserEntity>,
    pub statistics: Vec<StatisticsEntity>,
    pub current: Option<DailySongEntity>,
    pub next: Option<DailySongEntity>,
}

impl MemoryRotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a seed file on disk.
    pub fn from_seed_file(path: &Path) -> PersistenceResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| {
            PersistenceError::unavailable(format!("failed to read seed `{}`", path.display()), source)
        })?;
        let seed: MemorySeed = serde_json::from_str(&contents).map_err(|source| {
            PersistenceError::unavailable(format!("failed to parse seed `{}`", path.display()), source)
        })?;
        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: MemorySeed) -> Self {
        let mut slots = HashMap::new();
        if let Some(current) = seed.current {
            slots.insert(SlotKey::Current, current);
        }
        if let Some(next) = seed.next {
            slots.insert(SlotKey::Next, next);
        }

        let state = MemoryState {
            songs: seed
                .songs
                .into_iter()
                .map(|song| (song.id.clone(), song))
                .collect(),
            slots,
            users: seed
                .users
                .into_iter()
                .map(|user| (user.id.clone(), user))
                .collect(),
            statistics: seed
                .statistics
                .into_iter()
                .map(|stats| (stats.user_id.clone(), stats))
                .collect(),
            guesses: HashMap::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn insert_song(&self, song: SongEntity) {
        self.inner.write().await.songs.insert(song.id.clone(), song);
    }

    pub async fn insert_user(&self, user: UserEntity) {
        self.inner.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn insert_statistics(&self, statistics: StatisticsEntity) {
        self.inner
            .write()
            .await
            .statistics
            .insert(statistics.user_id.clone(), statistics);
    }

    pub async fn insert_guesses(&self, guesses: GuessesEntity) {
        self.inner
            .write()
            .await
            .guesses
            .insert(guesses.user_id.clone(), guesses);
    }

    pub async fn insert_slot(&self, key: SlotKey, slot: DailySongEntity) {
        self.inner.write().await.slots.insert(key, slot);
    }

    pub async fn slot(&self, key: SlotKey) -> Option<DailySongEntity> {
        self.inner.read().await.slots.get(&key).cloned()
    }

    pub async fn statistics(&self, user_id: &str) -> Option<StatisticsEntity> {
        self.inner.read().await.statistics.get(user_id).cloned()
    }

    /// Number of users that still hold guess records.
    pub async fn guess_records(&self) -> usize {
        self.inner.read().await.guesses.len()
    }
}

impl RotationStore for MemoryRotationStore {
    fn count_songs(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.read().await.songs.len() as u64) })
    }

    fn song_at(&self, index: u64) -> BoxFuture<'static, PersistenceResult<Option<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.inner.read().await;
            let song = usize::try_from(index)
                .ok()
                .and_then(|index| guard.songs.values().nth(index))
                .cloned();
            Ok(song)
        })
    }

    fn find_slot(
        &self,
        key: SlotKey,
    ) -> BoxFuture<'static, PersistenceResult<Option<DailySongEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.slot(key).await) })
    }

    fn save_slot(
        &self,
        key: SlotKey,
        slot: DailySongEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.insert_slot(key, slot).await;
            Ok(())
        })
    }

    fn list_users(&self) -> BoxFuture<'static, PersistenceResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.read().await.users.values().cloned().collect()) })
    }

    fn find_guesses(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<GuessesEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.read().await.guesses.get(&user_id).cloned()) })
    }

    fn find_statistics(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<StatisticsEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.statistics(&user_id).await) })
    }

    fn save_statistics(
        &self,
        statistics: StatisticsEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.insert_statistics(statistics).await;
            Ok(())
        })
    }

    fn delete_all_guesses(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.write().await;
            let removed = guard.guesses.len() as u64;
            guard.guesses.clear();
            Ok(removed)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
