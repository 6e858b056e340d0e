//! Deterministic collaborators shared by the service tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::StatusCode;

use crate::{
    config::AppConfig,
    dao::{
        assets::{AssetResult, AssetStorage, ObjectStorageError},
        media::{AudioClip, ClipRequest, MediaError, MediaResult, MediaSource},
        models::{
            DailySongEntity, GuessesEntity, SlotKey, SongEntity, StatisticsEntity, UserEntity,
        },
        persistence::{PersistenceError, PersistenceResult},
        rotation_store::{RotationStore, memory::MemoryRotationStore},
    },
    services::clip::RandomSource,
    state::{AppState, Collaborators, SharedState},
};

pub fn song(id: &str, name: &str) -> SongEntity {
    SongEntity {
        id: id.into(),
        name: name.into(),
        album: None,
        link: format!("https://media/{id}"),
        cover: format!("https://covers/{id}.jpg"),
    }
}

pub fn current_slot(day: u32) -> DailySongEntity {
    DailySongEntity {
        name: format!("Song of day {day}"),
        album: "Album".into(),
        cover: "https://covers/day.jpg".into(),
        link: "https://cdn/day".into(),
        start_time: 12,
        heardle_day: Some(day),
        settled: false,
    }
}

/// Always draws the same catalog index and offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom {
    index: u64,
    draw: u32,
}

impl FixedRandom {
    pub fn new(index: u64, draw: u32) -> Self {
        Self { index, draw }
    }
}

impl RandomSource for FixedRandom {
    fn catalog_index(&self, _catalog_size: u64) -> u64 {
        self.index
    }

    fn offset_draw(&self, _duration: u32) -> u32 {
        self.draw
    }
}

#[derive(Clone, Default)]
pub struct FakeMedia {
    durations: Arc<HashMap<String, u32>>,
    fail_fetch: bool,
    fetched: Arc<Mutex<Vec<u32>>>,
}

impl FakeMedia {
    pub fn with_durations(durations: &[(&str, u32)]) -> Self {
        Self {
            durations: Arc::new(
                durations
                    .iter()
                    .map(|(link, duration)| ((*link).to_owned(), *duration))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Start offsets of every clip requested so far.
    pub fn fetched_offsets(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

impl MediaSource for FakeMedia {
    fn probe_duration(&self, locator: String) -> BoxFuture<'static, MediaResult<u32>> {
        let duration = self.durations.get(&locator).copied();
        Box::pin(async move {
            duration.ok_or(MediaError::Status {
                locator,
                status: StatusCode::NOT_FOUND,
            })
        })
    }

    fn fetch_clip(
        &self,
        locator: String,
        request: ClipRequest,
    ) -> BoxFuture<'static, MediaResult<AudioClip>> {
        let fail = self.fail_fetch;
        if !fail {
            self.fetched.lock().unwrap().push(request.start_secs);
        }
        Box::pin(async move {
            if fail {
                return Err(MediaError::EmptyClip { locator });
            }
            Ok(AudioClip {
                bytes: Bytes::from_static(b"clip"),
                content_type: None,
            })
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeAssets {
    signed_url: Option<String>,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl FakeAssets {
    pub fn signing(url: &str) -> Self {
        Self {
            signed_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn failing_sign() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

impl AssetStorage for FakeAssets {
    fn upload(&self, object: String, _clip: AudioClip) -> BoxFuture<'static, AssetResult<()>> {
        self.uploads.lock().unwrap().push(object);
        Box::pin(async { Ok(()) })
    }

    fn sign_url(&self, object: String, _ttl: Duration) -> BoxFuture<'static, AssetResult<String>> {
        let signed = self.signed_url.clone();
        Box::pin(async move { signed.ok_or(ObjectStorageError::MissingSignedUrl { object }) })
    }
}

pub fn collaborators(media: FakeMedia, assets: FakeAssets, random: FixedRandom) -> Collaborators {
    Collaborators {
        media: Arc::new(media),
        assets: Arc::new(assets),
        random: Arc::new(random),
    }
}

/// State with `store` installed and the given fakes.
pub async fn state_with(
    config: AppConfig,
    store: &MemoryRotationStore,
    media: FakeMedia,
    assets: FakeAssets,
    random: FixedRandom,
) -> SharedState {
    let state = AppState::new(config, collaborators(media, assets, random));
    state.install_store(Arc::new(store.clone())).await;
    state
}

/// Memory store whose statistics lookups fail for one user.
pub fn failing_statistics_store(
    store: &MemoryRotationStore,
    broken_user: &str,
) -> Arc<dyn RotationStore> {
    Arc::new(FaultyStore {
        broken_user: Some(broken_user.to_owned()),
        ..FaultyStore::new(store)
    })
}

/// Memory store that rejects the first write of `current` whose `settled`
/// flag equals `settled`: `true` hits the settled marker, `false` the
/// promotion.
pub fn failing_current_write_store(
    store: &MemoryRotationStore,
    settled: bool,
) -> Arc<dyn RotationStore> {
    Arc::new(FaultyStore {
        failing_current_write: Some(settled),
        ..FaultyStore::new(store)
    })
}

struct FaultyStore {
    inner: MemoryRotationStore,
    broken_user: Option<String>,
    failing_current_write: Option<bool>,
    tripped: AtomicBool,
}

impl FaultyStore {
    fn new(store: &MemoryRotationStore) -> Self {
        Self {
            inner: store.clone(),
            broken_user: None,
            failing_current_write: None,
            tripped: AtomicBool::new(false),
        }
    }
}

impl RotationStore for FaultyStore {
    fn count_songs(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        self.inner.count_songs()
    }

    fn song_at(&self, index: u64) -> BoxFuture<'static, PersistenceResult<Option<SongEntity>>> {
        self.inner.song_at(index)
    }

    fn find_slot(
        &self,
        key: SlotKey,
    ) -> BoxFuture<'static, PersistenceResult<Option<DailySongEntity>>> {
        self.inner.find_slot(key)
    }

    fn save_slot(
        &self,
        key: SlotKey,
        slot: DailySongEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let fails = key == SlotKey::Current
            && self.failing_current_write == Some(slot.settled)
            && !self.tripped.swap(true, Ordering::SeqCst);
        if fails {
            return Box::pin(async {
                Err(PersistenceError::unavailable(
                    "write of the current slot was rejected".into(),
                    std::io::Error::other("write rejected"),
                ))
            });
        }
        self.inner.save_slot(key, slot)
    }

    fn list_users(&self) -> BoxFuture<'static, PersistenceResult<Vec<UserEntity>>> {
        self.inner.list_users()
    }

    fn find_guesses(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<GuessesEntity>>> {
        self.inner.find_guesses(user_id)
    }

    fn find_statistics(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<StatisticsEntity>>> {
        if self.broken_user.as_deref() == Some(user_id.as_str()) {
            return Box::pin(async move {
                Err(PersistenceError::unavailable(
                    format!("statistics of `{user_id}` are corrupt"),
                    std::io::Error::other("bad document"),
                ))
            });
        }
        self.inner.find_statistics(user_id)
    }

    fn save_statistics(
        &self,
        statistics: StatisticsEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        self.inner.save_statistics(statistics)
    }

    fn delete_all_guesses(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        self.inner.delete_all_guesses()
    }

    fn health_check(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        self.inner.try_reconnect()
    }
}
