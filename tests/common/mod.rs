#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use bytes::Bytes;
use futures::future::BoxFuture;
use heardle_back::{
    config::AppConfig,
    dao::{
        assets::{AssetResult, AssetStorage},
        media::{AudioClip, ClipRequest, MediaError, MediaResult, MediaSource},
        models::{DailySongEntity, SongEntity},
        rotation_store::memory::MemoryRotationStore,
    },
    routes,
    services::clip::RandomSource,
    state::{AppState, Collaborators, SharedState},
};
use serde_json::Value;
use tower::ServiceExt;

pub const CRON_TOKEN: &str = "cron-secret";

pub struct FixedRandom {
    pub index: u64,
    pub draw: u32,
}

impl RandomSource for FixedRandom {
    fn catalog_index(&self, _catalog_size: u64) -> u64 {
        self.index
    }

    fn offset_draw(&self, _duration: u32) -> u32 {
        self.draw
    }
}

/// Media source answering from a link → duration table.
#[derive(Clone, Default)]
pub struct TableMedia {
    durations: HashMap<String, u32>,
    requests: Arc<Mutex<Vec<(String, u32)>>>,
}

impl TableMedia {
    pub fn new(durations: &[(&str, u32)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(link, duration)| ((*link).to_owned(), *duration))
                .collect(),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MediaSource for TableMedia {
    fn probe_duration(&self, locator: String) -> BoxFuture<'static, MediaResult<u32>> {
        let duration = self.durations.get(&locator).copied();
        Box::pin(async move { duration.ok_or(MediaError::EmptyClip { locator }) })
    }

    fn fetch_clip(
        &self,
        locator: String,
        request: ClipRequest,
    ) -> BoxFuture<'static, MediaResult<AudioClip>> {
        self.requests
            .lock()
            .unwrap()
            .push((locator, request.start_secs));
        Box::pin(async {
            Ok(AudioClip {
                bytes: Bytes::from_static(b"\x00\x00\x00\x18ftypM4A "),
                content_type: Some("audio/mp4".into()),
            })
        })
    }
}

#[derive(Clone, Default)]
pub struct SigningAssets {
    uploads: Arc<Mutex<Vec<String>>>,
}

impl SigningAssets {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

impl AssetStorage for SigningAssets {
    fn upload(&self, object: String, _clip: AudioClip) -> BoxFuture<'static, AssetResult<()>> {
        self.uploads.lock().unwrap().push(object);
        Box::pin(async { Ok(()) })
    }

    fn sign_url(&self, object: String, ttl: Duration) -> BoxFuture<'static, AssetResult<String>> {
        Box::pin(async move {
            Ok(format!(
                "https://storage.test/object/sign/daily_song/{object}?ttl={}",
                ttl.as_secs()
            ))
        })
    }
}

pub fn song(id: &str, name: &str) -> SongEntity {
    SongEntity {
        id: id.into(),
        name: name.into(),
        album: None,
        link: format!("https://youtube.test/{id}"),
        cover: format!("https://covers.test/{id}.jpg"),
    }
}

pub fn slot(name: &str, day: u32) -> DailySongEntity {
    DailySongEntity {
        name: name.into(),
        album: format!("{name} album"),
        cover: "https://covers.test/slot.jpg".into(),
        link: "https://storage.test/slot".into(),
        start_time: 5,
        heardle_day: Some(day),
        settled: false,
    }
}

pub fn build_state(media: TableMedia, assets: SigningAssets, random: FixedRandom) -> SharedState {
    AppState::new(
        AppConfig::default().with_cron_token(CRON_TOKEN),
        Collaborators {
            media: Arc::new(media),
            assets: Arc::new(assets),
            random: Arc::new(random),
        },
    )
}

pub async fn install(state: &SharedState, store: &MemoryRotationStore) {
    state.install_store(Arc::new(store.clone())).await;
}

pub fn app(state: &SharedState) -> Router {
    routes::router(state.clone())
}

pub fn cron_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send `request` through a fresh router and decode the JSON body.
pub async fn send(state: &SharedState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
