//! Media collaborator: resolves track durations and renders trimmed audio clips.
//!
//! The HTTP implementation talks to a media resolver service exposing
//! `GET /info?url=` (duration lookup) and `GET /audio?url=&begin=&filter=&quality=`
//! (trimmed rendition streamed back as the response body).

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;

/// Result alias for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Failures raised while talking to the media collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("missing media environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build media client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("media request for `{locator}` could not be sent")]
    Request {
        locator: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("media service answered {status} for `{locator}`")]
    Status { locator: String, status: StatusCode },
    #[error("failed to decode media info for `{locator}`")]
    Decode {
        locator: String,
        #[source]
        source: reqwest::Error,
    },
    /// The rendition stream broke after `received` bytes.
    #[error("media stream for `{locator}` failed after {received} byte(s)")]
    Stream {
        locator: String,
        received: usize,
        #[source]
        source: reqwest::Error,
    },
    #[error("media service returned an empty clip for `{locator}`")]
    EmptyClip { locator: String },
    #[error("track is {duration}s long, shorter than the {window}s clip window")]
    TrackTooShort { duration: u32, window: u32 },
}

/// Rendition constraints forwarded to the media collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    /// Offset (seconds) where the rendition starts.
    pub start_secs: u32,
    pub filter: &'static str,
    pub quality: &'static str,
}

impl ClipRequest {
    /// Audio-only, highest-quality rendition starting at `start_secs`.
    pub fn audio_only(start_secs: u32) -> Self {
        Self {
            start_secs,
            filter: "audioonly",
            quality: "highestaudio",
        }
    }
}

/// Fully received audio rendition.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Media-info and media-fetch collaborator.
pub trait MediaSource: Send + Sync {
    /// Total duration in seconds of the media behind `locator`.
    fn probe_duration(&self, locator: String) -> BoxFuture<'static, MediaResult<u32>>;
    /// Trimmed rendition of `locator`; resolves only once the whole clip was received.
    fn fetch_clip(
        &self,
        locator: String,
        request: ClipRequest,
    ) -> BoxFuture<'static, MediaResult<AudioClip>>;
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    #[serde(alias = "lengthSeconds")]
    length_seconds: u32,
}

#[derive(Clone)]
pub struct HttpMediaSource {
    client: Client,
    base_url: Arc<str>,
}

impl HttpMediaSource {
    pub fn new(base_url: &str) -> MediaResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| MediaError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Read the resolver location from `MEDIA_SERVICE_URL`.
    pub fn from_env() -> MediaResult<Self> {
        let base_url = std::env::var("MEDIA_SERVICE_URL").map_err(|_| MediaError::MissingEnvVar {
            var: "MEDIA_SERVICE_URL",
        })?;
        Self::new(&base_url)
    }

    async fn probe_duration(&self, locator: String) -> MediaResult<u32> {
        let response = self
            .client
            .get(format!("{}/info", self.base_url))
            .query(&[("url", locator.as_str())])
            .send()
            .await
            .map_err(|source| MediaError::Request {
                locator: locator.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(MediaError::Status {
                locator,
                status: response.status(),
            });
        }

        let info = response
            .json::<MediaInfo>()
            .await
            .map_err(|source| MediaError::Decode { locator, source })?;
        Ok(info.length_seconds)
    }

    async fn fetch_clip(&self, locator: String, request: ClipRequest) -> MediaResult<AudioClip> {
        let begin = format!("{}s", request.start_secs);
        let response = self
            .client
            .get(format!("{}/audio", self.base_url))
            .query(&[
                ("url", locator.as_str()),
                ("begin", begin.as_str()),
                ("filter", request.filter),
                ("quality", request.quality),
            ])
            .send()
            .await
            .map_err(|source| MediaError::Request {
                locator: locator.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(MediaError::Status {
                locator,
                status: response.status(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(source) => {
                    return Err(MediaError::Stream {
                        locator,
                        received: buffer.len(),
                        source,
                    });
                }
            }
        }

        if buffer.is_empty() {
            return Err(MediaError::EmptyClip { locator });
        }

        Ok(AudioClip {
            bytes: buffer.freeze(),
            content_type,
        })
    }
}

impl MediaSource for HttpMediaSource {
    fn probe_duration(&self, locator: String) -> BoxFuture<'static, MediaResult<u32>> {
        let source = self.clone();
        Box::pin(async move { source.probe_duration(locator).await })
    }

    fn fetch_clip(
        &self,
        locator: String,
        request: ClipRequest,
    ) -> BoxFuture<'static, MediaResult<AudioClip>> {
        let source = self.clone();
        Box::pin(async move { source.fetch_clip(locator, request).await })
    }
}
