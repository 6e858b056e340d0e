//! Object storage for the staged clip, speaking the Supabase storage REST API.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dao::media::AudioClip;

/// Result alias for object storage operations.
pub type AssetResult<T> = Result<T, ObjectStorageError>;

#[derive(Debug, Error)]
pub enum ObjectStorageError {
    #[error("missing object storage environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build object storage client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("object storage request for `{object}` could not be sent")]
    Request {
        object: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("object storage answered {status} for `{object}`")]
    Status { object: String, status: StatusCode },
    #[error("failed to decode object storage response for `{object}`")]
    Decode {
        object: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("object storage issued no signed URL for `{object}`")]
    MissingSignedUrl { object: String },
}

/// Named blob storage with time-bounded signed access.
pub trait AssetStorage: Send + Sync {
    /// Store `clip` under `object`, overwriting any previous blob of that name.
    fn upload(&self, object: String, clip: AudioClip) -> BoxFuture<'static, AssetResult<()>>;
    /// Issue a URL granting read access to `object` for `ttl`.
    fn sign_url(&self, object: String, ttl: Duration) -> BoxFuture<'static, AssetResult<String>>;
}

#[derive(Debug, Clone)]
pub struct SupabaseStorageConfig {
    pub base_url: String,
    pub service_key: String,
    pub bucket: String,
}

impl SupabaseStorageConfig {
    /// Read `STORAGE_URL` and `STORAGE_KEY`; the bucket comes from the app config.
    pub fn from_env(bucket: impl Into<String>) -> AssetResult<Self> {
        let base_url = std::env::var("STORAGE_URL").map_err(|_| {
            ObjectStorageError::MissingEnvVar {
                var: "STORAGE_URL",
            }
        })?;
        let service_key = std::env::var("STORAGE_KEY").map_err(|_| {
            ObjectStorageError::MissingEnvVar {
                var: "STORAGE_KEY",
            }
        })?;

        Ok(Self {
            base_url,
            service_key,
            bucket: bucket.into(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl", default)]
    signed_url: Option<String>,
}

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: Arc<str>,
    service_key: Arc<str>,
    bucket: Arc<str>,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseStorageConfig) -> AssetResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| ObjectStorageError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            service_key: Arc::from(config.service_key),
            bucket: Arc::from(config.bucket),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(self.service_key.as_ref())
            .header("apikey", self.service_key.as_ref())
    }

    async fn upload(&self, object: String, clip: AudioClip) -> AssetResult<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object
        );
        let content_type = clip
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_owned());

        let response = self
            .authorized(self.client.post(url))
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .body(clip.bytes)
            .send()
            .await
            .map_err(|source| ObjectStorageError::Request {
                object: object.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ObjectStorageError::Status {
                object,
                status: response.status(),
            })
        }
    }

    async fn sign_url(&self, object: String, ttl: Duration) -> AssetResult<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, self.bucket, object
        );

        let response = self
            .authorized(self.client.post(url))
            .json(&SignRequest {
                expires_in: ttl.as_secs(),
            })
            .send()
            .await
            .map_err(|source| ObjectStorageError::Request {
                object: object.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ObjectStorageError::Status {
                object,
                status: response.status(),
            });
        }

        let payload = response
            .json::<SignResponse>()
            .await
            .map_err(|source| ObjectStorageError::Decode {
                object: object.clone(),
                source,
            })?;

        match payload.signed_url.filter(|url| !url.is_empty()) {
            Some(signed) if signed.starts_with("http") => Ok(signed),
            Some(signed) => Ok(format!("{}/storage/v1{}", self.base_url, signed)),
            None => Err(ObjectStorageError::MissingSignedUrl { object }),
        }
    }
}

impl AssetStorage for SupabaseStorage {
    fn upload(&self, object: String, clip: AudioClip) -> BoxFuture<'static, AssetResult<()>> {
        let storage = self.clone();
        Box::pin(async move { storage.upload(object, clip).await })
    }

    fn sign_url(&self, object: String, ttl: Duration) -> BoxFuture<'static, AssetResult<String>> {
        let storage = self.clone();
        Box::pin(async move { storage.sign_url(object, ttl).await })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;

    fn storage(server: &MockServer) -> SupabaseStorage {
        SupabaseStorage::new(SupabaseStorageConfig {
            base_url: server.uri(),
            service_key: "service-key".into(),
            bucket: "daily_song".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn upload_overwrites_existing_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/daily_song/daily_song.m4a"))
            .and(header("x-upsert", "true"))
            .and(header("authorization", "Bearer service-key"))
            .and(header("content-type", "audio/mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "daily_song/daily_song.m4a"})))
            .expect(1)
            .mount(&server)
            .await;

        let clip = AudioClip {
            bytes: Bytes::from_static(b"m4a"),
            content_type: Some("audio/mp4".into()),
        };
        AssetStorage::upload(&storage(&server), "daily_song.m4a".into(), clip)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sign_url_resolves_relative_path_against_base() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/daily_song/daily_song.m4a"))
            .and(body_json(json!({"expiresIn": 172800})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedURL": "/object/sign/daily_song/daily_song.m4a?token=abc"
            })))
            .mount(&server)
            .await;

        let url = AssetStorage::sign_url(
            &storage(&server),
            "daily_song.m4a".into(),
            Duration::from_secs(172_800),
        )
        .await
        .unwrap();

        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/sign/daily_song/daily_song.m4a?token=abc",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn sign_url_without_url_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/daily_song/daily_song.m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = AssetStorage::sign_url(
            &storage(&server),
            "daily_song.m4a".into(),
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ObjectStorageError::MissingSignedUrl { .. }));
    }
}
