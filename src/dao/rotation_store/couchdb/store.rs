use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;

use crate::dao::{
    models::{DailySongEntity, GuessesEntity, SlotKey, SongEntity, StatisticsEntity, UserEntity},
    persistence::PersistenceResult,
    rotation_store::RotationStore,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, AllDocsRow, BulkDocsRequest, BulkDocsResult, CouchDocument,
        DeletedDocument, END_SUFFIX, GUESSES_PREFIX, SONG_PREFIX, USER_PREFIX, guesses_doc_id,
        slot_doc_id, statistics_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";
const BULK_DOCS: &str = "_bulk_docs";

#[derive(Clone)]
pub struct CouchRotationStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

/// Window over the documents sharing a prefix.
struct Page {
    skip: u64,
    limit: Option<u64>,
    include_docs: bool,
}

impl Page {
    const EVERYTHING: Page = Page {
        skip: 0,
        limit: None,
        include_docs: true,
    };
    const IDS_ONLY: Page = Page {
        skip: 0,
        limit: None,
        include_docs: false,
    };
}

impl CouchRotationStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|credentials| {
                (
                    Arc::<str>::from(credentials.username),
                    Arc::<str>::from(credentials.password),
                )
            });

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.with_auth(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                action: "queried",
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        action: "created",
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::Decode {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::Status {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Upsert `body` under `doc_id`, reusing the stored revision when present.
    async fn save_document<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut document = CouchDocument::new(doc_id, body);
        if let Some(existing) = self.get_document::<T>(&document.id).await? {
            document.rev = existing.rev;
        }

        let response = self
            .request(Method::PUT, &document.id)
            .json(&document)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                path: document.id.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::Status {
                path: document.id,
                status: response.status(),
            })
        }
    }

    async fn list_rows(&self, prefix: &str, page: Page) -> CouchResult<Vec<AllDocsRow>> {
        let mut query = vec![
            ("include_docs", page.include_docs.to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
            ("skip", page.skip.to_string()),
        ];
        if let Some(limit) = page.limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::Decode {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;
        Ok(payload.rows)
    }

    async fn list_documents<T>(&self, prefix: &str, page: Page) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut documents = Vec::new();
        for row in self.list_rows(prefix, page).await? {
            if let Some(doc) = row.doc {
                let parsed: CouchDocument<T> =
                    from_value(doc).map_err(|source| CouchDaoError::MalformedDocument {
                        path: row.id,
                        source,
                    })?;
                documents.push(parsed.body);
            }
        }

        Ok(documents)
    }

    async fn delete_with_prefix(&self, prefix: &str) -> CouchResult<u64> {
        let docs = self
            .list_rows(prefix, Page::IDS_ONLY)
            .await?
            .into_iter()
            .filter_map(|row| {
                row.value.map(|value| DeletedDocument {
                    id: row.id,
                    rev: value.rev,
                    deleted: true,
                })
            })
            .collect::<Vec<_>>();

        if docs.is_empty() {
            return Ok(0);
        }

        let requested = docs.len();
        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            });
        }

        let results = response
            .json::<Vec<BulkDocsResult>>()
            .await
            .map_err(|source| CouchDaoError::Decode {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        let rejected = results.iter().filter(|result| result.error.is_some()).count();
        if rejected > 0 {
            return Err(CouchDaoError::BulkRejected { rejected });
        }

        Ok(requested as u64)
    }
}

impl RotationStore for CouchRotationStore {
    fn count_songs(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store.list_rows(SONG_PREFIX, Page::IDS_ONLY).await?;
            Ok(rows.len() as u64)
        })
    }

    fn song_at(&self, index: u64) -> BoxFuture<'static, PersistenceResult<Option<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let page = Page {
                skip: index,
                limit: Some(1),
                include_docs: true,
            };
            let mut songs = store.list_documents::<SongEntity>(SONG_PREFIX, page).await?;
            Ok(songs.pop())
        })
    }

    fn find_slot(
        &self,
        key: SlotKey,
    ) -> BoxFuture<'static, PersistenceResult<Option<DailySongEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<DailySongEntity>(&slot_doc_id(key))
                .await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn save_slot(
        &self,
        key: SlotKey,
        slot: DailySongEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_document(slot_doc_id(key), slot)
                .await
                .map_err(Into::into)
        })
    }

    fn list_users(&self) -> BoxFuture<'static, PersistenceResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_documents::<UserEntity>(USER_PREFIX, Page::EVERYTHING)
                .await
                .map_err(Into::into)
        })
    }

    fn find_guesses(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<GuessesEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<GuessesEntity>(&guesses_doc_id(&user_id))
                .await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn find_statistics(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<StatisticsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<StatisticsEntity>(&statistics_doc_id(&user_id))
                .await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn save_statistics(
        &self,
        statistics: StatisticsEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = statistics_doc_id(&statistics.user_id);
            store
                .save_document(doc_id, statistics)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_all_guesses(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_with_prefix(GUESSES_PREFIX)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .with_auth(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::Transport {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::Status {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
