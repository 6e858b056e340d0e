use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGuessesDocument, MongoSlotDocument, MongoSongDocument, MongoStatisticsDocument,
        MongoUserDocument, doc_id,
    },
};
use crate::dao::{
    models::{DailySongEntity, GuessesEntity, SlotKey, SongEntity, StatisticsEntity, UserEntity},
    persistence::PersistenceResult,
    rotation_store::RotationStore,
};

const SONG_COLLECTION_NAME: &str = "songs";
const SLOT_COLLECTION_NAME: &str = "daily_songs";
const USER_COLLECTION_NAME: &str = "users";
const STATISTICS_COLLECTION_NAME: &str = "statistics";
const GUESSES_COLLECTION_NAME: &str = "guesses";

#[derive(Clone)]
pub struct MongoRotationStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRotationStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn count_songs(&self) -> MongoResult<u64> {
        self.collection::<MongoSongDocument>(SONG_COLLECTION_NAME)
            .await
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::CountSongs { source })
    }

    async fn song_at(&self, index: u64) -> MongoResult<Option<SongEntity>> {
        let mut cursor = self
            .collection::<MongoSongDocument>(SONG_COLLECTION_NAME)
            .await
            .find(doc! {})
            .sort(doc! {"_id": 1})
            .skip(index)
            .limit(1)
            .await
            .map_err(|source| MongoDaoError::LoadSong { index, source })?;

        let song = cursor
            .try_next()
            .await
            .map_err(|source| MongoDaoError::LoadSong { index, source })?;
        Ok(song.map(Into::into))
    }

    async fn find_slot(&self, key: SlotKey) -> MongoResult<Option<DailySongEntity>> {
        let slot = self
            .collection::<MongoSlotDocument>(SLOT_COLLECTION_NAME)
            .await
            .find_one(doc_id(key.as_str()))
            .await
            .map_err(|source| MongoDaoError::LoadSlot {
                key: key.as_str(),
                source,
            })?;
        Ok(slot.map(Into::into))
    }

    async fn save_slot(&self, key: SlotKey, slot: DailySongEntity) -> MongoResult<()> {
        let document: MongoSlotDocument = (key.as_str(), slot).into();
        self.collection::<MongoSlotDocument>(SLOT_COLLECTION_NAME)
            .await
            .replace_one(doc_id(key.as_str()), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSlot {
                key: key.as_str(),
                source,
            })?;
        Ok(())
    }

    async fn list_users(&self) -> MongoResult<Vec<UserEntity>> {
        let cursor = self
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListUsers { source })?;

        let users: Vec<MongoUserDocument> = cursor
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListUsers { source })?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    async fn find_guesses(&self, user_id: String) -> MongoResult<Option<GuessesEntity>> {
        let guesses = self
            .collection::<MongoGuessesDocument>(GUESSES_COLLECTION_NAME)
            .await
            .find_one(doc_id(&user_id))
            .await
            .map_err(|source| MongoDaoError::LoadGuesses { user_id, source })?;
        Ok(guesses.map(Into::into))
    }

    async fn find_statistics(&self, user_id: String) -> MongoResult<Option<StatisticsEntity>> {
        let statistics = self
            .collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION_NAME)
            .await
            .find_one(doc_id(&user_id))
            .await
            .map_err(|source| MongoDaoError::LoadStatistics { user_id, source })?;
        Ok(statistics.map(Into::into))
    }

    async fn save_statistics(&self, statistics: StatisticsEntity) -> MongoResult<()> {
        let user_id = statistics.user_id.clone();
        let document: MongoStatisticsDocument = statistics.into();
        self.collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION_NAME)
            .await
            .replace_one(doc_id(&user_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveStatistics { user_id, source })?;
        Ok(())
    }

    async fn delete_all_guesses(&self) -> MongoResult<u64> {
        let result = self
            .collection::<MongoGuessesDocument>(GUESSES_COLLECTION_NAME)
            .await
            .delete_many(doc! {})
            .await
            .map_err(|source| MongoDaoError::PurgeGuesses { source })?;
        Ok(result.deleted_count)
    }
}

impl RotationStore for MongoRotationStore {
    fn count_songs(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_songs().await.map_err(Into::into) })
    }

    fn song_at(&self, index: u64) -> BoxFuture<'static, PersistenceResult<Option<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.song_at(index).await.map_err(Into::into) })
    }

    fn find_slot(
        &self,
        key: SlotKey,
    ) -> BoxFuture<'static, PersistenceResult<Option<DailySongEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_slot(key).await.map_err(Into::into) })
    }

    fn save_slot(
        &self,
        key: SlotKey,
        slot: DailySongEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_slot(key, slot).await.map_err(Into::into) })
    }

    fn list_users(&self) -> BoxFuture<'static, PersistenceResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_users().await.map_err(Into::into) })
    }

    fn find_guesses(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<GuessesEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_guesses(user_id).await.map_err(Into::into) })
    }

    fn find_statistics(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<StatisticsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_statistics(user_id).await.map_err(Into::into) })
    }

    fn save_statistics(
        &self,
        statistics: StatisticsEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_statistics(statistics).await.map_err(Into::into) })
    }

    fn delete_all_guesses(&self) -> BoxFuture<'static, PersistenceResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_all_guesses().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
