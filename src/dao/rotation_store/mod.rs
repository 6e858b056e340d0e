#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    DailySongEntity, GuessesEntity, SlotKey, SongEntity, StatisticsEntity, UserEntity,
};
use crate::dao::persistence::PersistenceResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer backing the daily rotation.
///
/// Every write is keyed (slot key, user id) and replaces the previous record,
/// so replaying a write is harmless.
pub trait RotationStore: Send + Sync {
    /// Number of songs in the catalog.
    fn count_songs(&self) -> BoxFuture<'static, PersistenceResult<u64>>;
    /// Song at `index` in the catalog ordered by identifier.
    fn song_at(&self, index: u64) -> BoxFuture<'static, PersistenceResult<Option<SongEntity>>>;
    fn find_slot(&self, key: SlotKey)
    -> BoxFuture<'static, PersistenceResult<Option<DailySongEntity>>>;
    fn save_slot(
        &self,
        key: SlotKey,
        slot: DailySongEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>>;
    fn list_users(&self) -> BoxFuture<'static, PersistenceResult<Vec<UserEntity>>>;
    fn find_guesses(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<GuessesEntity>>>;
    fn find_statistics(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, PersistenceResult<Option<StatisticsEntity>>>;
    fn save_statistics(
        &self,
        statistics: StatisticsEntity,
    ) -> BoxFuture<'static, PersistenceResult<()>>;
    /// Drop the guesses of every user, returning how many records were removed.
    fn delete_all_guesses(&self) -> BoxFuture<'static, PersistenceResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, PersistenceResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, PersistenceResult<()>>;
}
