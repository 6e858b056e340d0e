mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRotationStore;

use crate::dao::persistence::PersistenceError;

impl From<MongoDaoError> for PersistenceError {
    fn from(err: MongoDaoError) -> Self {
        PersistenceError::unavailable(err.to_string(), err)
    }
}
