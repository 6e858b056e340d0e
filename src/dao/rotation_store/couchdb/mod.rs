mod config;
mod error;
mod models;
mod store;

pub use config::{CouchConfig, CouchCredentials};
pub use error::CouchDaoError;
pub use store::CouchRotationStore;

use crate::dao::persistence::PersistenceError;

impl From<CouchDaoError> for PersistenceError {
    fn from(err: CouchDaoError) -> Self {
        PersistenceError::unavailable(err.to_string(), err)
    }
}
