use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to count catalog songs")]
    CountSongs {
        #[source]
        source: MongoError,
    },
    #[error("failed to load catalog song at index {index}")]
    LoadSong {
        index: u64,
        #[source]
        source: MongoError,
    },
    #[error("failed to load daily song slot `{key}`")]
    LoadSlot {
        key: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save daily song slot `{key}`")]
    SaveSlot {
        key: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to list users")]
    ListUsers {
        #[source]
        source: MongoError,
    },
    #[error("failed to load guesses of user `{user_id}`")]
    LoadGuesses {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load statistics of user `{user_id}`")]
    LoadStatistics {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save statistics of user `{user_id}`")]
    SaveStatistics {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to purge guesses")]
    PurgeGuesses {
        #[source]
        source: MongoError,
    },
}
