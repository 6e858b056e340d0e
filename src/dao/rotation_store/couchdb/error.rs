use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures raised by the CouchDB rotation store.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Looking up or creating the database failed at the transport level.
    #[error("CouchDB database `{database}` could not be {action}")]
    Database {
        database: String,
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for database `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    #[error("CouchDB request to `{path}` could not be sent")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{path}`")]
    Status { path: String, status: StatusCode },
    #[error("failed to decode CouchDB response for `{path}`")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A row carried a document that does not match the expected model.
    #[error("malformed CouchDB document under `{path}`")]
    MalformedDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// `_bulk_docs` accepted the request but rejected some documents.
    #[error("CouchDB rejected {rejected} document(s) in bulk update")]
    BulkRejected { rejected: usize },
}
