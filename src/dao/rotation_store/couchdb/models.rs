use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::SlotKey;

pub const SONG_PREFIX: &str = "song::";
pub const USER_PREFIX: &str = "user::";
pub const GUESSES_PREFIX: &str = "guesses::";
const SLOT_PREFIX: &str = "slot::";
const STATISTICS_PREFIX: &str = "statistics::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
}

/// CouchDB envelope around an entity body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, body: T) -> Self {
        Self {
            id,
            rev: None,
            body,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<DeletedDocument>,
}

/// Tombstone sent through `_bulk_docs`.
#[derive(Debug, Serialize)]
pub struct DeletedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsResult {
    #[serde(default)]
    pub error: Option<String>,
}

pub fn slot_doc_id(key: SlotKey) -> String {
    format!("{}{}", SLOT_PREFIX, key.as_str())
}

pub fn statistics_doc_id(user_id: &str) -> String {
    format!("{}{}", STATISTICS_PREFIX, user_id)
}

pub fn guesses_doc_id(user_id: &str) -> String {
    format!("{}{}", GUESSES_PREFIX, user_id)
}
