/// Object storage for the staged audio clip.
pub mod assets;
/// Media-info and media-fetch collaborator.
pub mod media;
/// Database model definitions.
pub mod models;
/// Error type shared by every persistence backend.
pub mod persistence;
/// Daily rotation storage and retrieval operations.
pub mod rotation_store;
