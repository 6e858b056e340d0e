//! Choice of the link stored in the staged slot.

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::dao::assets::{AssetResult, ObjectStorageError};

/// What to do when the uploaded clip cannot be signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    /// Store the raw catalog link instead of failing the run.
    #[default]
    FallbackToCatalog,
    /// Signing failures abort the run.
    Strict,
}

/// Origin of the link stored in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    /// Time-limited URL to the uploaded clip.
    SignedAsset,
    /// Source locator from the song catalog.
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableLink {
    pub url: String,
    pub source: LinkSource,
}

/// Pick the playable link for a freshly uploaded clip.
///
/// Precedence: a non-empty signed URL, then the catalog link when `policy`
/// allows it. Only call this once the upload itself succeeded.
pub fn resolve_playable_link(
    policy: LinkPolicy,
    object: &str,
    signed: AssetResult<String>,
    catalog_link: &str,
) -> AssetResult<PlayableLink> {
    let failure = match signed {
        Ok(url) if !url.is_empty() => {
            return Ok(PlayableLink {
                url,
                source: LinkSource::SignedAsset,
            });
        }
        Ok(_) => ObjectStorageError::MissingSignedUrl {
            object: object.to_owned(),
        },
        Err(err) => err,
    };

    match policy {
        LinkPolicy::FallbackToCatalog => {
            warn!(error = %failure, "signing failed; staging the catalog link instead");
            Ok(PlayableLink {
                url: catalog_link.to_owned(),
                source: LinkSource::Catalog,
            })
        }
        LinkPolicy::Strict => Err(failure),
    }
}
