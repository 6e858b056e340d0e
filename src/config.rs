//! Application-level configuration: clip rules, asset naming, link policy and step timeouts.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::{clip::ClipRules, link_policy::LinkPolicy, pipeline::StepTimeouts};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HEARDLE_BACK_CONFIG_PATH";
/// Environment variables holding the pre-shared cron secret, in lookup order.
const CRON_TOKEN_ENVS: [&str; 2] = ["CRON_TOKEN", "QSTASH_TOKEN"];
/// Signed URLs outlive the day they are staged for.
const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Where and how the staged clip is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSettings {
    pub bucket: String,
    /// Fixed object name; every staging run overwrites it.
    pub object_name: String,
    /// Content type used when the media collaborator does not report one.
    pub content_type: String,
    pub signed_url_ttl: Duration,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            bucket: "daily_song".into(),
            object_name: "daily_song.m4a".into(),
            content_type: "audio/mp4".into(),
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub clip: ClipRules,
    pub assets: AssetSettings,
    pub link_policy: LinkPolicy,
    pub timeouts: StepTimeouts,
    /// Bearer secret expected on cron routes; `None` rejects every trigger.
    pub cron_token: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk (falling back to built-in defaults) and
    /// read the cron secret from the environment.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.cron_token = CRON_TOKEN_ENVS
            .iter()
            .find_map(|var| env::var(var).ok())
            .filter(|token| !token.is_empty());
        if config.cron_token.is_none() {
            warn!("no cron token configured; cron routes will reject every request");
        }

        config
    }

    /// Replace the cron secret.
    pub fn with_cron_token(mut self, token: impl Into<String>) -> Self {
        self.cron_token = Some(token.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    clip: RawClip,
    assets: RawAssets,
    link_policy: Option<LinkPolicy>,
    timeouts: RawTimeouts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClip {
    lead_in_secs: Option<u32>,
    window_secs: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAssets {
    bucket: Option<String>,
    object_name: Option<String>,
    content_type: Option<String>,
    signed_url_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTimeouts {
    step_secs: Option<u64>,
    transfer_secs: Option<u64>,
    batch_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let clip_defaults = ClipRules::default();
        let asset_defaults = AssetSettings::default();
        let timeout_defaults = StepTimeouts::default();

        Self {
            clip: ClipRules {
                lead_in_secs: value.clip.lead_in_secs.unwrap_or(clip_defaults.lead_in_secs),
                window_secs: value.clip.window_secs.unwrap_or(clip_defaults.window_secs),
            },
            assets: AssetSettings {
                bucket: value.assets.bucket.unwrap_or(asset_defaults.bucket),
                object_name: value.assets.object_name.unwrap_or(asset_defaults.object_name),
                content_type: value
                    .assets
                    .content_type
                    .unwrap_or(asset_defaults.content_type),
                signed_url_ttl: value
                    .assets
                    .signed_url_ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(asset_defaults.signed_url_ttl),
            },
            link_policy: value.link_policy.unwrap_or_default(),
            timeouts: StepTimeouts {
                step: secs_or(value.timeouts.step_secs, timeout_defaults.step),
                transfer: secs_or(value.timeouts.transfer_secs, timeout_defaults.transfer),
                batch: secs_or(value.timeouts.batch_secs, timeout_defaults.batch),
            },
            cron_token: None,
        }
    }
}

fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "clip": {"lead_in_secs": 5},
                "assets": {"signed_url_ttl_secs": 3600},
                "link_policy": "strict"
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.clip.lead_in_secs, 5);
        assert_eq!(config.clip.window_secs, 6);
        assert_eq!(config.assets.object_name, "daily_song.m4a");
        assert_eq!(config.assets.signed_url_ttl, Duration::from_secs(3600));
        assert_eq!(config.link_policy, LinkPolicy::Strict);
        assert_eq!(config.timeouts.step, StepTimeouts::default().step);
    }

    #[test]
    fn defaults_match_daily_rotation_contract() {
        let config = AppConfig::default();

        assert_eq!(config.clip.lead_in_secs, 7);
        assert_eq!(config.assets.bucket, "daily_song");
        assert_eq!(config.assets.signed_url_ttl, Duration::from_secs(172_800));
        assert_eq!(config.link_policy, LinkPolicy::FallbackToCatalog);
        assert!(config.cron_token.is_none());
    }
}
