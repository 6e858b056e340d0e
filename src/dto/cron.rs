use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    config::AssetSettings,
    dao::models::DailySongEntity,
    dto::format_system_time,
    services::{
        link_policy::LinkSource, pipeline::PipelineStep, rollover_service::RolloverSummary,
        slot_service::SlotsView, staging_service::StagedSong,
    },
};

/// Query parameters of the staging trigger.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StageQuery {
    /// Re-stage even when tomorrow's song is already staged.
    #[serde(default)]
    pub force: bool,
}

/// Daily song slot as exposed to operators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailySongSlot {
    pub name: String,
    pub album: String,
    pub cover: String,
    /// Playable link (signed clip URL or catalog link).
    pub link: String,
    /// Clip start offset in seconds.
    pub start_time: u32,
    pub heardle_day: Option<u32>,
}

impl From<DailySongEntity> for DailySongSlot {
    fn from(value: DailySongEntity) -> Self {
        Self {
            name: value.name,
            album: value.album,
            cover: value.cover,
            link: value.link,
            start_time: value.start_time,
            heardle_day: value.heardle_day,
        }
    }
}

/// Stored clip backing the staged slot.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssetReference {
    pub bucket: String,
    pub object: String,
}

/// Response of the staging trigger.
#[derive(Debug, Serialize, ToSchema)]
pub struct StageResponse {
    pub message: String,
    pub run_id: Uuid,
    /// `next` already held tomorrow's song; nothing was rendered.
    pub already_staged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_source: Option<LinkSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetReference>,
    pub next: DailySongSlot,
    pub completed_at: String,
}

impl StageResponse {
    pub fn new(staged: StagedSong, assets: &AssetSettings) -> Self {
        let message = if staged.already_staged {
            "next daily song already staged"
        } else {
            "next daily song staged"
        };

        Self {
            message: message.into(),
            run_id: staged.run_id,
            already_staged: staged.already_staged,
            song_id: staged.song_id,
            link_source: staged.link_source,
            asset: staged.asset.map(|object| AssetReference {
                bucket: assets.bucket.clone(),
                object,
            }),
            next: staged.slot.into(),
            completed_at: format_system_time(SystemTime::now()),
        }
    }
}

/// Response of the rollover trigger.
#[derive(Debug, Serialize, ToSchema)]
pub struct RolloverResponse {
    pub message: String,
    pub run_id: Uuid,
    /// Day that is now current.
    pub heardle_day: u32,
    /// Streaks were settled by an earlier interrupted run and left alone.
    pub resumed: bool,
    pub streaks_reset: usize,
    pub statistics_created: usize,
    pub kept: usize,
    pub guesses_cleared: u64,
    pub current: DailySongSlot,
    pub completed_at: String,
}

impl From<RolloverSummary> for RolloverResponse {
    fn from(summary: RolloverSummary) -> Self {
        Self {
            message: "daily song rolled over".into(),
            run_id: summary.run_id,
            heardle_day: summary.heardle_day,
            resumed: summary.resumed,
            streaks_reset: summary.report.streaks_reset,
            statistics_created: summary.report.statistics_created,
            kept: summary.report.kept,
            guesses_cleared: summary.guesses_cleared,
            current: summary.current.into(),
            completed_at: format_system_time(SystemTime::now()),
        }
    }
}

/// Both daily song slots.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotsResponse {
    pub current: Option<DailySongSlot>,
    pub next: Option<DailySongSlot>,
}

impl From<SlotsView> for SlotsResponse {
    fn from(view: SlotsView) -> Self {
        Self {
            current: view.current.map(Into::into),
            next: view.next.map(Into::into),
        }
    }
}

/// Error payload of every failed cron request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Failing rotation step, when the error comes from a run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<PipelineStep>,
}
