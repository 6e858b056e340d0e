//! Staging selector: draws tomorrow's song, renders its clip and stages it in
//! the `next` slot.

use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    dao::{
        media::ClipRequest,
        models::{DailySongEntity, SlotKey, SongEntity},
    },
    error::ServiceError,
    services::{
        link_policy::{LinkSource, resolve_playable_link},
        pipeline::{PipelineError, PipelineStep},
    },
    state::SharedState,
};

/// Knobs of a staging run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageOptions {
    /// Re-stage even when `next` already holds the upcoming day.
    pub force: bool,
}

/// Outcome of a staging run.
#[derive(Debug, Clone)]
pub struct StagedSong {
    pub run_id: Uuid,
    /// Content of the `next` slot after the run.
    pub slot: DailySongEntity,
    /// Catalog song drawn by this run; `None` when nothing was re-staged.
    pub song_id: Option<String>,
    pub link_source: Option<LinkSource>,
    /// Object name of the uploaded clip.
    pub asset: Option<String>,
    /// `next` already held the upcoming day and was left as is.
    pub already_staged: bool,
}

/// Stage a freshly drawn song in the `next` slot.
///
/// Runs are serialised through the rotation gate. The day number is read
/// before any media work so a run that cannot be sequenced has no side
/// effects; a failed media step never touches the store.
pub async fn stage_next_song(
    state: &SharedState,
    options: StageOptions,
) -> Result<StagedSong, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("stage_next_song", %run_id, force = options.force);

    async move {
        let _gate = state.rotation_gate().lock().await;
        let staged = run(state, run_id, options).await?;
        info!(
            heardle_day = staged.slot.heardle_day,
            already_staged = staged.already_staged,
            "staging run finished"
        );
        Ok(staged)
    }
    .instrument(span)
    .await
}

async fn run(
    state: &SharedState,
    run_id: Uuid,
    options: StageOptions,
) -> Result<StagedSong, PipelineError> {
    let runner = state.step_runner();
    let config = state.config();

    let (store, next_day, staged) = runner
        .run(PipelineStep::ReadSlots, async {
            let store = state.require_store().await?;
            let current = store.find_slot(SlotKey::Current).await?.ok_or_else(|| {
                ServiceError::NotFound("no current daily song to sequence after".into())
            })?;
            let next_day = upcoming_day(&current)?;
            let staged = store.find_slot(SlotKey::Next).await?;
            Ok::<_, ServiceError>((store, next_day, staged))
        })
        .await?;

    if let Some(slot) = staged.filter(|slot| slot.heardle_day == Some(next_day))
        && !options.force
    {
        info!(heardle_day = next_day, "next daily song already staged; skipping");
        return Ok(StagedSong {
            run_id,
            slot,
            song_id: None,
            link_source: None,
            asset: None,
            already_staged: true,
        });
    }

    let song = runner
        .run(PipelineStep::SampleSong, async {
            let catalog_size = store.count_songs().await?;
            if catalog_size == 0 {
                return Err(ServiceError::NotFound("song catalog is empty".into()));
            }
            let index = state.random().catalog_index(catalog_size);
            store.song_at(index).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("no song at catalog index {index}"))
            })
        })
        .await?;
    info!(song_id = %song.id, "drew catalog song");

    let duration = runner
        .run(PipelineStep::ResolveDuration, async {
            let duration = state.media().probe_duration(song.link.clone()).await?;
            config.clip.ensure_playable(duration)?;
            Ok::<_, ServiceError>(duration)
        })
        .await?;

    let draw = state.random().offset_draw(duration);
    let start_time = config.clip.start_offset(draw, duration);
    info!(duration, draw, start_time, "clip offset computed");

    let mut clip = runner
        .run(PipelineStep::FetchClip, async {
            state
                .media()
                .fetch_clip(song.link.clone(), ClipRequest::audio_only(start_time))
                .await
                .map_err(ServiceError::from)
        })
        .await?;
    if clip.content_type.is_none() {
        clip.content_type = Some(config.assets.content_type.clone());
    }

    let object = config.assets.object_name.clone();
    runner
        .run(PipelineStep::UploadClip, async {
            state
                .assets()
                .upload(object.clone(), clip)
                .await
                .map_err(ServiceError::from)
        })
        .await?;

    let link = runner
        .run(PipelineStep::SignUrl, async {
            let signed = state
                .assets()
                .sign_url(object.clone(), config.assets.signed_url_ttl)
                .await;
            resolve_playable_link(config.link_policy, &object, signed, &song.link)
                .map_err(ServiceError::from)
        })
        .await?;

    let slot = next_slot(&song, link.url, start_time, next_day);
    runner
        .run(PipelineStep::SaveNext, async {
            store
                .save_slot(SlotKey::Next, slot.clone())
                .await
                .map_err(ServiceError::from)
        })
        .await?;

    Ok(StagedSong {
        run_id,
        slot,
        song_id: Some(song.id),
        link_source: Some(link.source),
        asset: Some(object),
        already_staged: false,
    })
}

/// Day number the staged song will be played on.
fn upcoming_day(current: &DailySongEntity) -> Result<u32, ServiceError> {
    let day = current.heardle_day.ok_or_else(|| {
        ServiceError::InvalidState("current daily song has no heardle_day".into())
    })?;
    day.checked_add(1)
        .ok_or_else(|| ServiceError::InvalidState("heardle_day overflow".into()))
}

fn next_slot(song: &SongEntity, link: String, start_time: u32, day: u32) -> DailySongEntity {
    DailySongEntity {
        name: song.name.clone(),
        album: song.album_or_name().to_owned(),
        cover: song.cover.clone(),
        link,
        start_time,
        heardle_day: Some(day),
        settled: false,
    }
}
