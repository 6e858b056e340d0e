use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{Request, header::AUTHORIZATION},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};

use crate::{
    dto::cron::{ErrorResponse, RolloverResponse, SlotsResponse, StageQuery, StageResponse},
    error::AppError,
    services::{
        rollover_service, slot_service,
        staging_service::{self, StageOptions},
    },
    state::SharedState,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Cron-triggered rotation endpoints, all behind the shared bearer secret.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/cron/daily-song/stage", post(stage_daily_song))
        .route("/cron/daily-song/rollover", post(roll_over_daily_song))
        .route("/cron/daily-song/slots", get(daily_song_slots))
        .route_layer(middleware::from_fn_with_state(state, require_cron_token))
}

/// Draw tomorrow's song, upload its clip and stage it in the `next` slot.
#[utoipa::path(
    post,
    path = "/cron/daily-song/stage",
    tag = "cron",
    params(
        StageQuery,
        ("Authorization" = String, Header, description = "`Bearer <cron secret>`"),
    ),
    responses(
        (status = 200, description = "Next daily song staged", body = StageResponse),
        (status = 400, description = "Malformed query string", body = ErrorResponse),
        (status = 401, description = "Missing or invalid cron secret", body = ErrorResponse),
        (status = 404, description = "No current day or empty catalog", body = ErrorResponse),
        (status = 409, description = "Current day has no sequence number", body = ErrorResponse),
        (status = 502, description = "Media or object storage failure", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
        (status = 504, description = "A step timed out", body = ErrorResponse),
    )
)]
pub async fn stage_daily_song(
    State(state): State<SharedState>,
    query: Result<Query<StageQuery>, QueryRejection>,
) -> Result<Json<StageResponse>, AppError> {
    let Query(query) = query?;
    let staged = staging_service::stage_next_song(&state, StageOptions { force: query.force }).await?;
    Ok(Json(StageResponse::new(staged, &state.config().assets)))
}

/// Settle streaks, clear guesses and promote the staged song.
#[utoipa::path(
    post,
    path = "/cron/daily-song/rollover",
    tag = "cron",
    params(("Authorization" = String, Header, description = "`Bearer <cron secret>`")),
    responses(
        (status = 200, description = "Staged song promoted", body = RolloverResponse),
        (status = 401, description = "Missing or invalid cron secret", body = ErrorResponse),
        (status = 404, description = "Nothing staged", body = ErrorResponse),
        (status = 409, description = "Staged day already promoted or out of sequence", body = ErrorResponse),
        (status = 500, description = "Some users could not be reconciled", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn roll_over_daily_song(
    State(state): State<SharedState>,
) -> Result<Json<RolloverResponse>, AppError> {
    let summary = rollover_service::roll_over(&state).await?;
    Ok(Json(summary.into()))
}

/// Inspect both daily song slots.
#[utoipa::path(
    get,
    path = "/cron/daily-song/slots",
    tag = "cron",
    params(("Authorization" = String, Header, description = "`Bearer <cron secret>`")),
    responses(
        (status = 200, description = "Current and next slots", body = SlotsResponse),
        (status = 401, description = "Missing or invalid cron secret", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn daily_song_slots(
    State(state): State<SharedState>,
) -> Result<Json<SlotsResponse>, AppError> {
    let view = slot_service::read_slots(&state).await?;
    Ok(Json(view.into()))
}

async fn require_cron_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state
        .config()
        .cron_token
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("cron secret not configured".into()))?;

    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    if provided != expected {
        return Err(AppError::Unauthorized("invalid cron secret".into()));
    }

    Ok(next.run(req).await)
}
