use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Heardle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::cron::stage_daily_song,
        crate::routes::cron::roll_over_daily_song,
        crate::routes::cron::daily_song_slots,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::cron::DailySongSlot,
            crate::dto::cron::AssetReference,
            crate::dto::cron::StageResponse,
            crate::dto::cron::RolloverResponse,
            crate::dto::cron::SlotsResponse,
            crate::dto::cron::ErrorResponse,
            crate::services::link_policy::LinkSource,
            crate::services::pipeline::PipelineStep,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "cron", description = "Daily song rotation triggers"),
    )
)]
pub struct ApiDoc;
