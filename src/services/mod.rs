/// Clip placement rules and randomness.
pub mod clip;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Choice between the signed asset URL and the raw catalog link.
pub mod link_policy;
/// Step runner shared by the rotation runs.
pub mod pipeline;
/// Rollover reconciler promoting the staged song.
pub mod rollover_service;
/// Read-only view of the daily song slots.
pub mod slot_service;
/// Staging selector preparing tomorrow's song.
pub mod staging_service;
/// Store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
#[cfg(test)]
pub(crate) mod test_support;
