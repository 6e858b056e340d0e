//! Step-by-step execution of the rotation runs.
//!
//! Each step runs under its own timeout and the shared shutdown token; the
//! first failing step ends the run and is reported alongside its cause.

use std::{fmt, future::Future, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::ServiceError;

/// Named unit of work inside a rotation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ReadSlots,
    SampleSong,
    ResolveDuration,
    FetchClip,
    UploadClip,
    SignUrl,
    SaveNext,
    ReconcileUsers,
    MarkSettled,
    PurgeGuesses,
    PromoteNext,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::ReadSlots => "read_slots",
            PipelineStep::SampleSong => "sample_song",
            PipelineStep::ResolveDuration => "resolve_duration",
            PipelineStep::FetchClip => "fetch_clip",
            PipelineStep::UploadClip => "upload_clip",
            PipelineStep::SignUrl => "sign_url",
            PipelineStep::SaveNext => "save_next",
            PipelineStep::ReconcileUsers => "reconcile_users",
            PipelineStep::MarkSettled => "mark_settled",
            PipelineStep::PurgeGuesses => "purge_guesses",
            PipelineStep::PromoteNext => "promote_next",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a rotation run at a given step.
#[derive(Debug, Error)]
#[error("step `{step}` failed: {source}")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: ServiceError,
}

/// Time budgets for the pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    /// Store reads/writes and metadata lookups.
    pub step: Duration,
    /// Clip download and upload.
    pub transfer: Duration,
    /// Whole per-user reconciliation loop.
    pub batch: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(30),
            transfer: Duration::from_secs(120),
            batch: Duration::from_secs(300),
        }
    }
}

impl StepTimeouts {
    pub fn for_step(&self, step: PipelineStep) -> Duration {
        match step {
            PipelineStep::FetchClip | PipelineStep::UploadClip => self.transfer,
            PipelineStep::ReconcileUsers => self.batch,
            _ => self.step,
        }
    }
}

/// Runs pipeline steps with timeouts and cancellation.
#[derive(Clone)]
pub struct StepRunner {
    timeouts: StepTimeouts,
    cancel: CancellationToken,
}

impl StepRunner {
    pub fn new(timeouts: StepTimeouts, cancel: CancellationToken) -> Self {
        Self { timeouts, cancel }
    }

    /// Drive `work` to completion, converting any failure, timeout or
    /// cancellation into a [`PipelineError`] tagged with `step`.
    pub async fn run<T, Fut>(&self, step: PipelineStep, work: Fut) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let limit = self.timeouts.for_step(step);
        debug!(%step, timeout_ms = limit.as_millis(), "running pipeline step");

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            result = timeout(limit, work) => match result {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout),
            },
        };

        outcome.map_err(|source| {
            warn!(%step, error = %source, "pipeline step failed");
            PipelineError { step, source }
        })
    }
}
