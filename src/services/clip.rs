//! Clip placement inside the daily track.

use rand::{Rng, rng};

use crate::dao::media::MediaError;

/// Placement rules for the daily clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRules {
    /// Seconds subtracted from the random draw so the clip starts a little
    /// before the drawn position.
    pub lead_in_secs: u32,
    /// Minimum playable length that must remain after the start offset.
    pub window_secs: u32,
}

impl Default for ClipRules {
    fn default() -> Self {
        Self {
            lead_in_secs: 7,
            window_secs: 6,
        }
    }
}

impl ClipRules {
    /// Reject tracks that cannot hold a full clip window.
    pub fn ensure_playable(&self, duration: u32) -> Result<(), MediaError> {
        if duration < self.window_secs {
            return Err(MediaError::TrackTooShort {
                duration,
                window: self.window_secs,
            });
        }
        Ok(())
    }

    /// Start offset for a raw `draw`: `draw - lead_in`, floored at zero and
    /// capped so that `offset + window <= duration`.
    pub fn start_offset(&self, draw: u32, duration: u32) -> u32 {
        draw.saturating_sub(self.lead_in_secs)
            .min(duration.saturating_sub(self.window_secs))
    }
}

/// Randomness used by the staging selector.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `[0, catalog_size)`.
    fn catalog_index(&self, catalog_size: u64) -> u64;
    /// Uniform draw in `[0, duration)`.
    fn offset_draw(&self, duration: u32) -> u32;
}

/// [`RandomSource`] backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn catalog_index(&self, catalog_size: u64) -> u64 {
        if catalog_size == 0 {
            return 0;
        }
        rng().random_range(0..catalog_size)
    }

    fn offset_draw(&self, duration: u32) -> u32 {
        if duration == 0 {
            return 0;
        }
        rng().random_range(0..duration)
    }
}
