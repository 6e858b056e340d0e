use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Catalog entry the daily song is drawn from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Stable identifier of the song.
    pub id: String,
    /// Display name of the song.
    pub name: String,
    /// Album the song belongs to, when the catalog knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Locator of the source media (e.g. a video URL).
    pub link: String,
    /// Cover art reference.
    pub cover: String,
}

impl SongEntity {
    /// Album shown to players, falling back to the song name for catalog
    /// entries without album metadata.
    pub fn album_or_name(&self) -> &str {
        self.album.as_deref().unwrap_or(&self.name)
    }
}

/// Key of one of the two daily song slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    /// Song players are guessing today.
    Current,
    /// Song staged for the next rollover.
    Next,
}

impl SlotKey {
    /// Store key of the slot.
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKey::Current => "current",
            SlotKey::Next => "next",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a daily song slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySongEntity {
    /// Display name of the song.
    pub name: String,
    /// Album shown alongside the song.
    pub album: String,
    /// Cover art reference.
    pub cover: String,
    /// Playable link (signed asset URL or raw catalog link).
    pub link: String,
    /// Offset (seconds) where the clip starts in the source track.
    pub start_time: u32,
    /// Day-sequence number; legacy records may lack it.
    #[serde(default)]
    pub heardle_day: Option<u32>,
    /// Set on `current` once a rollover has settled the streaks of its day
    /// but has not promoted `next` yet.
    #[serde(default, skip_serializing_if = "is_false")]
    pub settled: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Registered player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier of the user.
    pub id: String,
    /// Public handle, if the user picked one.
    #[serde(default)]
    pub username: Option<String>,
}

/// Lifetime statistics of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsEntity {
    /// Owner of the statistics.
    pub user_id: String,
    pub games_played: u32,
    pub games_won: u32,
    /// Consecutive days completed correctly.
    pub current_streak: u32,
    pub max_streak: u32,
}

impl StatisticsEntity {
    /// Zeroed statistics for a user that never had a record.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            games_played: 0,
            games_won: 0,
            current_streak: 0,
            max_streak: 0,
        }
    }
}

/// Outcome of a single guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuessOutcome {
    Correct,
    Incorrect,
    /// Guess recorded while the round is still being played.
    Pending,
}

/// One guess of the ongoing day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuessedSongEntity {
    /// Name of the song the user guessed (empty for a skipped turn).
    pub name: String,
    pub outcome: GuessOutcome,
}

/// Ordered guesses of a user for the ongoing day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuessesEntity {
    /// Owner of the guesses.
    pub user_id: String,
    /// Guesses in the order they were made.
    pub songs: Vec<GuessedSongEntity>,
}

impl GuessesEntity {
    /// Whether the last recorded guess is a correct one.
    pub fn completed_daily(&self) -> bool {
        self.songs
            .last()
            .is_some_and(|guess| guess.outcome == GuessOutcome::Correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guesses(outcomes: &[GuessOutcome]) -> GuessesEntity {
        GuessesEntity {
            user_id: "user-1".into(),
            songs: outcomes
                .iter()
                .enumerate()
                .map(|(index, outcome)| GuessedSongEntity {
                    name: format!("guess {index}"),
                    outcome: *outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn completed_only_when_last_guess_is_correct() {
        use GuessOutcome::*;

        assert!(guesses(&[Incorrect, Correct]).completed_daily());
        assert!(!guesses(&[Correct, Incorrect]).completed_daily());
        assert!(!guesses(&[Incorrect, Pending]).completed_daily());
        assert!(!guesses(&[]).completed_daily());
    }

    #[test]
    fn outcome_uses_screaming_case_on_the_wire() {
        let json = serde_json::to_string(&GuessOutcome::Correct).unwrap();
        assert_eq!(json, "\"CORRECT\"");
    }

    #[test]
    fn album_falls_back_to_song_name() {
        let mut song = SongEntity {
            id: "s1".into(),
            name: "Blue Monday".into(),
            album: None,
            link: "https://example.com/watch?v=1".into(),
            cover: "cover.jpg".into(),
        };
        assert_eq!(song.album_or_name(), "Blue Monday");

        song.album = Some("Power, Corruption & Lies".into());
        assert_eq!(song.album_or_name(), "Power, Corruption & Lies");
    }
}
