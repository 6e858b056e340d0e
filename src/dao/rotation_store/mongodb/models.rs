use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    DailySongEntity, GuessedSongEntity, GuessesEntity, SongEntity, StatisticsEntity, UserEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSongDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    album: Option<String>,
    link: String,
    cover: String,
}

impl From<MongoSongDocument> for SongEntity {
    fn from(value: MongoSongDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            album: value.album,
            link: value.link,
            cover: value.cover,
        }
    }
}

/// Daily song slot keyed by `current` / `next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSlotDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    album: String,
    cover: String,
    link: String,
    start_time: u32,
    #[serde(default)]
    heardle_day: Option<u32>,
    #[serde(default)]
    settled: bool,
}

impl From<(&'static str, DailySongEntity)> for MongoSlotDocument {
    fn from((key, slot): (&'static str, DailySongEntity)) -> Self {
        Self {
            id: key.to_owned(),
            name: slot.name,
            album: slot.album,
            cover: slot.cover,
            link: slot.link,
            start_time: slot.start_time,
            heardle_day: slot.heardle_day,
            settled: slot.settled,
        }
    }
}

impl From<MongoSlotDocument> for DailySongEntity {
    fn from(value: MongoSlotDocument) -> Self {
        Self {
            name: value.name,
            album: value.album,
            cover: value.cover,
            link: value.link,
            start_time: value.start_time,
            heardle_day: value.heardle_day,
            settled: value.settled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    username: Option<String>,
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            username: value.username,
        }
    }
}

/// Statistics stored under the owning user's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatisticsDocument {
    #[serde(rename = "_id")]
    user_id: String,
    #[serde(default)]
    games_played: u32,
    #[serde(default)]
    games_won: u32,
    #[serde(default)]
    current_streak: u32,
    #[serde(default)]
    max_streak: u32,
}

impl From<StatisticsEntity> for MongoStatisticsDocument {
    fn from(value: StatisticsEntity) -> Self {
        Self {
            user_id: value.user_id,
            games_played: value.games_played,
            games_won: value.games_won,
            current_streak: value.current_streak,
            max_streak: value.max_streak,
        }
    }
}

impl From<MongoStatisticsDocument> for StatisticsEntity {
    fn from(value: MongoStatisticsDocument) -> Self {
        Self {
            user_id: value.user_id,
            games_played: value.games_played,
            games_won: value.games_won,
            current_streak: value.current_streak,
            max_streak: value.max_streak,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGuessesDocument {
    #[serde(rename = "_id")]
    user_id: String,
    #[serde(default)]
    songs: Vec<GuessedSongEntity>,
}

impl From<MongoGuessesDocument> for GuessesEntity {
    fn from(value: MongoGuessesDocument) -> Self {
        Self {
            user_id: value.user_id,
            songs: value.songs,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
