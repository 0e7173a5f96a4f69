//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::Rank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub body: String,
}

/// Per-star vote tallies; a post nobody voted on has all zeroes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStatisticsRecord {
    pub star1: i64,
    pub star2: i64,
    pub star3: i64,
    pub star4: i64,
    pub star5: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInfo {
    pub post: PostRecord,
    pub statistics: PostStatisticsRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub rank: Rank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub rank: Rank,
}

impl From<&UserRecord> for UserInfo {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            rank: record.rank,
        }
    }
}
