//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_rank", rename_all = "snake_case")]
pub enum Rank {
    #[default]
    Bronze,
    Silver,
    Gold,
}

impl Rank {
    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Bronze => "bronze",
            Rank::Silver => "silver",
            Rank::Gold => "gold",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single vote, one to five stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Star(u8);

impl Star {
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(format!(
                "star must be between 1 and 5, got {value}"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Column holding this star's tally in `post_statistics`.
    pub fn column(self) -> &'static str {
        match self.0 {
            1 => "star1",
            2 => "star2",
            3 => "star3",
            4 => "star4",
            _ => "star5",
        }
    }
}

impl TryFrom<u8> for Star {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Star> for u8 {
    fn from(star: Star) -> Self {
        star.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_rejects_out_of_range() {
        assert!(Star::new(0).is_err());
        assert!(Star::new(6).is_err());
        assert_eq!(Star::new(3).unwrap().column(), "star3");
    }

    #[test]
    fn star_deserializes_with_range_check() {
        let star: Star = serde_json::from_str("5").unwrap();
        assert_eq!(star.get(), 5);
        assert!(serde_json::from_str::<Star>("9").is_err());
    }

    #[test]
    fn rank_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Rank::Gold).unwrap(), "\"gold\"");
        let rank: Rank = serde_json::from_str("\"silver\"").unwrap();
        assert_eq!(rank, Rank::Silver);
    }
}
