//! Vote direction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PixcacheError;

/// A single up/down vote on a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    /// Signed contribution to `rating_sum`.
    pub fn delta(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

impl TryFrom<i64> for Vote {
    type Error = PixcacheError;

    fn try_from(delta: i64) -> Result<Self, Self::Error> {
        match delta {
            1 => Ok(Vote::Up),
            -1 => Ok(Vote::Down),
            other => Err(PixcacheError::InvalidInput(format!(
                "vote delta must be +1 or -1, got {other}"
            ))),
        }
    }
}

impl FromStr for Vote {
    type Err = PixcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "+1" | "1" => Ok(Vote::Up),
            "down" | "-1" => Ok(Vote::Down),
            other => Err(PixcacheError::InvalidInput(format!(
                "unknown vote '{other}', expected up or down"
            ))),
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Up => f.write_str("up"),
            Vote::Down => f.write_str("down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_signs() {
        assert_eq!(Vote::Up.delta(), 1);
        assert_eq!(Vote::Down.delta(), -1);
    }

    #[test]
    fn parse_words_and_signs() {
        assert_eq!("UP".parse::<Vote>().unwrap(), Vote::Up);
        assert_eq!("+1".parse::<Vote>().unwrap(), Vote::Up);
        assert_eq!(" down ".parse::<Vote>().unwrap(), Vote::Down);
        assert_eq!("-1".parse::<Vote>().unwrap(), Vote::Down);
        assert!("sideways".parse::<Vote>().is_err());
    }

    #[test]
    fn only_unit_deltas_convert() {
        assert_eq!(Vote::try_from(1).unwrap(), Vote::Up);
        assert_eq!(Vote::try_from(-1).unwrap(), Vote::Down);
        assert!(Vote::try_from(2).is_err());
        assert!(Vote::try_from(0).is_err());
    }
}
