//! Direction of a follow-graph sync.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{follow, stg_follow};

/// Which side of a user's follow graph is being synced.
///
/// For `Followers` the synced user is the edge target and every observed id
/// is a source. For `Friends` (accounts the user follows) it is the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Followers,
    Friends,
}

impl Direction {
    /// Build the `(source, target)` pair for an id observed on this side.
    #[must_use]
    pub fn pair(self, user_id: i64, observed: i64) -> (i64, i64) {
        match self {
            Direction::Followers => (observed, user_id),
            Direction::Friends => (user_id, observed),
        }
    }

    /// Column of `follow` that holds the synced user.
    #[must_use]
    pub fn user_column(self) -> follow::Column {
        match self {
            Direction::Followers => follow::Column::TargetUserId,
            Direction::Friends => follow::Column::SourceUserId,
        }
    }

    /// Column of `stg_follow` that holds the observed ids.
    #[must_use]
    pub fn staged_observed_column(self) -> stg_follow::Column {
        match self {
            Direction::Followers => stg_follow::Column::SourceUserId,
            Direction::Friends => stg_follow::Column::TargetUserId,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Followers => "followers",
            Direction::Friends => "friends",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "followers" => Ok(Direction::Followers),
            "friends" | "following" => Ok(Direction::Friends),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_places_user_on_the_synced_side() {
        assert_eq!(Direction::Followers.pair(1, 9), (9, 1));
        assert_eq!(Direction::Friends.pair(1, 9), (1, 9));
    }

    #[test]
    fn columns_agree_with_pair() {
        use sea_orm::IdenStatic;

        assert_eq!(Direction::Followers.user_column().as_str(), "target_user_id");
        assert_eq!(
            Direction::Followers.staged_observed_column().as_str(),
            "source_user_id"
        );
        assert_eq!(Direction::Friends.user_column().as_str(), "source_user_id");
        assert_eq!(
            Direction::Friends.staged_observed_column().as_str(),
            "target_user_id"
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Followers".parse::<Direction>(), Ok(Direction::Followers));
        assert_eq!("following".parse::<Direction>(), Ok(Direction::Friends));
        assert!("fans".parse::<Direction>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for direction in [Direction::Followers, Direction::Friends] {
            assert_eq!(direction.to_string().parse::<Direction>(), Ok(direction));
        }
    }
}
