use serde::{Deserialize, Serialize};
use std::fmt;

/// Trial runner states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No round has been started yet.
    Ready,
    /// Between trials: a round is loaded but no trial is accepting a choice.
    Idle,
    AwaitingResponse,
    RoundComplete,
    AllRoundsComplete,
}

/// Bounded rating scale shown to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: u8,
    pub max: u8,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 1, max: 9 }
    }
}

impl RatingScale {
    pub fn midpoint(&self) -> f64 {
        (self.min as f64 + self.max as f64) / 2.0
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Bins a participant rating against the scale midpoint.
    pub fn bin(&self, rating: u8) -> LikingBin {
        let r = rating as f64;
        let mid = self.midpoint();
        if r > mid {
            LikingBin::Like
        } else if r < mid {
            LikingBin::Dislike
        } else {
            LikingBin::Excluded
        }
    }
}

/// Participant-specific liking classification of one stimulus.
///
/// `Excluded` marks a rating exactly at the scale midpoint. Downstream
/// analysis filters on it, so it must stay distinct from the static
/// fallback used when no rating exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikingBin {
    Like,
    Dislike,
    Excluded,
}

impl LikingBin {
    /// Export cell: `1`, `0` or empty.
    pub fn as_cell(&self) -> &'static str {
        match self {
            LikingBin::Like => "1",
            LikingBin::Dislike => "0",
            LikingBin::Excluded => "",
        }
    }
}

impl fmt::Display for LikingBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cell())
    }
}
