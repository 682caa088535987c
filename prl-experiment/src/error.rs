use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, surfaced before any trial is presented.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stimulus catalog is empty")]
    EmptyCatalog,

    #[error("duplicate group id '{0}'")]
    DuplicateGroup(String),

    #[error("group '{0}' has no stimuli")]
    EmptyGroup(String),

    #[error("round template is empty")]
    EmptyTemplate,

    #[error("round {round} requests no groups")]
    NoGroups { round: u32 },

    #[error("round {round} requests {requested} groups but the catalog has {available}")]
    TooManyGroups {
        round: u32,
        requested: usize,
        available: usize,
    },

    #[error("round {round} has zero trials per group")]
    NoTrials { round: u32 },

    #[error("round {round} reward probability {p} is outside (0, 1]")]
    RewardProbability { round: u32, p: f64 },

    #[error("rating scale {min}..={max} has no range")]
    RatingScale { min: u8, max: u8 },

    #[error("first rounds draw {covered} groups but the catalog has {groups}; not every group can appear")]
    InsufficientCoverage { covered: usize, groups: usize },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Preconditions that block a participant-facing operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("enter a participant id before starting a round")]
    MissingParticipant,

    #[error("rating {value} is outside the scale {min}..={max}")]
    RatingOutOfRange { value: u8, min: u8, max: u8 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no trial data to export; run the experiment first")]
    NoTrials,

    #[error("no answered trials or ratings to export yet")]
    NoRows,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
