pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod random;
pub mod rating;
pub mod schedule;
pub mod session;
pub mod state;
pub mod trial;

pub use config::{ExperimentConfig, RoundTemplate};
pub use error::{ConfigError, ExportError, SessionError};
pub use export::{DirectorySink, ExportRow, ExportSink, MemorySink};
pub use random::{RandomSource, RngSource, ScriptedSource};
pub use rating::{RatingLookup, RatingRecord, RatingSession};
pub use schedule::{RoundSpec, build_schedule};
pub use session::Session;
pub use state::{Feedback, RunInfo, RunnerEvent, TrialRunner};
pub use trial::{Trial, TrialResponse, assign_keys, build_trials};
