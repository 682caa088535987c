pub mod input;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use input::{ChoiceEvent, KeyBindings, ResponseSource, Side};
pub use phase::SessionPhase;
pub use prl_cache::{StateRegistry, StimulusId};
pub use stimulus::{Group, Liking, StimulusCatalog};
pub use trial::{LikingBin, RatingScale, RunnerState};
