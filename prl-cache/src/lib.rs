pub mod cache;

pub use cache::{Atom, StateRegistry, StimulusId};
