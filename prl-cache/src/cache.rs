use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
pub use string_cache::DefaultAtom as Atom;

/// Interned stimulus identifier (an image path in the default catalog).
///
/// Trials copy their stimulus id around a lot, so the string is interned
/// once and every clone is a pointer copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StimulusId(Atom);

impl StimulusId {
    pub fn new(s: &str) -> Self {
        Self(Atom::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StimulusId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StimulusId {
    fn from(s: String) -> Self {
        Self(Atom::from(s))
    }
}

impl From<StimulusId> for String {
    fn from(id: StimulusId) -> Self {
        id.0.to_string()
    }
}

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session table of stable numeric state ids.
///
/// Ids start at 1 and are handed out in first-encounter order. Once a
/// stimulus has an id it keeps it for the lifetime of the registry.
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    ids: HashMap<StimulusId, u32>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `stimulus`, assigning the next one if unseen.
    pub fn intern(&mut self, stimulus: &StimulusId) -> u32 {
        let next = self.ids.len() as u32 + 1;
        *self.ids.entry(stimulus.clone()).or_insert(next)
    }

    /// Current count of registered stimuli
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
