use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical response side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Action code used by the learning models: left = 0, right = 1.
    pub fn action_code(&self) -> u8 {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a choice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Key,
    Pointer,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Key => "key",
            ResponseSource::Pointer => "pointer",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceEvent {
    pub side: Side,
    pub source: ResponseSource,
}

impl ChoiceEvent {
    pub fn key(side: Side) -> Self {
        Self {
            side,
            source: ResponseSource::Key,
        }
    }

    pub fn pointer(side: Side) -> Self {
        Self {
            side,
            source: ResponseSource::Pointer,
        }
    }
}

/// Key names bound to each response side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            left: vec!["ArrowLeft".into(), "a".into(), "A".into()],
            right: vec!["ArrowRight".into(), "l".into(), "L".into()],
        }
    }
}

impl KeyBindings {
    pub fn side_for(&self, key: &str) -> Option<Side> {
        if self.left.iter().any(|k| k == key) {
            Some(Side::Left)
        } else if self.right.iter().any(|k| k == key) {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// Maps a key press to a choice event, if the key is bound.
    pub fn choice_for(&self, key: &str) -> Option<ChoiceEvent> {
        self.side_for(key).map(ChoiceEvent::key)
    }
}
