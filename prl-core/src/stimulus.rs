use prl_cache::StimulusId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static liking category of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liking {
    High,
    Low,
}

impl Liking {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liking::High => "high",
            Liking::Low => "low",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Liking::High)
    }
}

impl fmt::Display for Liking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named cluster of stimuli sharing one liking category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub label: String,
    pub liking: Liking,
    pub stimuli: Vec<StimulusId>,
}

/// Registry of stimulus groups, fixed for the whole process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusCatalog {
    groups: Vec<Group>,
}

impl StimulusCatalog {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn get(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every (group, stimulus) pair in catalog order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Group, &StimulusId)> {
        self.groups
            .iter()
            .flat_map(|g| g.stimuli.iter().map(move |s| (g, s)))
    }
}

fn group(id: &str, label: &str, liking: Liking, images: &[&str]) -> Group {
    Group {
        id: id.to_string(),
        label: label.to_string(),
        liking,
        stimuli: images.iter().map(|s| StimulusId::new(s)).collect(),
    }
}

impl Default for StimulusCatalog {
    /// Six image groups, three high-liking and three low-liking, ten images each.
    fn default() -> Self {
        Self::new(vec![
            group(
                "G1",
                "puppies",
                Liking::High,
                &[
                    "images(1)/images/puppies/download.jpg",
                    "images(1)/images/puppies/images (1).jpg",
                    "images(1)/images/puppies/images (2).jpg",
                    "images(1)/images/puppies/images (3).jpg",
                    "images(1)/images/puppies/images (4).jpg",
                    "images(1)/images/puppies/images (5).jpg",
                    "images(1)/images/puppies/images (6).jpg",
                    "images(1)/images/puppies/images 3.jpg",
                    "images(1)/images/puppies/images.jpg",
                    "images(1)/images/puppies/images1.jpg",
                ],
            ),
            group(
                "G2",
                "nature",
                Liking::High,
                &[
                    "images(1)/images/natrure/7.jpg",
                    "images(1)/images/natrure/download (1).jpg",
                    "images(1)/images/natrure/download (2).jpg",
                    "images(1)/images/natrure/download.jpg",
                    "images(1)/images/natrure/images (1).jpg",
                    "images(1)/images/natrure/images (2).jpg",
                    "images(1)/images/natrure/images (3).jpg",
                    "images(1)/images/natrure/images (4).jpg",
                    "images(1)/images/natrure/images (6).jpg",
                    "images(1)/images/natrure/images.jpg",
                ],
            ),
            group(
                "G3",
                "babies",
                Liking::High,
                &[
                    "images(1)/images/babies/download (3).jpg",
                    "images(1)/images/babies/download.jpg",
                    "images(1)/images/babies/images (1).jpg",
                    "images(1)/images/babies/images (2).jpg",
                    "images(1)/images/babies/images (3).jpg",
                    "images(1)/images/babies/images (4).jpg",
                    "images(1)/images/babies/images (5).jpg",
                    "images(1)/images/babies/images (7).jpg",
                    "images(1)/images/babies/images.jpg",
                    "images(1)/images/babies/images1.jpg",
                ],
            ),
            group(
                "G4",
                "alcohol",
                Liking::Low,
                &[
                    "images(1)/images/alchohol/1.jpg",
                    "images(1)/images/alchohol/download (1).jpg",
                    "images(1)/images/alchohol/download.jpg",
                    "images(1)/images/alchohol/images (1).jpg",
                    "images(1)/images/alchohol/images (2).jpg",
                    "images(1)/images/alchohol/images (3).jpg",
                    "images(1)/images/alchohol/images (4).jpg",
                    "images(1)/images/alchohol/images (5).jpg",
                    "images(1)/images/alchohol/images (6).jpg",
                    "images(1)/images/alchohol/images.jpg",
                ],
            ),
            group(
                "G5",
                "neutral",
                Liking::Low,
                &[
                    "images(1)/images/neutral/download (1).jpg",
                    "images(1)/images/neutral/download (2).jpg",
                    "images(1)/images/neutral/download (3).jpg",
                    "images(1)/images/neutral/download (4).jpg",
                    "images(1)/images/neutral/download (5).jpg",
                    "images(1)/images/neutral/download (6).jpg",
                    "images(1)/images/neutral/download (7).jpg",
                    "images(1)/images/neutral/download.jpg",
                    "images(1)/images/neutral/images (1).jpg",
                    "images(1)/images/neutral/images.jpg",
                ],
            ),
            group(
                "G6",
                "negative",
                Liking::Low,
                &[
                    "images(1)/images/negative/4.jpg",
                    "images(1)/images/negative/download (1).jpg",
                    "images(1)/images/negative/download (2).jpg",
                    "images(1)/images/negative/download (3).jpg",
                    "images(1)/images/negative/download (4).jpg",
                    "images(1)/images/negative/download (5).jpg",
                    "images(1)/images/negative/download (6).jpg",
                    "images(1)/images/negative/download.jpg",
                    "images(1)/images/negative/images (1).jpg",
                    "images(1)/images/negative/images.jpg",
                ],
            ),
        ])
    }
}
