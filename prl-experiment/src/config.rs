use crate::error::ConfigError;
use prl_core::{KeyBindings, RatingScale, StimulusCatalog};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One entry of the round template. Group ids are assigned later, when the
/// schedule is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTemplate {
    pub round: u32,
    pub name: String,
    pub p_correct: f64,
    pub difficulty: String,
    pub difficulty_round: u8,
    pub n_groups: usize,
    pub trials_per_group: usize,
}

impl RoundTemplate {
    pub fn new(
        round: u32,
        p_correct: f64,
        difficulty: &str,
        difficulty_round: u8,
        n_groups: usize,
    ) -> Self {
        Self {
            round,
            name: format!("Round {round}"),
            p_correct,
            difficulty: difficulty.to_string(),
            difficulty_round,
            n_groups,
            trials_per_group: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub groups: StimulusCatalog,
    pub schedule_template: Vec<RoundTemplate>,
    pub rating_scale: RatingScale,
    pub response_keys: KeyBindings,
    /// Feedback display time before the next trial is presented.
    pub feedback_delay_ms: u64,
    /// User-facing session label used when the operator leaves it blank.
    pub default_session_label: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            groups: StimulusCatalog::default(),
            schedule_template: vec![
                RoundTemplate::new(1, 0.9, "easy", 0, 3),
                RoundTemplate::new(2, 0.7, "hard", 1, 4),
                RoundTemplate::new(3, 0.9, "easy", 0, 3),
                RoundTemplate::new(4, 0.7, "hard", 1, 3),
            ],
            rating_scale: RatingScale::default(),
            response_keys: KeyBindings::default(),
            feedback_delay_ms: 700,
            default_session_label: "session-1".to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.groups)?;
        validate_template(&self.groups, &self.schedule_template)?;
        let scale = self.rating_scale;
        if scale.min >= scale.max {
            return Err(ConfigError::RatingScale {
                min: scale.min,
                max: scale.max,
            });
        }
        Ok(())
    }
}

pub fn validate_catalog(catalog: &StimulusCatalog) -> Result<(), ConfigError> {
    if catalog.is_empty() {
        return Err(ConfigError::EmptyCatalog);
    }
    let mut seen = HashSet::new();
    for group in catalog.groups() {
        if !seen.insert(group.id.as_str()) {
            return Err(ConfigError::DuplicateGroup(group.id.clone()));
        }
        if group.stimuli.is_empty() {
            return Err(ConfigError::EmptyGroup(group.id.clone()));
        }
    }
    Ok(())
}

/// Checks every round against the catalog, and that the first two rounds
/// together draw at least as many groups as the catalog holds.
pub fn validate_template(
    catalog: &StimulusCatalog,
    template: &[RoundTemplate],
) -> Result<(), ConfigError> {
    if catalog.is_empty() {
        return Err(ConfigError::EmptyCatalog);
    }
    if template.is_empty() {
        return Err(ConfigError::EmptyTemplate);
    }
    let available = catalog.len();
    for t in template {
        if t.n_groups == 0 {
            return Err(ConfigError::NoGroups { round: t.round });
        }
        if t.n_groups > available {
            return Err(ConfigError::TooManyGroups {
                round: t.round,
                requested: t.n_groups,
                available,
            });
        }
        if t.trials_per_group == 0 {
            return Err(ConfigError::NoTrials { round: t.round });
        }
        if !(t.p_correct > 0.0 && t.p_correct <= 1.0) {
            return Err(ConfigError::RewardProbability {
                round: t.round,
                p: t.p_correct,
            });
        }
    }
    let covered: usize = template.iter().take(2).map(|t| t.n_groups).sum();
    if covered < available {
        return Err(ConfigError::InsufficientCoverage {
            covered,
            groups: available,
        });
    }
    Ok(())
}
