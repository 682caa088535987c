pub mod analyze;
pub mod simulate;

use anyhow::{Context, Result};
use prl_experiment::ExperimentConfig;
use std::path::Path;

/// Built-in config, or the given JSON file merged over the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    let config = match path {
        Some(path) => ExperimentConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    config.validate().context("invalid experiment config")?;
    Ok(config)
}
