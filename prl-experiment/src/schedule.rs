use crate::config::{RoundTemplate, validate_template};
use crate::error::ConfigError;
use crate::random::RandomSource;
use prl_core::StimulusCatalog;
use serde::Serialize;
use tracing::debug;

/// A round of the session with its active groups fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSpec {
    pub id: String,
    pub round: u32,
    pub name: String,
    pub p_correct: f64,
    pub difficulty: String,
    pub difficulty_round: u8,
    pub n_groups: usize,
    pub trials_per_group: usize,
    pub group_ids: Vec<String>,
}

impl RoundSpec {
    fn from_template(t: &RoundTemplate, group_ids: Vec<String>) -> Self {
        Self {
            id: format!("round-{}", t.round),
            round: t.round,
            name: t.name.clone(),
            p_correct: t.p_correct,
            difficulty: t.difficulty.clone(),
            difficulty_round: t.difficulty_round,
            n_groups: t.n_groups,
            trials_per_group: t.trials_per_group,
            group_ids,
        }
    }

    pub fn total_trials(&self) -> usize {
        self.group_ids.len() * self.trials_per_group
    }
}

/// Assigns active groups to every template round.
///
/// The first two rounds take consecutive, wrapping slices of a single
/// random permutation of the catalog, so together they contain every group
/// as long as their group counts add up to the catalog size (checked by
/// [`validate_template`]). Later rounds draw an independent random subset.
pub fn build_schedule<R>(
    catalog: &StimulusCatalog,
    template: &[RoundTemplate],
    rng: &mut R,
) -> Result<Vec<RoundSpec>, ConfigError>
where
    R: RandomSource + ?Sized,
{
    validate_template(catalog, template)?;

    let all_ids = catalog.ids();
    let n = all_ids.len();
    let base_order = rng.permutation(n);
    let mut cursor = 0;

    let schedule: Vec<RoundSpec> = template
        .iter()
        .enumerate()
        .map(|(idx, t)| {
            let picks: Vec<usize> = if idx < 2 {
                let slice = (0..t.n_groups)
                    .map(|i| base_order[(cursor + i) % n])
                    .collect();
                cursor += t.n_groups;
                slice
            } else {
                rng.subset(n, t.n_groups)
            };
            let group_ids = picks.into_iter().map(|i| all_ids[i].to_string()).collect();
            RoundSpec::from_template(t, group_ids)
        })
        .collect();

    for spec in &schedule {
        debug!(round = spec.round, groups = ?spec.group_ids, p = spec.p_correct, "scheduled round");
    }
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{RngSource, ScriptedSource};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn template() -> Vec<RoundTemplate> {
        vec![
            RoundTemplate::new(1, 0.9, "easy", 0, 3),
            RoundTemplate::new(2, 0.7, "hard", 1, 4),
            RoundTemplate::new(3, 0.9, "easy", 0, 2),
        ]
    }

    #[test]
    fn first_two_rounds_wrap_through_base_order() {
        let catalog = StimulusCatalog::default();
        let mut rng = ScriptedSource::new();
        rng.push_permutation(vec![5, 4, 3, 2, 1, 0]);
        let schedule = build_schedule(&catalog, &template(), &mut rng).unwrap();

        assert_eq!(schedule[0].group_ids, vec!["G6", "G5", "G4"]);
        assert_eq!(schedule[1].group_ids, vec!["G3", "G2", "G1", "G6"]);
        // Scripted subsets take the first k catalog entries.
        assert_eq!(schedule[2].group_ids, vec!["G1", "G2"]);
        assert_eq!(schedule[1].id, "round-2");
        assert_eq!(schedule[0].total_trials(), 90);
    }

    #[test]
    fn first_two_rounds_cover_catalog_for_many_seeds() {
        let catalog = StimulusCatalog::default();
        for seed in 0..200 {
            let mut rng = RngSource::new(StdRng::seed_from_u64(seed));
            let schedule = build_schedule(&catalog, &template(), &mut rng).unwrap();
            let used: HashSet<&str> = schedule[..2]
                .iter()
                .flat_map(|r| r.group_ids.iter().map(String::as_str))
                .collect();
            assert_eq!(used.len(), 6, "seed {seed}");
            for spec in &schedule {
                let unique: HashSet<_> = spec.group_ids.iter().collect();
                assert_eq!(unique.len(), spec.n_groups);
            }
        }
    }

    #[test]
    fn output_follows_template_order() {
        let catalog = StimulusCatalog::default();
        let mut rng = RngSource::new(StdRng::seed_from_u64(1));
        let schedule = build_schedule(&catalog, &template(), &mut rng).unwrap();
        let rounds: Vec<u32> = schedule.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
        assert_eq!(schedule[1].p_correct, 0.7);
        assert_eq!(schedule[1].difficulty, "hard");
    }

    #[test]
    fn empty_catalog_is_a_config_error() {
        let mut rng = ScriptedSource::new();
        let err = build_schedule(&StimulusCatalog::new(vec![]), &template(), &mut rng).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCatalog));
    }
}
