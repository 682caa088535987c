use crate::random::{RandomSource, shuffle};
use crate::schedule::RoundSpec;
use prl_core::{Liking, LikingBin, ResponseSource, Side, StimulusCatalog, StimulusId};
use serde::Serialize;
use std::collections::HashMap;

/// Group id -> side that counts as correct for the whole round.
pub type KeyMap = HashMap<String, Side>;

/// One trial of a round. Pending until `response` is filled in, exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub group_id: String,
    pub group_label: String,
    pub liking: Liking,
    pub stimulus: StimulusId,
    /// 1-based repetition index within the group.
    pub trial_in_group: usize,
    /// 1-based position in the round, fixed after the final shuffle.
    pub trial_index: usize,
    pub round: u32,
    pub difficulty: String,
    pub difficulty_round: u8,
    pub p_correct: f64,
    pub response: Option<TrialResponse>,
}

/// Everything attached to a trial when the participant answers it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResponse {
    pub response_side: Side,
    pub response_source: ResponseSource,
    pub assigned_side: Side,
    pub is_correct_choice: bool,
    pub feedback_positive: bool,
    pub reward: u8,
    pub rt_ms: u64,
    pub timestamp_ms: u64,
    pub state_id: u32,
    pub action: u8,
    pub liking_bin: LikingBin,
}

impl Trial {
    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }

    /// Attaches the response. A trial that already has one is left as is.
    pub(crate) fn record(&mut self, response: TrialResponse) -> bool {
        if self.response.is_some() {
            return false;
        }
        self.response = Some(response);
        true
    }
}

/// One fair coin per active group.
pub fn assign_keys<R>(group_ids: &[String], rng: &mut R) -> KeyMap
where
    R: RandomSource + ?Sized,
{
    group_ids
        .iter()
        .map(|gid| {
            let side = if rng.uniform() > 0.5 {
                Side::Left
            } else {
                Side::Right
            };
            (gid.clone(), side)
        })
        .collect()
}

/// Expands a round into its randomized trial sequence.
///
/// Each group contributes `trials_per_group` trials cycling through its
/// stimuli. The per-group list is shuffled, the concatenation is shuffled
/// again, and only then are global indices assigned. Round metadata is
/// copied into every trial.
pub fn build_trials<R>(round: &RoundSpec, catalog: &StimulusCatalog, rng: &mut R) -> Vec<Trial>
where
    R: RandomSource + ?Sized,
{
    let mut trials = Vec::with_capacity(round.total_trials());
    for group in round.group_ids.iter().filter_map(|id| catalog.get(id)) {
        let per_group: Vec<Trial> = (0..round.trials_per_group)
            .map(|i| Trial {
                group_id: group.id.clone(),
                group_label: group.label.clone(),
                liking: group.liking,
                stimulus: group.stimuli[i % group.stimuli.len()].clone(),
                trial_in_group: i + 1,
                trial_index: 0,
                round: round.round,
                difficulty: round.difficulty.clone(),
                difficulty_round: round.difficulty_round,
                p_correct: round.p_correct,
                response: None,
            })
            .collect();
        trials.extend(shuffle(rng, per_group));
    }

    let mut trials = shuffle(rng, trials);
    for (idx, trial) in trials.iter_mut().enumerate() {
        trial.trial_index = idx + 1;
    }
    trials
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{RngSource, ScriptedSource};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn round(group_ids: &[&str], trials_per_group: usize) -> RoundSpec {
        RoundSpec {
            id: "round-1".into(),
            round: 1,
            name: "Round 1".into(),
            p_correct: 0.9,
            difficulty: "easy".into(),
            difficulty_round: 0,
            n_groups: group_ids.len(),
            trials_per_group,
            group_ids: group_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn each_group_cycles_through_its_stimuli() {
        let catalog = StimulusCatalog::default();
        let mut rng = RngSource::new(StdRng::seed_from_u64(42));
        let trials = build_trials(&round(&["G1", "G4", "G6"], 30), &catalog, &mut rng);
        assert_eq!(trials.len(), 90);

        for gid in ["G1", "G4", "G6"] {
            let group = catalog.get(gid).unwrap();
            let mine: Vec<&Trial> = trials.iter().filter(|t| t.group_id == gid).collect();
            assert_eq!(mine.len(), 30);
            for stim in &group.stimuli {
                assert_eq!(mine.iter().filter(|t| &t.stimulus == stim).count(), 3);
            }
            let mut reps: Vec<usize> = mine.iter().map(|t| t.trial_in_group).collect();
            reps.sort_unstable();
            assert_eq!(reps, (1..=30).collect::<Vec<_>>());
        }

        let indices: Vec<usize> = trials.iter().map(|t| t.trial_index).collect();
        assert_eq!(indices, (1..=90).collect::<Vec<_>>());
        assert!(trials.iter().all(|t| t.p_correct == 0.9 && t.response.is_none()));
    }

    #[test]
    fn stimulus_wraps_modulo_group_size() {
        let catalog = StimulusCatalog::default();
        let mut rng = ScriptedSource::new();
        let trials = build_trials(&round(&["G2"], 12), &catalog, &mut rng);
        let stimuli = &catalog.get("G2").unwrap().stimuli;
        assert_eq!(trials[10].stimulus, stimuli[0]);
        assert_eq!(trials[11].trial_in_group, 12);
        assert_eq!(trials[11].stimulus, stimuli[1]);
    }

    #[test]
    fn unknown_groups_are_skipped() {
        let catalog = StimulusCatalog::default();
        let mut rng = ScriptedSource::new();
        let trials = build_trials(&round(&["G1", "nope"], 4), &catalog, &mut rng);
        assert_eq!(trials.len(), 4);
    }

    #[test]
    fn key_assignment_is_one_coin_per_group() {
        let ids: Vec<String> = vec!["G1".into(), "G2".into(), "G3".into()];
        let mut rng = ScriptedSource::with_uniforms(vec![0.9, 0.1, 0.5]);
        let keys = assign_keys(&ids, &mut rng);
        assert_eq!(keys["G1"], Side::Left);
        assert_eq!(keys["G2"], Side::Right);
        assert_eq!(keys["G3"], Side::Right);
    }

    #[test]
    fn record_is_write_once() {
        let catalog = StimulusCatalog::default();
        let mut rng = ScriptedSource::new();
        let mut trial = build_trials(&round(&["G1"], 1), &catalog, &mut rng).remove(0);
        let response = TrialResponse {
            response_side: Side::Left,
            response_source: ResponseSource::Key,
            assigned_side: Side::Left,
            is_correct_choice: true,
            feedback_positive: true,
            reward: 1,
            rt_ms: 412,
            timestamp_ms: 1,
            state_id: 1,
            action: 0,
            liking_bin: LikingBin::Like,
        };
        assert!(trial.record(response.clone()));
        let mut second = response;
        second.rt_ms = 9;
        assert!(!trial.record(second));
        assert_eq!(trial.response.as_ref().map(|r| r.rt_ms), Some(412));
    }
}
