//! Summaries and a simple Q-learning fit over exported behavior rows.
//!
//! Rows are read back from the combined export; older exports that use
//! `participantId`, `trialIndex`, `responseSide` or `feedbackPositive`
//! columns are accepted too.

use crate::export::write_table;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One behavior trial, normalized for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorRecord {
    pub participant_id: String,
    pub round: u32,
    pub trial_index: usize,
    pub difficulty: String,
    pub difficulty_round: Option<u8>,
    pub state_id: usize,
    pub action: Option<u8>,
    pub reward: f64,
    pub is_correct_choice: Option<f64>,
    pub rt_ms: Option<f64>,
    /// `None` for ratings at the scale midpoint.
    pub liking_bin: Option<u8>,
}

fn cell<'a>(row: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    row.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn first<'a>(row: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| cell(row, k))
}

fn num<T: std::str::FromStr>(row: &HashMap<String, String>, keys: &[&str]) -> Option<T> {
    first(row, keys).and_then(|s| s.parse().ok())
}

impl BehaviorRecord {
    /// Normalizes parsed export rows, skipping anything that is not a
    /// behavior row.
    pub fn from_rows(rows: &[HashMap<String, String>]) -> Vec<BehaviorRecord> {
        let rows: Vec<&HashMap<String, String>> = rows
            .iter()
            .filter(|r| cell(r, "record_type").is_none_or(|t| t == "behavior"))
            .collect();

        let group_states: BTreeMap<&str, usize> = rows
            .iter()
            .filter_map(|r| cell(r, "groupId"))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, g)| (g, i))
            .collect();

        rows.iter()
            .enumerate()
            .map(|(pos, row)| {
                let difficulty_round = num::<u8>(row, &["difficulty_round"]).or_else(|| {
                    match cell(row, "difficulty") {
                        Some("easy") => Some(0),
                        Some("hard") => Some(1),
                        _ => None,
                    }
                });
                let difficulty = match (cell(row, "difficulty"), difficulty_round) {
                    (Some(d), _) => d.to_string(),
                    (None, Some(0)) => "easy".to_string(),
                    (None, Some(1)) => "hard".to_string(),
                    _ => String::new(),
                };
                let side_code = |key: &str| match cell(row, key) {
                    Some("left") => Some(0u8),
                    Some("right") => Some(1u8),
                    _ => None,
                };
                let is_correct_choice = num::<f64>(row, &["isCorrectChoice"]).or_else(|| {
                    match (cell(row, "assignedSide"), cell(row, "responseSide")) {
                        (Some(a), Some(r)) => Some(if a == r { 1.0 } else { 0.0 }),
                        _ => None,
                    }
                });
                // An empty `liking` cell marks a midpoint rating; only exports
                // without the column fall back to the group category.
                let liking_bin = if row.contains_key("liking") {
                    num::<u8>(row, &["liking"])
                } else {
                    cell(row, "liking_group").map(|g| u8::from(g == "high"))
                };
                let state_id = num::<usize>(row, &["state"])
                    .or_else(|| cell(row, "groupId").and_then(|g| group_states.get(g).copied()))
                    .unwrap_or(pos);

                BehaviorRecord {
                    participant_id: first(row, &["subj_id", "participantId"])
                        .unwrap_or("NA")
                        .to_string(),
                    round: num(row, &["round"]).unwrap_or(1),
                    trial_index: num(row, &["trial_in_round", "trialIndex"]).unwrap_or(pos + 1),
                    difficulty,
                    difficulty_round,
                    state_id,
                    action: num::<u8>(row, &["action"]).or_else(|| side_code("responseSide")),
                    reward: num(row, &["reward", "feedbackPositive"]).unwrap_or(0.0),
                    is_correct_choice,
                    rt_ms: num(row, &["rtMs"]),
                    liking_bin,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSummary {
    pub participant_id: String,
    pub round: u32,
    pub difficulty: String,
    pub n_trials: usize,
    pub accuracy: Option<f64>,
    pub reward: f64,
    pub median_rt_ms: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Accuracy, reward rate and median RT per participant, round and difficulty.
pub fn summarize(records: &[BehaviorRecord]) -> Vec<ConditionSummary> {
    let mut groups: BTreeMap<(String, u32, String), Vec<&BehaviorRecord>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.participant_id.clone(), r.round, r.difficulty.clone()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((participant_id, round, difficulty), rs)| {
            let correct: Vec<f64> = rs.iter().filter_map(|r| r.is_correct_choice).collect();
            let rewards: Vec<f64> = rs.iter().map(|r| r.reward).collect();
            let mut rts: Vec<f64> = rs.iter().filter_map(|r| r.rt_ms).collect();
            ConditionSummary {
                participant_id,
                round,
                difficulty,
                n_trials: rs.len(),
                accuracy: mean(&correct),
                reward: mean(&rewards).unwrap_or(0.0),
                median_rt_ms: median(&mut rts),
            }
        })
        .collect()
}

/// Negative log likelihood of the choices under softmax Q-learning with
/// two actions per state, in record order.
pub fn q_learning_nll(records: &[&BehaviorRecord], alpha: f64, beta: f64) -> f64 {
    let n_states = records.iter().map(|r| r.state_id).max().map_or(1, |m| m + 1);
    let mut q = vec![[0.0f64; 2]; n_states];
    let mut nll = 0.0;

    for r in records {
        let s = r.state_id;
        let a = r.action.unwrap_or(0).min(1) as usize;
        let logits = [beta * q[s][0], beta * q[s][1]];
        let max = logits[0].max(logits[1]);
        let exp = [(logits[0] - max).exp(), (logits[1] - max).exp()];
        let prob_a = (exp[a] / (exp[0] + exp[1])).clamp(1e-6, 1.0);
        nll -= prob_a.ln();
        q[s][a] += alpha * (r.reward - q[s][a]);
    }
    nll
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub alpha: f64,
    pub beta: f64,
    pub nll: f64,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn steps(lo: f64, hi: f64, step: f64) -> impl Iterator<Item = f64> {
    let n = ((hi - lo) / step).round() as usize;
    (0..=n).map(move |i| (lo + i as f64 * step).min(hi))
}

const X0_BOUNDS: (f64, f64) = (-4.0, 4.0);
const X1_BOUNDS: (f64, f64) = (-2.0, 4.0);

/// Fits `alpha = sigmoid(x0)` and `beta = exp(x1)` by a coarse grid search
/// followed by a finer pass around the best cell.
pub fn fit_condition(records: &[&BehaviorRecord]) -> Option<FitResult> {
    if records.is_empty() {
        return None;
    }
    let objective = |x0: f64, x1: f64| q_learning_nll(records, sigmoid(x0), x1.exp());

    let mut best = (0.0, 0.5, f64::INFINITY);
    let search = |x0s: Vec<f64>, x1s: Vec<f64>, best: &mut (f64, f64, f64)| {
        for &x0 in &x0s {
            for &x1 in &x1s {
                let nll = objective(x0, x1);
                if nll < best.2 {
                    *best = (x0, x1, nll);
                }
            }
        }
    };

    search(
        steps(X0_BOUNDS.0, X0_BOUNDS.1, 0.25).collect(),
        steps(X1_BOUNDS.0, X1_BOUNDS.1, 0.25).collect(),
        &mut best,
    );
    let (bx0, bx1, _) = best;
    search(
        steps((bx0 - 0.25).max(X0_BOUNDS.0), (bx0 + 0.25).min(X0_BOUNDS.1), 0.05).collect(),
        steps((bx1 - 0.25).max(X1_BOUNDS.0), (bx1 + 0.25).min(X1_BOUNDS.1), 0.05).collect(),
        &mut best,
    );

    let (x0, x1, nll) = best;
    Some(FitResult {
        alpha: sigmoid(x0),
        beta: x1.exp(),
        nll,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionFit {
    pub participant_id: String,
    pub difficulty: String,
    pub liking_bin: u8,
    pub round: u32,
    pub fit: FitResult,
    pub n_trials: usize,
}

/// One fit per participant, difficulty, liking bin and round. Trials
/// without a liking bin are left out.
pub fn fit_all(records: &[BehaviorRecord]) -> Vec<ConditionFit> {
    let mut groups: BTreeMap<(String, String, u8, u32), Vec<&BehaviorRecord>> = BTreeMap::new();
    for r in records {
        if let Some(bin) = r.liking_bin {
            groups
                .entry((r.participant_id.clone(), r.difficulty.clone(), bin, r.round))
                .or_default()
                .push(r);
        }
    }

    groups
        .into_iter()
        .filter_map(|((participant_id, difficulty, liking_bin, round), rs)| {
            let fit = fit_condition(&rs)?;
            Some(ConditionFit {
                participant_id,
                difficulty,
                liking_bin,
                round,
                fit,
                n_trials: rs.len(),
            })
        })
        .collect()
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub fn summaries_to_delimited(summaries: &[ConditionSummary], delimiter: char) -> String {
    write_table(
        &["participantId", "round", "difficulty", "n_trials", "acc", "reward", "rt_ms"],
        summaries.iter().map(|s| {
            vec![
                s.participant_id.clone(),
                s.round.to_string(),
                s.difficulty.clone(),
                s.n_trials.to_string(),
                opt(s.accuracy),
                s.reward.to_string(),
                opt(s.median_rt_ms),
            ]
        }),
        delimiter,
    )
}

pub fn fits_to_delimited(fits: &[ConditionFit], delimiter: char) -> String {
    write_table(
        &[
            "participantId",
            "difficulty",
            "liking",
            "round",
            "alpha_hat",
            "beta_hat",
            "nll",
            "n_trials",
        ],
        fits.iter().map(|f| {
            vec![
                f.participant_id.clone(),
                f.difficulty.clone(),
                f.liking_bin.to_string(),
                f.round.to_string(),
                format!("{:.4}", f.fit.alpha),
                format!("{:.4}", f.fit.beta),
                format!("{:.4}", f.fit.nll),
                f.n_trials.to_string(),
            ]
        }),
        delimiter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::parse_table;

    fn record(state_id: usize, action: u8, reward: f64) -> BehaviorRecord {
        BehaviorRecord {
            participant_id: "p".into(),
            round: 1,
            trial_index: 1,
            difficulty: "easy".into(),
            difficulty_round: Some(0),
            state_id,
            action: Some(action),
            reward,
            is_correct_choice: Some(if action == 1 { 1.0 } else { 0.0 }),
            rt_ms: Some(500.0),
            liking_bin: Some(1),
        }
    }

    #[test]
    fn zero_learning_rate_gives_chance_likelihood() {
        let rs: Vec<BehaviorRecord> = (0..20).map(|i| record(1, (i % 2) as u8, 1.0)).collect();
        let refs: Vec<&BehaviorRecord> = rs.iter().collect();
        let nll = q_learning_nll(&refs, 0.0, 3.0);
        assert!((nll - 20.0 * std::f64::consts::LN_2).abs() < 1e-9);
    }

    #[test]
    fn fit_beats_chance_for_consistent_learner() {
        let rs: Vec<BehaviorRecord> = (0..40).map(|_| record(2, 1, 1.0)).collect();
        let refs: Vec<&BehaviorRecord> = rs.iter().collect();
        let fit = fit_condition(&refs).unwrap();
        assert!(fit.nll < 40.0 * std::f64::consts::LN_2 * 0.5);
        assert!(fit.alpha > 0.5);
        assert!(fit_condition(&[]).is_none());
    }

    #[test]
    fn summary_groups_by_round_and_difficulty() {
        let mut rs = vec![record(1, 1, 1.0), record(1, 0, 0.0), record(1, 1, 1.0)];
        rs[1].rt_ms = Some(300.0);
        rs[2].rt_ms = Some(900.0);
        let mut hard = record(3, 1, 0.0);
        hard.round = 2;
        hard.difficulty = "hard".into();
        rs.push(hard);

        let summary = summarize(&rs);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].n_trials, 3);
        assert!((summary[0].accuracy.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary[0].median_rt_ms, Some(500.0));
        assert_eq!(summary[1].difficulty, "hard");
        assert_eq!(summary[1].reward, 0.0);
    }

    #[test]
    fn from_rows_skips_ratings_and_keeps_exclusions() {
        let text = "record_type,subj_id,round,trial_in_round,difficulty_round,difficulty,state,groupId,liking_group,liking,action,reward,isCorrectChoice,rtMs\n\
behavior,p1,1,1,0,easy,4,G1,high,,1,1,1,420\n\
behavior,p1,1,2,0,easy,12,G2,low,0,0,0,0,610\n\
rating,p1,,,,,,G1,high,,,,,";
        let records = BehaviorRecord::from_rows(&parse_table(text, ','));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].liking_bin, None);
        assert_eq!(records[1].liking_bin, Some(0));
        assert_eq!(records[0].state_id, 4);
        assert_eq!(records[1].rt_ms, Some(610.0));
        assert_eq!(fit_all(&records).len(), 1);
    }

    #[test]
    fn from_rows_accepts_legacy_columns() {
        let text = "participantId,trialIndex,groupId,difficulty,responseSide,assignedSide,feedbackPositive,liking_group\n\
p9,1,G2,hard,right,right,1,high\n\
p9,2,G1,hard,left,right,0,low";
        let records = BehaviorRecord::from_rows(&parse_table(text, ','));
        assert_eq!(records[0].participant_id, "p9");
        assert_eq!(records[0].action, Some(1));
        assert_eq!(records[0].is_correct_choice, Some(1.0));
        assert_eq!(records[1].is_correct_choice, Some(0.0));
        assert_eq!(records[0].difficulty_round, Some(1));
        assert_eq!(records[0].liking_bin, Some(1));
        // Group states are indexed in sorted group order.
        assert_eq!(records[0].state_id, 1);
        assert_eq!(records[1].state_id, 0);
        assert_eq!(records[1].reward, 0.0);
    }
}
