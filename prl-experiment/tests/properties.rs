//! Property and statistical tests for scheduling, feedback and export.

use prl_cache::StimulusId;
use prl_core::{
    ChoiceEvent, Group, Liking, LikingBin, RatingScale, ResponseSource, Side, StimulusCatalog,
};
use prl_experiment::export::{FIELDS, parse_delimited, to_delimited};
use prl_experiment::state::RunnerEvent;
use prl_experiment::trial::TrialResponse;
use prl_experiment::{
    ExportRow, RatingRecord, RngSource, RoundTemplate, Trial, TrialRunner, build_schedule,
};
use prl_experiment::export::RowLabels;
use prl_timing::ManualTimer;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::time::Duration;

fn catalog(n_groups: usize) -> StimulusCatalog {
    StimulusCatalog::new(
        (0..n_groups)
            .map(|i| Group {
                id: format!("G{i}"),
                label: format!("g{i}"),
                liking: Liking::High,
                stimuli: (0..3)
                    .map(|j| StimulusId::new(&format!("g{i}/{j}.jpg")))
                    .collect(),
            })
            .collect(),
    )
}

/// Strategy: catalog size plus first-two-round group counts that can cover it.
fn coverage_case() -> impl Strategy<Value = (usize, usize, usize, usize, u64)> {
    (1usize..=12).prop_flat_map(|n| {
        (1..=n).prop_flat_map(move |a| {
            let min_b = n.saturating_sub(a).max(1);
            (Just(n), Just(a), min_b..=n, 1..=n, any::<u64>())
        })
    })
}

proptest! {
    // Rounds 1 and 2 together use every group, whatever the seed.
    #[test]
    fn first_two_rounds_cover_all_groups((n, a, b, c, seed) in coverage_case()) {
        let cat = catalog(n);
        let template = vec![
            RoundTemplate::new(1, 0.9, "easy", 0, a),
            RoundTemplate::new(2, 0.7, "hard", 1, b),
            RoundTemplate::new(3, 0.8, "easy", 0, c),
        ];
        let mut rng = RngSource::new(StdRng::seed_from_u64(seed));
        let schedule = build_schedule(&cat, &template, &mut rng).unwrap();
        let used: HashSet<&String> = schedule[..2].iter().flat_map(|r| &r.group_ids).collect();
        prop_assert_eq!(used.len(), n);
        for spec in &schedule {
            let unique: HashSet<&String> = spec.group_ids.iter().collect();
            prop_assert_eq!(unique.len(), spec.n_groups);
        }
    }

    // Serializing then parsing reproduces every cell, including ones with
    // delimiters, quotes and line breaks.
    #[test]
    fn export_round_trips(
        subj in "[a-zA-Z0-9 ,;\"\n\r]{0,12}",
        label in "[a-zA-Z0-9 ,;\"\n\r]{0,12}",
        image in "[a-zA-Z0-9 ,;\"\n\r/.]{1,16}",
        rating in 1u8..=9,
        rt_ms in 0u64..5_000,
    ) {
        let labels = RowLabels {
            subj_id: subj.clone(),
            session_label: "round-1".into(),
            session_label_user: label.clone(),
        };
        let trial = Trial {
            group_id: "G1".into(),
            group_label: label.clone(),
            liking: Liking::Low,
            stimulus: StimulusId::new(&image),
            trial_in_group: 2,
            trial_index: 7,
            round: 1,
            difficulty: "easy".into(),
            difficulty_round: 0,
            p_correct: 0.9,
            response: Some(TrialResponse {
                response_side: Side::Right,
                response_source: ResponseSource::Pointer,
                assigned_side: Side::Left,
                is_correct_choice: false,
                feedback_positive: true,
                reward: 1,
                rt_ms,
                timestamp_ms: 1_700_000_000_000,
                state_id: 3,
                action: 1,
                liking_bin: LikingBin::Excluded,
            }),
        };
        let record = RatingRecord {
            participant_id: subj.clone(),
            session_label: label.clone(),
            group_id: "G1".into(),
            group_label: label,
            liking: Liking::Low,
            stimulus: StimulusId::new(&image),
            rating,
            timestamp_ms: 42,
        };
        let rows = vec![
            ExportRow::Behavior { labels: labels.clone(), trial },
            ExportRow::Rating { labels, record },
        ];

        let parsed = parse_delimited(&to_delimited(&rows, ','), ',');
        prop_assert_eq!(parsed.len(), 3);
        prop_assert_eq!(&parsed[0], &FIELDS.iter().map(|f| f.to_string()).collect::<Vec<_>>());
        prop_assert_eq!(&parsed[1], &rows[0].cells());
        prop_assert_eq!(&parsed[2], &rows[1].cells());
    }
}

/// Runs `n` trials of one group, answering correctly or not, and returns
/// the rate of positive feedback.
fn positive_rate(p: f64, correct: bool, n: usize, seed: u64) -> f64 {
    let cat = catalog(1);
    let mut template = RoundTemplate::new(1, p, "easy", 0, 1);
    template.trials_per_group = n;
    let mut rng = RngSource::new(StdRng::seed_from_u64(seed));
    let schedule = build_schedule(&cat, &[template], &mut rng).unwrap();
    let timer = ManualTimer::new();
    let mut runner = TrialRunner::new(
        cat,
        schedule,
        RatingScale::default(),
        Duration::ZERO,
        timer,
        rng,
    );
    runner.begin_next_round("p", "s");

    let assigned = runner.assigned_side("G0").unwrap();
    let side = match (correct, assigned) {
        (true, s) => s,
        (false, Side::Left) => Side::Right,
        (false, Side::Right) => Side::Left,
    };
    let mut positive = 0;
    for _ in 0..n {
        let fb = runner.respond(ChoiceEvent::key(side)).unwrap();
        assert_eq!(fb.is_correct_choice, correct);
        positive += usize::from(fb.positive);
        assert!(runner.handle_event(RunnerEvent::FeedbackElapsed));
    }
    assert!(runner.trials().iter().all(|t| {
        let r = t.response.as_ref().unwrap();
        r.reward == u8::from(r.feedback_positive)
    }));
    positive as f64 / n as f64
}

#[test]
fn correct_choices_are_rewarded_with_probability_p() {
    let rate = positive_rate(0.9, true, 10_000, 17);
    assert!((rate - 0.9).abs() < 0.02, "rate {rate}");
}

#[test]
fn wrong_choices_are_rewarded_with_probability_one_minus_p() {
    let rate = positive_rate(0.7, false, 10_000, 23);
    assert!((rate - 0.3).abs() < 0.02, "rate {rate}");
}

#[test]
fn certain_reward_probability_is_deterministic() {
    assert_eq!(positive_rate(1.0, true, 500, 1), 1.0);
    assert_eq!(positive_rate(1.0, false, 500, 1), 0.0);
}
