use crate::cli::SimulateArgs;
use anyhow::{ensure, Context, Result};
use prl_core::{ChoiceEvent, RunnerState, Side};
use prl_experiment::{DirectorySink, ExperimentConfig, ExportSink, RngSource, Session};
use prl_timing::ManualTimer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// What a simulated run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub filename: String,
    pub trials: usize,
    pub correct: usize,
    pub positive: usize,
}

/// Plays every round on a virtual clock. The agent picks the rewarded side
/// with probability `accuracy` and rates stimuli of high-liking groups
/// at or above the scale midpoint, the rest at or below it.
pub fn simulate(
    config: ExperimentConfig,
    args: &SimulateArgs,
    sink: &mut dyn ExportSink,
) -> Result<SimulationReport> {
    ensure!(
        (0.0..=1.0).contains(&args.accuracy),
        "accuracy must be within [0, 1], got {}",
        args.accuracy
    );
    let timer = ManualTimer::new();
    let rng = RngSource::new(StdRng::seed_from_u64(args.seed));
    let mut agent = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let scale = config.rating_scale;
    let mid = scale.midpoint().round() as u8;
    let mut session = Session::new(config, timer.clone(), rng)?;
    session.set_participant(&args.participant, &args.label);

    if !args.skip_rating {
        session.start_rating();
        while let Some(item) = session.rating().and_then(|r| r.current()).cloned() {
            let value = if item.liking.is_high() {
                agent.random_range(mid..=scale.max)
            } else {
                agent.random_range(scale.min..=mid)
            };
            timer.advance_ms(agent.random_range(800..2_000));
            session.submit_rating(value)?;
        }
    }

    let delay = session.config.feedback_delay_ms;
    let mut report = SimulationReport {
        filename: String::new(),
        trials: 0,
        correct: 0,
        positive: 0,
    };
    while session.begin_round()? {
        while session.runner().state() == RunnerState::AwaitingResponse {
            let runner = session.runner();
            let assigned = runner
                .current_trial()
                .and_then(|t| runner.assigned_side(&t.group_id))
                .context("trial presented without a side assignment")?;
            let side = if agent.random_bool(args.accuracy) {
                assigned
            } else {
                opposite(assigned)
            };
            let jitter = args.rt_ms / 2;
            timer.advance_ms(args.rt_ms - jitter + agent.random_range(0..=2 * jitter));
            if let Some(feedback) = session.choose(ChoiceEvent::key(side)) {
                report.trials += 1;
                report.correct += usize::from(feedback.is_correct_choice);
                report.positive += usize::from(feedback.positive);
            }
            timer.advance_ms(delay);
            session.update();
        }
    }

    report.filename = session.export(sink)?;
    info!(
        trials = report.trials,
        correct = report.correct,
        positive = report.positive,
        "simulation finished"
    );
    Ok(report)
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Left => Side::Right,
        Side::Right => Side::Left,
    }
}

pub fn run(config: ExperimentConfig, args: &SimulateArgs) -> Result<()> {
    let mut sink = DirectorySink::new(&args.out_dir);
    let report = simulate(config, args, &mut sink)?;
    println!(
        "{} trials, {} correct, {} rewarded -> {}",
        report.trials,
        report.correct,
        report.positive,
        sink.dir().join(&report.filename).display()
    );
    Ok(())
}
