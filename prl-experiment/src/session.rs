use crate::config::ExperimentConfig;
use crate::error::{ExportError, SessionError};
use crate::export::{self, ExportRow, ExportSink};
use crate::random::RandomSource;
use crate::rating::{RatingItem, RatingSession};
use crate::schedule::build_schedule;
use crate::state::{Feedback, RunnerEvent, TrialRunner};
use prl_core::{ChoiceEvent, RunnerState, SessionPhase};
use prl_timing::Timer;
use std::time::Duration;
use tracing::{info, warn};

/// One participant's run through both stages.
///
/// Holds every piece of mutable state; callers drive it with one event at a
/// time.
pub struct Session<T, R>
where
    T: Timer,
    R: RandomSource,
{
    pub config: ExperimentConfig,
    phase: SessionPhase,
    participant_id: String,
    session_label_user: String,
    rating: Option<RatingSession>,
    runner: TrialRunner<T, R>,
}

impl<T, R> Session<T, R>
where
    T: Timer,
    R: RandomSource,
{
    /// Validates the config and builds the round schedule.
    pub fn new(config: ExperimentConfig, timer: T, mut rng: R) -> Result<Self, SessionError> {
        config.validate()?;
        let schedule = build_schedule(&config.groups, &config.schedule_template, &mut rng)?;
        let runner = TrialRunner::new(
            config.groups.clone(),
            schedule,
            config.rating_scale,
            Duration::from_millis(config.feedback_delay_ms),
            timer,
            rng,
        );
        Ok(Self {
            config,
            phase: SessionPhase::Setup,
            participant_id: String::new(),
            session_label_user: String::new(),
            rating: None,
            runner,
        })
    }

    pub fn set_participant(&mut self, participant_id: &str, session_label_user: &str) {
        self.participant_id = participant_id.trim().to_string();
        self.session_label_user = session_label_user.trim().to_string();
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn runner(&self) -> &TrialRunner<T, R> {
        &self.runner
    }

    pub fn rating(&self) -> Option<&RatingSession> {
        self.rating.as_ref()
    }

    /// Starts (or restarts) the rating stage and returns the first item.
    pub fn start_rating(&mut self) -> Option<&RatingItem> {
        let catalog = &self.config.groups;
        match &mut self.rating {
            Some(rating) => rating.restart(catalog, &mut self.runner.rng),
            None => {
                self.rating = Some(RatingSession::new(
                    catalog,
                    self.config.rating_scale,
                    &mut self.runner.rng,
                ))
            }
        }
        self.phase = SessionPhase::Rating;
        info!("rating stage started");
        self.rating.as_ref().and_then(RatingSession::current)
    }

    /// Rates the current item. `Ok(false)` when no rating is pending.
    pub fn submit_rating(&mut self, value: u8) -> Result<bool, SessionError> {
        let Some(rating) = &mut self.rating else {
            return Ok(false);
        };
        let accepted = rating.submit(
            value,
            &self.participant_id,
            &self.session_label_user,
            self.runner.timer.wall_clock_ms(),
        )?;
        if accepted {
            if let Some(lookup) = rating.lookup() {
                self.runner.set_rating_lookup(lookup.clone());
            }
        }
        Ok(accepted)
    }

    /// Starts the next scheduled round.
    ///
    /// Needs a participant id; without one nothing changes. Returns
    /// `Ok(false)` when a round is still running or every round is done.
    pub fn begin_round(&mut self) -> Result<bool, SessionError> {
        if self.runner.state() == RunnerState::AllRoundsComplete {
            return Ok(false);
        }
        if self.participant_id.is_empty() {
            warn!("round start blocked: no participant id");
            return Err(SessionError::MissingParticipant);
        }
        let label = if self.session_label_user.is_empty() {
            self.config.default_session_label.clone()
        } else {
            self.session_label_user.clone()
        };
        let started = self.runner.begin_next_round(&self.participant_id, &label);
        if started {
            self.phase = SessionPhase::Learning;
        } else if self.runner.state() == RunnerState::AllRoundsComplete {
            self.phase = SessionPhase::Debrief;
        }
        Ok(started)
    }

    /// Forwards a choice to the runner, which alone decides whether a trial
    /// is awaiting one. An accepted choice puts the session back in the
    /// learning phase, e.g. after a rating pass started mid-round.
    pub fn choose(&mut self, choice: ChoiceEvent) -> Option<Feedback> {
        let feedback = self.runner.respond(choice)?;
        self.phase = SessionPhase::Learning;
        Some(feedback)
    }

    /// Maps a key name through the configured bindings.
    pub fn press_key(&mut self, key: &str) -> Option<Feedback> {
        let choice = self.config.response_keys.choice_for(key)?;
        self.choose(choice)
    }

    /// Delivers any due deferred events. Returns how many were handled.
    pub fn update(&mut self) -> usize {
        let events: Vec<RunnerEvent> = self.runner.update();
        events
            .into_iter()
            .filter(|ev| self.runner.handle_event(*ev))
            .count()
    }

    pub fn export_rows(&self) -> Result<Vec<ExportRow>, ExportError> {
        let run_info = match self.runner.run_info() {
            Some(info) if self.runner.has_trials() => info,
            _ => return Err(ExportError::NoTrials),
        };
        let ratings = self
            .rating
            .as_ref()
            .map(RatingSession::records)
            .unwrap_or_default();
        let rows = export::assemble(self.runner.all_trials(), ratings, run_info);
        if rows.is_empty() {
            return Err(ExportError::NoRows);
        }
        Ok(rows)
    }

    /// Serializes every answered trial and rating into one file.
    pub fn export(&self, sink: &mut dyn ExportSink) -> Result<String, ExportError> {
        let rows = self.export_rows()?;
        let text = export::to_delimited(&rows, export::DEFAULT_DELIMITER);
        let filename = export::export_filename(&self.participant_id);
        sink.emit(&filename, text.as_bytes())?;
        info!(file = %filename, rows = rows.len(), "data exported");
        Ok(filename)
    }

    /// Operator-facing status summary.
    pub fn status_line(&self) -> String {
        let msg = match (self.phase, self.runner.state()) {
            (SessionPhase::Setup, _) => "Waiting to start.".to_string(),
            (SessionPhase::Rating, _) => match &self.rating {
                Some(r) if r.is_complete() => {
                    "Rating finished. You can start the RL task.".to_string()
                }
                Some(r) => {
                    let (done, total) = r.progress();
                    format!("Rating in progress ({done}/{total})...")
                }
                None => "Rating in progress...".to_string(),
            },
            (_, RunnerState::AllRoundsComplete) => "All rounds are finished.".to_string(),
            (_, RunnerState::RoundComplete) => match self.runner.run_info() {
                Some(info) => format!(
                    "Round {} finished. Download or start next round.",
                    info.round
                ),
                None => "Round finished.".to_string(),
            },
            (_, _) => match self.runner.run_info() {
                Some(info) => format!(
                    "Round {} ({}, p={}) running...",
                    info.round, info.difficulty, info.p_correct
                ),
                None => "Waiting to start.".to_string(),
            },
        };
        format!("Status: {msg}")
    }

    /// `Round: <current> / <total>`
    pub fn round_line(&self) -> String {
        let total = self.runner.schedule().len();
        let current = (self.runner.rounds_started().max(1)).min(total);
        format!("Round: {current} / {total}")
    }
}
