use crate::random::RandomSource;
use crate::rating::RatingLookup;
use crate::schedule::RoundSpec;
use crate::trial::{KeyMap, Trial, TrialResponse, assign_keys, build_trials};
use prl_core::{
    ChoiceEvent, Liking, LikingBin, RatingScale, RunnerState, Side, StateRegistry,
    StimulusCatalog, StimulusId,
};
use prl_timing::Timer;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunnerEvent {
    Choice(ChoiceEvent),
    /// The post-response feedback interval has passed.
    FeedbackElapsed,
}

/// Who is running and which round is loaded. Replaced at every round start.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub participant_id: String,
    /// Internal tag, `round-<n>`.
    pub session_label: String,
    pub session_label_user: String,
    pub round: u32,
    pub difficulty: String,
    pub difficulty_round: u8,
    pub p_correct: f64,
}

/// Feedback shown to the participant after a choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    pub positive: bool,
    pub is_correct_choice: bool,
    pub rt_ms: u64,
}

/// Runs a session's rounds one trial at a time.
///
/// A trial is presented (`AwaitingResponse`), takes exactly one choice,
/// and the runner drops to `Idle` while feedback is on screen. The next
/// trial is presented when the deferred `FeedbackElapsed` event fires.
pub struct TrialRunner<T, R>
where
    T: Timer,
    R: RandomSource,
{
    pub timer: T,
    pub rng: R,
    catalog: StimulusCatalog,
    schedule: Vec<RoundSpec>,
    scale: RatingScale,
    feedback_delay: Duration,

    state: RunnerState,
    next_round: usize,
    run_info: Option<RunInfo>,
    trials: Vec<Trial>,
    archive: Vec<Trial>,
    key_map: KeyMap,
    pointer: usize,
    presented_at: Option<u64>,
    resume_at: Option<u64>,
    feedback: Option<Feedback>,
    progress_percent: u8,

    registry: StateRegistry,
    ratings: RatingLookup,
}

impl<T, R> TrialRunner<T, R>
where
    T: Timer,
    R: RandomSource,
{
    pub fn new(
        catalog: StimulusCatalog,
        schedule: Vec<RoundSpec>,
        scale: RatingScale,
        feedback_delay: Duration,
        timer: T,
        rng: R,
    ) -> Self {
        // Catalog order is the first encounter, so ids match the catalog
        // layout regardless of which rounds run.
        let mut registry = StateRegistry::new();
        for (_, stimulus) in catalog.pairs() {
            registry.intern(stimulus);
        }

        Self {
            timer,
            rng,
            catalog,
            schedule,
            scale,
            feedback_delay,
            state: RunnerState::Ready,
            next_round: 0,
            run_info: None,
            trials: Vec::new(),
            archive: Vec::new(),
            key_map: KeyMap::new(),
            pointer: 0,
            presented_at: None,
            resume_at: None,
            feedback: None,
            progress_percent: 0,
            registry,
            ratings: RatingLookup::new(),
        }
    }

    /// Installs the participant's ratings for liking-bin computation.
    pub fn set_rating_lookup(&mut self, ratings: RatingLookup) {
        self.ratings = ratings;
    }

    /// Loads the next scheduled round and presents its first trial.
    ///
    /// Only acts from `Ready` or `RoundComplete`. Returns `false` when the
    /// request is ignored or when no round is left, in which case the
    /// runner becomes `AllRoundsComplete`.
    pub fn begin_next_round(&mut self, participant_id: &str, session_label_user: &str) -> bool {
        if !matches!(self.state, RunnerState::Ready | RunnerState::RoundComplete) {
            debug!(state = ?self.state, "round advance requested mid-round; ignored");
            return false;
        }
        let Some(spec) = self.schedule.get(self.next_round).cloned() else {
            info!("all rounds are finished");
            self.state = RunnerState::AllRoundsComplete;
            return false;
        };
        self.next_round += 1;

        let key_map = assign_keys(&spec.group_ids, &mut self.rng);
        let trials = build_trials(&spec, &self.catalog, &mut self.rng);

        self.archive
            .extend(self.trials.drain(..).filter(Trial::is_answered));
        self.run_info = Some(RunInfo {
            participant_id: participant_id.to_string(),
            session_label: spec.id.clone(),
            session_label_user: session_label_user.to_string(),
            round: spec.round,
            difficulty: spec.difficulty.clone(),
            difficulty_round: spec.difficulty_round,
            p_correct: spec.p_correct,
        });
        self.trials = trials;
        self.key_map = key_map;
        self.pointer = 0;
        self.presented_at = None;
        self.resume_at = None;
        self.feedback = None;
        self.progress_percent = 0;
        self.state = RunnerState::Idle;

        info!(
            round = spec.round,
            difficulty = %spec.difficulty,
            p = spec.p_correct,
            trials = self.trials.len(),
            groups = ?spec.group_ids,
            "round started"
        );
        self.present();
        true
    }

    /// Emits the events that are due at the timer's current time.
    pub fn update(&mut self) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        if let (RunnerState::Idle, Some(due)) = (self.state, self.resume_at) {
            if self.timer.now() >= due {
                events.push(RunnerEvent::FeedbackElapsed);
            }
        }
        events
    }

    pub fn handle_event(&mut self, event: RunnerEvent) -> bool {
        match (self.state, event) {
            (RunnerState::AwaitingResponse, RunnerEvent::Choice(choice)) => {
                self.respond(choice).is_some()
            }
            (RunnerState::Idle, RunnerEvent::FeedbackElapsed) if self.resume_at.is_some() => {
                self.resume_at = None;
                self.pointer += 1;
                self.present();
                true
            }
            (state, event) => {
                debug!(?state, ?event, "stale event ignored");
                false
            }
        }
    }

    /// Applies one choice to the trial awaiting a response.
    ///
    /// Any choice outside `AwaitingResponse` is a no-op returning `None`.
    pub fn respond(&mut self, choice: ChoiceEvent) -> Option<Feedback> {
        if self.state != RunnerState::AwaitingResponse || self.pointer >= self.trials.len() {
            debug!(state = ?self.state, side = %choice.side, "choice ignored");
            return None;
        }

        let now = self.timer.now();
        let (group_id, stimulus, liking, p) = {
            let t = &self.trials[self.pointer];
            (t.group_id.clone(), t.stimulus.clone(), t.liking, t.p_correct)
        };
        let assigned = self.assigned_side(&group_id)?;
        let is_correct_choice = choice.side == assigned;

        let u = self.rng.uniform();
        let feedback_positive = if is_correct_choice { u < p } else { u < 1.0 - p };

        let elapsed_ns = now.saturating_sub(self.presented_at.unwrap_or(now));
        let rt_ms = (elapsed_ns + 500_000) / 1_000_000;
        let liking_bin = self.liking_bin(&stimulus, liking);
        let state_id = self.registry.intern(&stimulus);

        let response = TrialResponse {
            response_side: choice.side,
            response_source: choice.source,
            assigned_side: assigned,
            is_correct_choice,
            feedback_positive,
            reward: u8::from(feedback_positive),
            rt_ms,
            timestamp_ms: self.timer.wall_clock_ms(),
            state_id,
            action: choice.side.action_code(),
            liking_bin,
        };
        let trial = &mut self.trials[self.pointer];
        if !trial.record(response) {
            return None;
        }
        debug!(
            trial = trial.trial_index,
            group = %trial.group_id,
            side = %choice.side,
            correct = is_correct_choice,
            positive = feedback_positive,
            rt_ms,
            "response recorded"
        );

        let feedback = Feedback {
            positive: feedback_positive,
            is_correct_choice,
            rt_ms,
        };
        self.feedback = Some(feedback);
        self.state = RunnerState::Idle;
        self.resume_at = Some(now + self.feedback_delay.as_nanos() as u64);
        Some(feedback)
    }

    /// Participant rating binned at the midpoint; the group's static
    /// category stands in only when the stimulus was never rated.
    pub fn liking_bin(&self, stimulus: &StimulusId, fallback: Liking) -> LikingBin {
        match self.ratings.get(stimulus) {
            Some(&rating) => self.scale.bin(rating),
            None if fallback.is_high() => LikingBin::Like,
            None => LikingBin::Dislike,
        }
    }

    fn present(&mut self) {
        if self.pointer >= self.trials.len() {
            self.presented_at = None;
            self.progress_percent = 100;
            self.state = RunnerState::RoundComplete;
            if let Some(info) = &self.run_info {
                info!(round = info.round, trials = self.trials.len(), "round finished");
            }
            return;
        }
        self.presented_at = Some(self.timer.now());
        self.feedback = None;
        self.progress_percent =
            (self.pointer as f64 / self.trials.len() as f64 * 100.0).round() as u8;
        self.state = RunnerState::AwaitingResponse;
        debug!(trial = self.trials[self.pointer].trial_index, "trial presented");
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn run_info(&self) -> Option<&RunInfo> {
        self.run_info.as_ref()
    }

    pub fn schedule(&self) -> &[RoundSpec] {
        &self.schedule
    }

    /// Rounds started so far.
    pub fn rounds_started(&self) -> usize {
        self.next_round
    }

    pub fn has_more_rounds(&self) -> bool {
        self.next_round < self.schedule.len()
    }

    /// The trial on screen, if one is awaiting a response or showing feedback.
    pub fn current_trial(&self) -> Option<&Trial> {
        match self.state {
            RunnerState::AwaitingResponse | RunnerState::Idle => self.trials.get(self.pointer),
            _ => None,
        }
    }

    pub fn current_feedback(&self) -> Option<Feedback> {
        self.feedback
    }

    pub fn assigned_side(&self, group_id: &str) -> Option<Side> {
        self.key_map.get(group_id).copied()
    }

    /// Trials of the loaded round, answered or not.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Answered trials of earlier rounds followed by the loaded round's trials.
    pub fn all_trials(&self) -> impl Iterator<Item = &Trial> {
        self.archive.iter().chain(self.trials.iter())
    }

    pub fn has_trials(&self) -> bool {
        !self.archive.is_empty() || !self.trials.is_empty()
    }

    /// (answered in this round, trials in this round)
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        self.run_info.as_ref()?;
        let answered = self.trials.iter().filter(|t| t.is_answered()).count();
        Some((answered, self.trials.len()))
    }

    /// Display progress computed when the current trial was presented.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundTemplate;
    use crate::random::ScriptedSource;
    use crate::schedule::build_schedule;
    use prl_timing::ManualTimer;

    fn runner(
        template: &[RoundTemplate],
        uniforms: Vec<f64>,
    ) -> (TrialRunner<ManualTimer, ScriptedSource>, ManualTimer) {
        let catalog = StimulusCatalog::default();
        let mut rng = ScriptedSource::with_uniforms(uniforms);
        let schedule = build_schedule(&catalog, template, &mut rng).unwrap();
        let timer = ManualTimer::with_epoch_ms(1_000);
        let runner = TrialRunner::new(
            catalog,
            schedule,
            RatingScale::default(),
            Duration::from_millis(700),
            timer.clone(),
            rng,
        );
        (runner, timer)
    }

    fn two_rounds() -> Vec<RoundTemplate> {
        let mut r1 = RoundTemplate::new(1, 0.9, "easy", 0, 3);
        r1.trials_per_group = 2;
        let mut r2 = RoundTemplate::new(2, 0.7, "hard", 1, 3);
        r2.trials_per_group = 1;
        vec![r1, r2]
    }

    fn correct_choice<T: Timer, R: RandomSource>(r: &TrialRunner<T, R>) -> ChoiceEvent {
        let t = r.current_trial().unwrap();
        ChoiceEvent::key(r.assigned_side(&t.group_id).unwrap())
    }

    fn wrong_choice<T: Timer, R: RandomSource>(r: &TrialRunner<T, R>) -> ChoiceEvent {
        let side = match correct_choice(r).side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
        ChoiceEvent::key(side)
    }

    #[test]
    fn starts_ready_and_presents_first_trial_on_round_start() {
        let (mut r, _) = runner(&two_rounds(), vec![0.3]);
        assert_eq!(r.state(), RunnerState::Ready);
        assert!(r.respond(ChoiceEvent::key(Side::Left)).is_none());

        assert!(r.begin_next_round("p01", "session-1"));
        assert_eq!(r.state(), RunnerState::AwaitingResponse);
        assert_eq!(r.trials().len(), 6);
        assert_eq!(r.progress_percent(), 0);
        let info = r.run_info().unwrap();
        assert_eq!(info.session_label, "round-1");
        assert_eq!(info.p_correct, 0.9);
    }

    #[test]
    fn choice_records_response_and_waits_for_feedback_interval() {
        let (mut r, timer) = runner(&two_rounds(), vec![0.3]);
        r.begin_next_round("p01", "s");
        timer.advance_ms(412);
        let choice = correct_choice(&r);
        let fb = r.respond(choice).unwrap();
        assert!(fb.is_correct_choice);
        assert!(fb.positive);
        assert_eq!(fb.rt_ms, 412);
        assert_eq!(r.state(), RunnerState::Idle);

        let resp = r.trials()[0].response.clone().unwrap();
        assert_eq!(resp.reward, 1);
        assert_eq!(resp.action, choice.side.action_code());
        assert_eq!(resp.timestamp_ms, 1_412);

        // Still inside the feedback interval.
        timer.advance_ms(699);
        assert!(r.update().is_empty());
        timer.advance_ms(1);
        assert_eq!(r.update(), vec![RunnerEvent::FeedbackElapsed]);
        assert!(r.handle_event(RunnerEvent::FeedbackElapsed));
        assert_eq!(r.state(), RunnerState::AwaitingResponse);
        assert_eq!(r.current_trial().unwrap().trial_index, 2);
        assert_eq!(r.progress_percent(), 17);
    }

    #[test]
    fn second_choice_on_answered_trial_is_a_no_op() {
        let (mut r, timer) = runner(&two_rounds(), vec![0.3]);
        r.begin_next_round("p01", "s");
        let choice = correct_choice(&r);
        r.respond(choice).unwrap();
        let snapshot = r.trials().to_vec();

        timer.advance_ms(50);
        assert!(r.respond(wrong_choice(&r)).is_none());
        assert!(!r.handle_event(RunnerEvent::Choice(choice)));
        assert_eq!(r.trials(), snapshot.as_slice());
        assert_eq!(r.state(), RunnerState::Idle);
    }

    #[test]
    fn feedback_uses_p_for_correct_and_one_minus_p_for_wrong() {
        // u = 0.85: below 0.9 (correct -> positive), above 0.1 (wrong -> negative).
        let (mut r, timer) = runner(&two_rounds(), vec![0.85]);
        r.begin_next_round("p01", "s");
        assert!(r.respond(correct_choice(&r)).unwrap().positive);
        timer.advance_ms(700);
        r.handle_event(RunnerEvent::FeedbackElapsed);
        let fb = r.respond(wrong_choice(&r)).unwrap();
        assert!(!fb.is_correct_choice);
        assert!(!fb.positive);

        // u = 0.05: wrong choices are rewarded with probability 1 - p.
        let (mut r, _) = runner(&two_rounds(), vec![0.05]);
        r.begin_next_round("p01", "s");
        let fb = r.respond(wrong_choice(&r)).unwrap();
        assert!(fb.positive);
        assert_eq!(r.trials()[0].response.as_ref().unwrap().reward, 1);
    }

    #[test]
    fn rounds_advance_only_on_request() {
        let (mut r, timer) = runner(&two_rounds(), vec![0.3]);
        r.begin_next_round("p01", "s");
        assert!(!r.begin_next_round("p01", "s"));
        for _ in 0..6 {
            r.respond(correct_choice(&r)).unwrap();
            timer.advance_ms(700);
            for ev in r.update() {
                r.handle_event(ev);
            }
        }
        assert_eq!(r.state(), RunnerState::RoundComplete);
        assert_eq!(r.progress_percent(), 100);
        assert_eq!(r.trial_progress(), Some((6, 6)));
        assert!(r.update().is_empty());

        assert!(r.begin_next_round("p01", "s"));
        assert_eq!(r.run_info().unwrap().round, 2);
        assert_eq!(r.all_trials().count(), 6 + 3);
        assert!(r.all_trials().take(6).all(|t| t.round == 1 && t.is_answered()));

        for _ in 0..3 {
            r.respond(correct_choice(&r)).unwrap();
            timer.advance_ms(700);
            for ev in r.update() {
                r.handle_event(ev);
            }
        }
        assert!(!r.begin_next_round("p01", "s"));
        assert_eq!(r.state(), RunnerState::AllRoundsComplete);
        assert!(!r.begin_next_round("p01", "s"));
    }

    #[test]
    fn liking_bin_distinguishes_midpoint_from_missing() {
        let (mut r, _) = runner(&two_rounds(), vec![0.3]);
        let liked = StimulusId::new("liked.jpg");
        let mid = StimulusId::new("mid.jpg");
        let disliked = StimulusId::new("disliked.jpg");
        let unrated = StimulusId::new("unrated.jpg");
        r.set_rating_lookup(
            [(liked.clone(), 8), (mid.clone(), 5), (disliked.clone(), 2)]
                .into_iter()
                .collect(),
        );
        assert_eq!(r.liking_bin(&liked, Liking::Low), LikingBin::Like);
        assert_eq!(r.liking_bin(&mid, Liking::High), LikingBin::Excluded);
        assert_eq!(r.liking_bin(&disliked, Liking::High), LikingBin::Dislike);
        assert_eq!(r.liking_bin(&unrated, Liking::High), LikingBin::Like);
        assert_eq!(r.liking_bin(&unrated, Liking::Low), LikingBin::Dislike);
    }

    #[test]
    fn state_ids_follow_catalog_order() {
        let (mut r, _) = runner(&two_rounds(), vec![0.3]);
        r.begin_next_round("p01", "s");
        let catalog = StimulusCatalog::default();
        let choice = correct_choice(&r);
        r.respond(choice).unwrap();
        let trial = &r.trials()[0];
        let position = catalog
            .pairs()
            .position(|(_, s)| s == &trial.stimulus)
            .unwrap();
        let state_id = trial.response.as_ref().unwrap().state_id;
        assert_eq!(state_id as usize, position + 1);
        assert_eq!(r.registry().len(), 60);
    }
}
