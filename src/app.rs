use crate::cli::RunArgs;
use anyhow::{Context, Result};
use prl_core::{KeyBindings, RunnerState};
use prl_experiment::{DirectorySink, ExperimentConfig, ExportSink, RandomSource, RngSource, Session};
use prl_timing::{HighPrecisionTimer, Timer};
use rand::rngs::ThreadRng;
use std::io::{BufRead, StdinLock, Stdout, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Line-oriented front end: prompts on `output`, reads answers from `input`.
pub struct App<T, R, I, O>
where
    T: Timer,
    R: RandomSource,
{
    session: Session<T, R>,
    sink: Box<dyn ExportSink>,
    input: I,
    output: O,
    skip_rating: bool,
}

impl App<HighPrecisionTimer, RngSource<ThreadRng>, StdinLock<'static>, Stdout> {
    pub fn interactive(config: ExperimentConfig, args: &RunArgs) -> Result<Self> {
        let session = Session::new(config, HighPrecisionTimer::new(), RngSource::new(rand::rng()))
            .context("failed to set up session")?;
        let mut app = App::new(
            session,
            Box::new(DirectorySink::new(&args.out_dir)),
            std::io::stdin().lock(),
            std::io::stdout(),
        );
        app.skip_rating = args.skip_rating;
        if let Some(id) = &args.participant {
            app.session
                .set_participant(id, args.label.as_deref().unwrap_or_default());
        }
        Ok(app)
    }
}

impl<T, R, I, O> App<T, R, I, O>
where
    T: Timer,
    R: RandomSource,
    I: BufRead,
    O: Write,
{
    pub fn new(session: Session<T, R>, sink: Box<dyn ExportSink>, input: I, output: O) -> Self {
        Self {
            session,
            sink,
            input,
            output,
            skip_rating: false,
        }
    }

    pub fn session(&self) -> &Session<T, R> {
        &self.session
    }

    /// Runs the whole session. Returns the export filename if anything was saved.
    pub fn run(mut self) -> Result<Option<String>> {
        writeln!(self.output, "=== PROBABILISTIC LEARNING TASK ===")?;
        writeln!(self.output, "Type `q` at any prompt to stop.\n")?;

        if self.session.participant_id().is_empty() && !self.ask_participant()? {
            return Ok(None);
        }
        if !self.skip_rating && !self.rating_stage()? {
            return self.finish();
        }
        loop {
            match self.session.begin_round() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    warn!(error = %err, "round could not start");
                    writeln!(self.output, "{err}")?;
                    break;
                }
            }
            if !self.round()? {
                break;
            }
            self.save()?;
            if self.session.runner().has_more_rounds() {
                writeln!(self.output, "Press Enter for the next round.")?;
                if self.read_line()?.is_none_or(|l| l == "q") {
                    break;
                }
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Result<Option<String>> {
        let saved = self.save()?;
        writeln!(self.output, "{}", self.session.status_line())?;
        writeln!(self.output, "Thank you!")?;
        Ok(saved)
    }

    fn save(&mut self) -> Result<Option<String>> {
        match self.session.export(self.sink.as_mut()) {
            Ok(filename) => {
                writeln!(self.output, "Saved {filename}")?;
                Ok(Some(filename))
            }
            Err(err) => {
                info!(reason = %err, "nothing exported");
                Ok(None)
            }
        }
    }

    /// `None` on end of input; trimmed line otherwise.
    fn read_line(&mut self) -> Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_participant(&mut self) -> Result<bool> {
        loop {
            write!(self.output, "Participant ID: ")?;
            let Some(id) = self.read_line()? else {
                return Ok(false);
            };
            if id == "q" {
                return Ok(false);
            }
            if id.is_empty() {
                writeln!(self.output, "Please enter a participant ID first.")?;
                continue;
            }
            write!(self.output, "Session label (optional): ")?;
            let label = self.read_line()?.unwrap_or_default();
            self.session.set_participant(&id, &label);
            return Ok(true);
        }
    }

    fn rating_stage(&mut self) -> Result<bool> {
        let scale = self.session.config.rating_scale;
        self.session.start_rating();
        writeln!(
            self.output,
            "How much do you like each image? Answer {}-{}.",
            scale.min, scale.max
        )?;
        loop {
            let Some((item, (done, total))) = self
                .session
                .rating()
                .and_then(|r| Some((r.current()?.clone(), r.progress())))
            else {
                break;
            };
            write!(self.output, "[{}/{}] {}: ", done + 1, total, item.stimulus)?;
            let Some(answer) = self.read_line()? else {
                return Ok(false);
            };
            if answer == "q" {
                return Ok(false);
            }
            let accepted = answer
                .parse::<u8>()
                .ok()
                .map(|v| self.session.submit_rating(v));
            match accepted {
                Some(Ok(_)) => {}
                Some(Err(err)) => writeln!(self.output, "{err}")?,
                None => writeln!(self.output, "Enter a number.")?,
            }
        }
        writeln!(self.output, "{}", self.session.status_line())?;
        Ok(true)
    }

    /// Plays the loaded round. `false` when the participant quit.
    fn round(&mut self) -> Result<bool> {
        let delay = Duration::from_millis(self.session.config.feedback_delay_ms);
        writeln!(self.output, "{}", self.session.round_line())?;
        writeln!(self.output, "{}", self.session.status_line())?;
        let hint = key_hint(&self.session.config.response_keys);
        writeln!(self.output, "Choose with {hint}.")?;

        while self.session.runner().state() == RunnerState::AwaitingResponse {
            let runner = self.session.runner();
            let Some(trial) = runner.current_trial() else {
                break;
            };
            let (done, total) = runner.trial_progress().unwrap_or((0, 0));
            write!(
                self.output,
                "[{}/{} {}%] {}  > ",
                done + 1,
                total,
                runner.progress_percent(),
                trial.stimulus
            )?;
            let Some(key) = self.read_line()? else {
                return Ok(false);
            };
            if key == "q" {
                return Ok(false);
            }
            let Some(feedback) = self.session.press_key(&key) else {
                writeln!(self.output, "Use {hint}.")?;
                continue;
            };
            let text = if feedback.positive { "+1  Correct!" } else { "0  Wrong" };
            writeln!(self.output, "{text}")?;
            self.session.runner().timer.sleep(delay);
            self.session.update();
        }
        writeln!(self.output, "{}", self.session.status_line())?;
        Ok(true)
    }
}

/// Bound keys per side, e.g. `` `a`/`A` (left) or `l`/`L` (right) ``.
fn key_hint(keys: &KeyBindings) -> String {
    let join = |names: &[String]| {
        names
            .iter()
            .map(|k| format!("`{k}`"))
            .collect::<Vec<_>>()
            .join("/")
    };
    format!("{} (left) or {} (right)", join(&keys.left), join(&keys.right))
}
