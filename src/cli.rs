use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "prl",
    version,
    about = "Probabilistic reinforcement-learning task with a liking-rating stage"
)]
pub struct Cli {
    /// Log filter, e.g. `info` or `prl_experiment=debug`. Overrides RUST_LOG.
    #[arg(long, global = true, env = "PRL_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a participant session in the terminal
    Run(RunArgs),
    /// Play a full session with a scripted agent and export it
    Simulate(SimulateArgs),
    /// Summaries and Q-learning fits for an exported file
    Analyze(AnalyzeArgs),
    /// Print the default configuration, or validate a config file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON config overriding the built-in catalog and round template
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory receiving the export file
    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Participant id; prompted for when omitted
    #[arg(long)]
    pub participant: Option<String>,

    /// User-facing session label
    #[arg(long)]
    pub label: Option<String>,

    /// Go straight to the learning task
    #[arg(long)]
    pub skip_rating: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "sim")]
    pub participant: String,

    #[arg(long, default_value = "")]
    pub label: String,

    /// Seed for both the session and the agent
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Probability that the agent picks the rewarded side
    #[arg(long, default_value_t = 0.8)]
    pub accuracy: f64,

    /// Mean simulated response time
    #[arg(long, default_value_t = 450)]
    pub rt_ms: u64,

    #[arg(long)]
    pub skip_rating: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Exported CSV file
    pub input: PathBuf,

    /// Where `rl_summary.csv` and `rl_fits.csv` go; defaults to the input's directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Validate this file instead of printing the default
    #[arg(long)]
    pub check: Option<PathBuf>,
}
