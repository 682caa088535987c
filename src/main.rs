use anyhow::{Context, Result};
use clap::Parser;

mod app;
mod cli;
mod commands;
mod logging;

pub use app::App;
use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_level.as_deref())?;

    match cli.cmd {
        Command::Run(args) => {
            let config = commands::load_config(args.config.as_deref())?;
            let app = App::interactive(config, &args)?;
            if let Some(filename) = app.run()? {
                println!("Data saved to {}", args.out_dir.join(filename).display());
            }
        }
        Command::Simulate(args) => {
            let config = commands::load_config(args.config.as_deref())?;
            commands::simulate::run(config, &args)?;
        }
        Command::Analyze(args) => commands::analyze::run(&args)?,
        Command::Config(args) => match args.check {
            Some(path) => {
                commands::load_config(Some(&path))?;
                println!("{} is valid", path.display());
            }
            None => {
                let json = serde_json::to_string_pretty(&prl_experiment::ExperimentConfig::default())
                    .context("failed to serialize default config")?;
                println!("{json}");
            }
        },
    }
    Ok(())
}
