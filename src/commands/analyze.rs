use crate::cli::AnalyzeArgs;
use anyhow::{ensure, Context, Result};
use prl_experiment::analysis::{
    fit_all, fits_to_delimited, summaries_to_delimited, summarize, BehaviorRecord, ConditionFit,
    ConditionSummary,
};
use prl_experiment::export::{parse_table, DEFAULT_DELIMITER};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Analysis {
    pub summaries: Vec<ConditionSummary>,
    pub fits: Vec<ConditionFit>,
}

/// Summaries and fits for one exported table.
pub fn analyze_text(text: &str) -> Result<Analysis> {
    let rows = parse_table(text, DEFAULT_DELIMITER);
    let records = BehaviorRecord::from_rows(&rows);
    ensure!(!records.is_empty(), "no behavior rows found");
    info!(rows = rows.len(), behavior = records.len(), "export parsed");
    Ok(Analysis {
        summaries: summarize(&records),
        fits: fit_all(&records),
    })
}

pub fn run(args: &AnalyzeArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let analysis = analyze_text(&text)?;

    let out_dir = args.out_dir.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let summary = summaries_to_delimited(&analysis.summaries, DEFAULT_DELIMITER);
    let fits = fits_to_delimited(&analysis.fits, DEFAULT_DELIMITER);
    write(&out_dir.join("rl_summary.csv"), &summary)?;
    write(&out_dir.join("rl_fits.csv"), &fits)?;

    println!("{summary}\n");
    println!("{fits}");
    Ok(())
}

fn write(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "analysis written");
    Ok(())
}
