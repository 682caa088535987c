use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Installs the stderr subscriber. An explicit level wins over `RUST_LOG`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = build_env_filter(level)?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .context("failed to initialize tracing subscriber")
}

fn build_env_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(spec) if spec.trim().is_empty() => Err(anyhow!("log level cannot be empty")),
        Some(spec) => EnvFilter::try_new(spec).with_context(|| format!("invalid log filter `{spec}`")),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}
