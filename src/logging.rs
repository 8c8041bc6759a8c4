use anyhow::Context;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global `tracing` subscriber. Diagnostics go to stderr so
/// the transcript can own stdout.
pub fn setup_tracing(json: bool, ansi: bool) -> anyhow::Result<()> {
    if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Couldn't set global tracing subscriber")
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(ansi)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Couldn't set global tracing subscriber")
    }
}
