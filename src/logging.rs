//! Subscriber setup shared by both binaries

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

pub fn level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// `--debug`/`DEBUG` wins, then `RUST_LOG`, then plain info
pub fn filter_directive(debug: bool, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directives) if !debug => directives.to_string(),
        _ => level(debug).as_str().to_ascii_lowercase(),
    }
}

/// Installs the global subscriber. Call once, first thing in `main`.
pub fn init(debug: bool, format: LogFormat) -> anyhow::Result<()> {
    let directive = filter_directive(debug, std::env::var("RUST_LOG").ok().as_deref());
    let filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(level(debug).as_str().to_ascii_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}
