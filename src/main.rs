//! cert-sync
//!
//! Keeps the HTTPS certificate of an Aliyun OSS custom domain and of a
//! SafeLine WAF in step with the PEM pair on local disk.
//!
//! # Usage
//! ```bash
//! # SafeLine only (same as `cert-sync safeline`)
//! cert-sync
//!
//! # OSS custom domain only
//! cert-sync aliyun
//!
//! # Both targets, verbose
//! DEBUG=true cert-sync all
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::error;

use cert_sync::dispatch::{self, Mode};
use cert_sync::config::parse_bool;
use cert_sync::logging::{self, LogFormat};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "cert-sync")]
#[command(about = "Sync a local TLS certificate to Aliyun OSS and SafeLine WAF", long_about = None)]
#[command(version)]
struct Cli {
    /// help | all | aliyun | safeline (default: safeline)
    mode: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", value_parser = parse_bool)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "CERT_SYNC_LOG_FORMAT")]
    log_format: LogFormat,
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.debug, cli.log_format)?;

    let mode = match Mode::parse(cli.mode.as_deref().unwrap_or_default()) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", dispatch::usage());
            error!("❌ {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = dispatch::run(mode).await {
        error!("❌ {} sync failed: {}", mode, e);
        std::process::exit(1);
    }

    Ok(())
}
