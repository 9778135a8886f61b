//! SafeLine Sync - Standalone Binary
//!
//! Runs only the WAF certificate flow. Same configuration and behaviour as
//! `cert-sync safeline`.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use cert_sync::dispatch::{report_waf, VERSION};
use cert_sync::config::parse_bool;
use cert_sync::logging::{self, LogFormat};
use cert_sync::safeline;
use cert_sync::SafelineConfig;

/// Replace the SafeLine certificate when it is about to expire
#[derive(Parser, Debug)]
#[command(name = "safeline-sync", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", value_parser = parse_bool)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "CERT_SYNC_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.debug, args.log_format)?;

    info!("🚀 safeline-sync v{}", VERSION);

    let outcome = match SafelineConfig::from_env() {
        Ok(config) => safeline::run(&config).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => {
            report_waf(&outcome);
            Ok(())
        }
        Err(e) => {
            error!("❌ SafeLine sync failed: {}", e);
            std::process::exit(1);
        }
    }
}
