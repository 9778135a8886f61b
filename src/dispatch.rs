//! Mode selection for the `cert-sync` command line

use std::fmt;

use tracing::info;

use crate::aliyun::{self, BucketOutcome};
use crate::certificate::CertificateRecord;
use crate::config::{AliyunConfig, SafelineConfig};
use crate::error::{Result, SyncError};
use crate::safeline::{self, WafOutcome};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Help,
    All,
    Aliyun,
    Safeline,
}

impl Mode {
    /// An empty argument selects the WAF flow
    pub fn parse(arg: &str) -> Result<Self> {
        match arg.trim() {
            "" | "safeline" => Ok(Mode::Safeline),
            "help" => Ok(Mode::Help),
            "all" => Ok(Mode::All),
            "aliyun" => Ok(Mode::Aliyun),
            other => Err(SyncError::UnknownMode(other.to_string())),
        }
    }

    pub fn runs_bucket(self) -> bool {
        matches!(self, Mode::All | Mode::Aliyun)
    }

    pub fn runs_waf(self) -> bool {
        matches!(self, Mode::All | Mode::Safeline)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Help => "help",
            Mode::All => "all",
            Mode::Aliyun => "aliyun",
            Mode::Safeline => "safeline",
        };
        f.write_str(name)
    }
}

pub fn usage() -> String {
    format!(
        "cert-sync {VERSION}

Usage: cert-sync [MODE]

Modes:
  help       print this message
  all        sync the OSS custom domain and the SafeLine certificate
  aliyun     sync the OSS custom domain certificate only
  safeline   sync the SafeLine certificate only (default)

Aliyun OSS:
  ALIYUN_ACCESS_KEY_ID, ALIYUN_ACCESS_SECRET, ALIYUN_OSS_Endpoint,
  ALIYUN_OSS_BUCKET_NAME, ALIYUN_OSS_DOMAIN
  optional: ALIYUN_OSS_REGION, ALIYUN_CAS_ENDPOINT

SafeLine:
  BASE_SERVER_URL (default https://127.0.0.1:9443), CERT_ID (default 1),
  API_TOKEN, or LOGIN_USER (default admin) with LOGIN_PASSWORD
  optional: SAFELINE_INSECURE_TLS

Shared:
  CERT_CRT_PATH, CERT_KEY_PATH, DEBUG

Variables are read from the environment and from ./.env when present."
    )
}

/// Prints the certificate a flow ended with
pub fn print_record(title: &str, record: &CertificateRecord) {
    println!("\n{}", title);
    println!("{}", "-".repeat(60));
    println!("{:<10} {}", "ID", record.id);
    println!("{:<10} {}", "DOMAINS", record.domain_list());
    println!("{:<10} {}", "ISSUER", record.issuer.as_deref().unwrap_or("-"));
    println!("{:<10} {}", "EXPIRES", record.expiry_display());
}

/// One-line summary of the certificate an update replaced
pub fn replaced_line(previous: &CertificateRecord) -> String {
    format!(
        "{:<10} {} (was {})",
        "REPLACED",
        previous.expiry_display(),
        previous.domain_list()
    )
}

pub fn report_waf(outcome: &WafOutcome) {
    match outcome {
        WafOutcome::StillValid { current } => {
            print_record("SafeLine certificate (unchanged)", current);
        }
        WafOutcome::Updated { previous, current } => {
            print_record("SafeLine certificate (updated)", current);
            println!("{}", replaced_line(previous));
        }
    }
}

/// Runs the flows selected by `mode`.
///
/// Configuration for every selected flow is validated before any flow starts.
pub async fn run(mode: Mode) -> Result<()> {
    if mode == Mode::Help {
        println!("{}", usage());
        return Ok(());
    }

    let aliyun_config = mode.runs_bucket().then(AliyunConfig::from_env).transpose()?;
    let safeline_config = mode.runs_waf().then(SafelineConfig::from_env).transpose()?;

    if let Some(config) = &aliyun_config {
        info!("🚀 cert-sync v{} | Aliyun OSS", VERSION);
        match aliyun::run(config).await? {
            BucketOutcome::StillValid { current } => {
                print_record("OSS certificate (unchanged)", &current);
            }
            BucketOutcome::Bound { identifier } => {
                println!("✅ Bound certificate {} to {}", identifier, config.domain);
            }
            BucketOutcome::Replaced {
                previous,
                identifier,
            } => {
                println!(
                    "✅ Replaced certificate {} with {} on {}",
                    previous, identifier, config.domain
                );
            }
        }
    }

    if let Some(config) = &safeline_config {
        info!("🚀 cert-sync v{} | SafeLine WAF", VERSION);
        let outcome = safeline::run(config).await?;
        report_waf(&outcome);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(Mode::parse("help").unwrap(), Mode::Help);
        assert_eq!(Mode::parse("all").unwrap(), Mode::All);
        assert_eq!(Mode::parse("aliyun").unwrap(), Mode::Aliyun);
        assert_eq!(Mode::parse("safeline").unwrap(), Mode::Safeline);
        assert_eq!(Mode::parse("").unwrap(), Mode::Safeline);
    }

    #[test]
    fn test_unknown_mode() {
        let err = Mode::parse("cloudflare").unwrap_err();
        assert!(matches!(err, SyncError::UnknownMode(ref m) if m == "cloudflare"));
    }

    #[test]
    fn test_flow_selection() {
        let selected: Vec<(bool, bool)> = [Mode::Help, Mode::All, Mode::Aliyun, Mode::Safeline]
            .iter()
            .map(|m| (m.runs_bucket(), m.runs_waf()))
            .collect();

        assert_eq!(
            selected,
            vec![(false, false), (true, true), (true, false), (false, true)]
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for mode in [Mode::Help, Mode::All, Mode::Aliyun, Mode::Safeline] {
            assert_eq!(Mode::parse(&mode.to_string()).unwrap(), mode);
        }
    }

    #[test]
    fn test_usage_lists_every_mode() {
        let text = usage();
        for mode in ["help", "all", "aliyun", "safeline"] {
            assert!(text.contains(mode));
        }
        assert!(text.contains(VERSION));
    }

    #[test]
    fn test_replaced_line_shows_the_old_expiry() {
        use chrono::{TimeZone, Utc};

        let previous = CertificateRecord {
            id: "1".to_string(),
            domains: vec!["example.com".to_string(), "*.example.com".to_string()],
            issuer: Some("R11".to_string()),
            expires_at: Some(Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap()),
        };
        assert_eq!(
            replaced_line(&previous),
            "REPLACED   2026-10-20 08:00:00 (was example.com, *.example.com)"
        );

        let unknown = CertificateRecord {
            domains: Vec::new(),
            expires_at: None,
            ..previous
        };
        assert_eq!(replaced_line(&unknown), "REPLACED   - (was -)");
    }

    #[tokio::test]
    async fn test_help_runs_nothing() {
        assert!(run(Mode::Help).await.is_ok());
    }
}
