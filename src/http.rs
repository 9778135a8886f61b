//! Shared HTTP plumbing

use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("cert-sync/", env!("CARGO_PKG_VERSION"));

/// Builds the client used for one flow.
///
/// `insecure` disables certificate verification and must come from explicit
/// configuration.
pub fn build_client(insecure: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT);

    if insecure {
        warn!("⚠️  TLS certificate verification is disabled for this client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| SyncError::remote("HTTP client setup", e))
}

/// Reads the body and fails on any non-success status
pub async fn read_success_body(operation: &str, response: Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SyncError::remote(operation, e))?;

    debug!(operation, status = %status, body_len = body.len(), "Response received");

    if !status.is_success() {
        return Err(SyncError::remote(
            operation,
            format!("HTTP {}: {}", status, truncate(&body, 512)),
        ));
    }

    Ok(body)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456...");
    }

    #[test]
    fn test_build_client_both_modes() {
        assert!(build_client(false).is_ok());
        assert!(build_client(true).is_ok());
    }
}
