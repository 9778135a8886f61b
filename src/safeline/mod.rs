//! SafeLine WAF Certificate Sync
//!
//! Replaces one certificate in the appliance's store with the local PEM pair
//! once it has 72 hours or less left. Both binaries go through [`run`].

pub mod client;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::certificate::{CertificateRecord, LocalCertificate};
use crate::config::SafelineConfig;
use crate::error::{Result, SyncError};
use crate::renewal::{self, RenewalDecision};

use client::SafelineClient;
use types::{CertDetail, CertNode, UpdateCertRequest};

/// The `/api/open/cert` calls the sync needs
#[async_trait]
pub trait WafCertificateApi: Send + Sync {
    async fn list_certificates(&self) -> Result<Vec<CertNode>>;

    async fn certificate_detail(&self, id: u64) -> Result<CertDetail>;

    async fn update_certificate(&self, request: &UpdateCertRequest) -> Result<()>;
}

/// Detail and list merged into one record.
///
/// The detail endpoint carries the domains, the list carries issuer and
/// expiry. Detail errors pass through untouched: the client reports a missing
/// id as `CertificateNotFound`, everything else stays a remote failure.
pub async fn fetch_record<A>(api: &A, id: u64) -> Result<CertificateRecord>
where
    A: WafCertificateApi + ?Sized,
{
    let detail = api.certificate_detail(id).await?;

    let nodes = api.list_certificates().await?;
    let node = nodes.into_iter().find(|n| n.id == id);

    let domains = if !detail.acme.domains.is_empty() {
        detail.acme.domains
    } else {
        node.as_ref().map(|n| n.domains.clone()).unwrap_or_default()
    };

    Ok(CertificateRecord {
        id: id.to_string(),
        domains,
        issuer: node
            .as_ref()
            .map(|n| n.issuer.clone())
            .filter(|issuer| !issuer.is_empty()),
        expires_at: node.and_then(|n| n.valid_before),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WafOutcome {
    StillValid { current: CertificateRecord },
    Updated {
        previous: CertificateRecord,
        current: CertificateRecord,
    },
}

impl WafOutcome {
    /// What the appliance serves after the run
    pub fn current(&self) -> &CertificateRecord {
        match self {
            WafOutcome::StillValid { current } | WafOutcome::Updated { current, .. } => current,
        }
    }
}

pub struct WafCertificateSync<'a, A: WafCertificateApi + ?Sized> {
    api: &'a A,
    config: &'a SafelineConfig,
}

impl<'a, A: WafCertificateApi + ?Sized> WafCertificateSync<'a, A> {
    pub fn new(api: &'a A, config: &'a SafelineConfig) -> Self {
        Self { api, config }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<WafOutcome> {
        let id = self.config.cert_id;
        let current = fetch_record(self.api, id).await?;

        match renewal::decide_optional(current.expires_at, now) {
            RenewalDecision::StillValid { remaining } => {
                info!(
                    cert_id = id,
                    domains = %current.domain_list(),
                    expires_at = %current.expiry_display(),
                    hours_left = remaining.num_hours(),
                    "Certificate is still valid, not updating"
                );
                Ok(WafOutcome::StillValid { current })
            }
            RenewalDecision::Replace => {
                if current.expires_at.is_none() {
                    info!(cert_id = id, "No expiry reported for certificate, uploading the local one");
                } else {
                    info!(
                        cert_id = id,
                        expires_at = %current.expiry_display(),
                        "Certificate is about to expire, uploading the local one"
                    );
                }

                let local = LocalCertificate::load(&self.config.cert)?;
                self.api
                    .update_certificate(&UpdateCertRequest::manual(id, local))
                    .await?;
                info!(cert_id = id, "✅ Certificate updated");

                let updated = fetch_record(self.api, id).await?;
                Ok(WafOutcome::Updated {
                    previous: current,
                    current: updated,
                })
            }
        }
    }
}

/// Runs the WAF flow against the configured appliance
pub async fn run(config: &SafelineConfig) -> Result<WafOutcome> {
    info!(server = %config.base_url, cert_id = config.cert_id, "🛡️  Syncing SafeLine certificate");

    let client = SafelineClient::connect(config).await?;
    WafCertificateSync::new(&client, config).run(Utc::now()).await
}
