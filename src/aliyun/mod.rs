//! Aliyun OSS Certificate Sync
//!
//! Keeps the HTTPS certificate of a bucket's custom domain fresh:
//!
//! 1. list the bucket's CNAME bindings and find the configured domain
//! 2. no certificate attached: upload the local one and bind it
//! 3. certificate attached and more than 72 hours left: nothing to do
//! 4. otherwise unbind it, delete it from CAS, upload the local one, bind it
//!
//! Any failing call ends the run. Nothing is retried or rolled back.

pub mod cas;
pub mod oss;
pub mod signer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::certificate::{CertificateRecord, LocalCertificate};
use crate::config::AliyunConfig;
use crate::error::{Result, SyncError};
use crate::http::build_client;
use crate::renewal::{self, RenewalDecision};

use cas::CasClient;
use oss::OssClient;

// ============================================================
// Remote State
// ============================================================

/// One custom domain of the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameBinding {
    pub domain: String,
    pub certificate: Option<BoundCertificate>,
}

/// Certificate currently served for a custom domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCertificate {
    /// `<cas id>-<region>`, e.g. `18151516-cn-hangzhou`
    pub cert_id: String,
    pub valid_end_date: String,
}

impl BoundCertificate {
    /// Numeric CAS id, the part before the region suffix
    pub fn cas_id(&self) -> Result<i64> {
        let numeric = self
            .cert_id
            .split_once('-')
            .map_or(self.cert_id.as_str(), |(id, _)| id);
        numeric.trim().parse().map_err(|e| {
            SyncError::parse("ListCname", format!("CertId '{}': {}", self.cert_id, e))
        })
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        renewal::parse_oss_date(&self.valid_end_date)
    }

    pub fn to_record(&self, domain: &str) -> Result<CertificateRecord> {
        Ok(CertificateRecord {
            id: self.cert_id.clone(),
            domains: vec![domain.to_string()],
            issuer: None,
            expires_at: Some(self.expires_at()?),
        })
    }
}

/// What CAS knows about an uploaded certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetail {
    /// Identifier OSS expects when binding, `<id>-<region>`
    pub identifier: String,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    BoundWithoutCertificate,
    BoundWithCertificate(BoundCertificate),
}

/// Linear search for the configured domain
pub fn binding_state(bindings: &[CnameBinding], domain: &str) -> BindingState {
    match bindings.iter().find(|b| b.domain == domain) {
        None => BindingState::Unbound,
        Some(CnameBinding {
            certificate: None, ..
        }) => BindingState::BoundWithoutCertificate,
        Some(CnameBinding {
            certificate: Some(cert),
            ..
        }) => BindingState::BoundWithCertificate(cert.clone()),
    }
}

// ============================================================
// API Seam
// ============================================================

/// The OSS and CAS calls the sync needs
#[async_trait]
pub trait BucketCertificateApi: Send + Sync {
    async fn list_cnames(&self) -> Result<Vec<CnameBinding>>;

    async fn unbind_certificate(&self, domain: &str) -> Result<()>;

    async fn delete_certificate(&self, cert_id: i64) -> Result<()>;

    /// Returns the numeric CAS id of the new certificate
    async fn upload_certificate(&self, name: &str, cert: &LocalCertificate) -> Result<i64>;

    async fn certificate_detail(&self, cert_id: i64) -> Result<CertificateDetail>;

    async fn bind_certificate(&self, domain: &str, cert_identifier: &str) -> Result<()>;
}

/// Live OSS + CAS implementation
pub struct AliyunClient {
    oss: OssClient,
    cas: CasClient,
}

impl AliyunClient {
    pub fn new(config: &AliyunConfig) -> Result<Self> {
        let http = build_client(false)?;
        Ok(Self {
            oss: OssClient::new(http.clone(), config),
            cas: CasClient::new(http, config),
        })
    }
}

#[async_trait]
impl BucketCertificateApi for AliyunClient {
    async fn list_cnames(&self) -> Result<Vec<CnameBinding>> {
        self.oss.list_cnames().await
    }

    async fn unbind_certificate(&self, domain: &str) -> Result<()> {
        self.oss.unbind_certificate(domain).await
    }

    async fn delete_certificate(&self, cert_id: i64) -> Result<()> {
        self.cas.delete_user_certificate(cert_id).await
    }

    async fn upload_certificate(&self, name: &str, cert: &LocalCertificate) -> Result<i64> {
        self.cas
            .upload_user_certificate(name, &cert.crt, &cert.key)
            .await
    }

    async fn certificate_detail(&self, cert_id: i64) -> Result<CertificateDetail> {
        self.cas.user_certificate_detail(cert_id).await
    }

    async fn bind_certificate(&self, domain: &str, cert_identifier: &str) -> Result<()> {
        self.oss.bind_certificate(domain, cert_identifier).await
    }
}

// ============================================================
// Sync Flow
// ============================================================

/// A mutating call that went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketAction {
    Unbind { domain: String },
    Delete { cert_id: i64 },
    Upload { cert_id: i64 },
    Bind { identifier: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketOutcome {
    /// Bound certificate has more than 72 hours left
    StillValid { current: CertificateRecord },
    /// Domain had no certificate, the local one is now bound
    Bound { identifier: String },
    /// Expiring certificate was swapped for the local one
    Replaced { previous: String, identifier: String },
}

pub struct BucketCertificateSync<'a, A: BucketCertificateApi + ?Sized> {
    api: &'a A,
    config: &'a AliyunConfig,
    actions: Vec<BucketAction>,
}

impl<'a, A: BucketCertificateApi + ?Sized> BucketCertificateSync<'a, A> {
    pub fn new(api: &'a A, config: &'a AliyunConfig) -> Self {
        Self {
            api,
            config,
            actions: Vec::new(),
        }
    }

    /// Mutating calls completed so far, in order
    pub fn actions(&self) -> &[BucketAction] {
        &self.actions
    }

    pub async fn run(&mut self, now: DateTime<Utc>) -> Result<BucketOutcome> {
        let config = self.config;
        let domain = config.domain.as_str();

        let bindings = self.api.list_cnames().await?;
        match binding_state(&bindings, domain) {
            BindingState::Unbound => Err(SyncError::DomainNotBound {
                bucket: config.bucket.clone(),
                domain: domain.to_string(),
            }),

            BindingState::BoundWithoutCertificate => {
                info!(domain, "Domain has no certificate yet, uploading and binding the local one");
                let local = LocalCertificate::load_single_line(&config.cert)?;
                let identifier = self.upload_and_bind(&local, now).await?;
                info!(domain, identifier = %identifier, "✅ Certificate bound");
                Ok(BucketOutcome::Bound { identifier })
            }

            BindingState::BoundWithCertificate(current) => {
                info!(domain, cert_id = %current.cert_id, "Domain is bound with a certificate, checking expiry");
                let record = current.to_record(domain)?;

                if let RenewalDecision::StillValid { remaining } =
                    renewal::decide_optional(record.expires_at, now)
                {
                    info!(
                        domain,
                        expires_at = %record.expiry_display(),
                        hours_left = remaining.num_hours(),
                        "Certificate is still valid, not updating"
                    );
                    return Ok(BucketOutcome::StillValid { current: record });
                }

                info!(
                    domain,
                    expires_at = %record.expiry_display(),
                    "Certificate is about to expire, replacing it with the local one"
                );

                let previous_id = current.cas_id()?;
                // Read before anything destructive happens
                let local = LocalCertificate::load_single_line(&config.cert)?;

                self.api.unbind_certificate(domain).await?;
                self.actions.push(BucketAction::Unbind {
                    domain: domain.to_string(),
                });

                self.api.delete_certificate(previous_id).await?;
                self.actions.push(BucketAction::Delete {
                    cert_id: previous_id,
                });

                let identifier = self.upload_and_bind(&local, now).await?;
                info!(domain, identifier = %identifier, "✅ Certificate replaced");
                Ok(BucketOutcome::Replaced {
                    previous: current.cert_id,
                    identifier,
                })
            }
        }
    }

    async fn upload_and_bind(&mut self, local: &LocalCertificate, now: DateTime<Utc>) -> Result<String> {
        let config = self.config;
        let domain = config.domain.as_str();
        let name = format!("{}_{}", domain, now.format("%Y%m%d%H%M"));

        let cert_id = self.api.upload_certificate(&name, local).await?;
        self.actions.push(BucketAction::Upload { cert_id });
        info!(domain, cert_id, name = %name, "Uploaded certificate to CAS");

        let detail = self.api.certificate_detail(cert_id).await?;
        if detail.expired {
            return Err(SyncError::UploadedCertificateExpired {
                domain: domain.to_string(),
                identifier: detail.identifier,
            });
        }

        self.api.bind_certificate(domain, &detail.identifier).await?;
        self.actions.push(BucketAction::Bind {
            identifier: detail.identifier.clone(),
        });
        Ok(detail.identifier)
    }
}

/// Runs the bucket flow against the live Aliyun APIs
pub async fn run(config: &AliyunConfig) -> Result<BucketOutcome> {
    info!(bucket = %config.bucket, domain = %config.domain, "🔐 Syncing OSS custom domain certificate");

    let client = AliyunClient::new(config)?;
    let mut sync = BucketCertificateSync::new(&client, config);

    let result = sync.run(Utc::now()).await;
    if result.is_err() && !sync.actions().is_empty() {
        warn!(
            completed = ?sync.actions(),
            "Run aborted after remote changes, nothing was rolled back"
        );
    }
    result
}
