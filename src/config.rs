//! Environment Configuration
//!
//! Each flow gets an explicit configuration struct, built once at startup and
//! passed by reference. Loaders take a lookup function so tests never touch
//! the process environment.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, SyncError};

pub const DEFAULT_SAFELINE_URL: &str = "https://127.0.0.1:9443";
pub const DEFAULT_CERT_ID: &str = "1";
pub const DEFAULT_LOGIN_USER: &str = "admin";
pub const DEFAULT_CAS_ENDPOINT: &str = "cas.aliyuncs.com";

/// An access secret or token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Paths of the certificate chain and private key on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub crt: PathBuf,
    pub key: PathBuf,
}

/// Object storage side: OSS bucket plus CAS account
#[derive(Debug, Clone)]
pub struct AliyunConfig {
    pub access_key_id: String,
    pub access_key_secret: Credential,
    pub oss_endpoint: String,
    pub oss_region: String,
    pub bucket: String,
    pub domain: String,
    pub cas_endpoint: String,
    pub cert: CertPaths,
}

/// How the WAF client proves who it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafelineAuth {
    /// Static `X-SLCE-API-TOKEN` header
    ApiToken(Credential),
    /// CSRF token + username/password login, then a bearer JWT
    Login { user: String, password: Credential },
}

#[derive(Debug, Clone)]
pub struct SafelineConfig {
    pub base_url: String,
    pub auth: SafelineAuth,
    pub cert_id: u64,
    pub cert: CertPaths,
    /// Skip TLS verification toward the appliance. Off unless asked for.
    pub insecure_tls: bool,
}

/// Returns the trimmed value, or `None` when unset or blank
fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &'static str, hint: &'static str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(lookup, key).ok_or(SyncError::ConfigMissing { field: key, hint })
}

/// Boolean environment values, shared with the `DEBUG` flag.
///
/// `y yes t true on 1` and `n no f false off 0` in any case; blank is false.
/// Anything else is rejected.
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "" | "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        other => Err(format!("'{}' is not a boolean, use true or false", other)),
    }
}

/// `oss-cn-hangzhou.aliyuncs.com` -> `cn-hangzhou`
pub fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let first = host.split('.').next()?;
    let region = first.strip_prefix("oss-")?;
    let region = region.strip_suffix("-internal").unwrap_or(region);
    if region.is_empty() {
        None
    } else {
        Some(region.to_string())
    }
}

fn cert_paths<F>(lookup: &F, crt_hint: &'static str, key_hint: &'static str) -> Result<CertPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let crt = required(lookup, "CERT_CRT_PATH", crt_hint)?;
    let key = required(lookup, "CERT_KEY_PATH", key_hint)?;
    Ok(CertPaths {
        crt: PathBuf::from(crt),
        key: PathBuf::from(key),
    })
}

impl AliyunConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Validates in a fixed order and stops at the first blank value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key_id = required(&lookup, "ALIYUN_ACCESS_KEY_ID", "RAM user AccessKey ID")?;
        let access_key_secret = required(&lookup, "ALIYUN_ACCESS_SECRET", "RAM user AccessKey secret")?;
        let oss_endpoint = required(
            &lookup,
            "ALIYUN_OSS_Endpoint",
            "OSS service endpoint, see https://api.aliyun.com/product/Oss",
        )?;
        let bucket = required(&lookup, "ALIYUN_OSS_BUCKET_NAME", "OSS bucket name")?;
        let domain = required(
            &lookup,
            "ALIYUN_OSS_DOMAIN",
            "custom domain already added under the bucket's domain management",
        )?;
        let cert = cert_paths(
            &lookup,
            "path of the domain's certificate (public part)",
            "path of the domain's private key",
        )?;

        let oss_region = match non_blank(&lookup, "ALIYUN_OSS_REGION") {
            Some(region) => region,
            None => region_from_endpoint(&oss_endpoint).ok_or_else(|| SyncError::InvalidConfig {
                field: "ALIYUN_OSS_Endpoint",
                reason: format!(
                    "cannot derive a region from '{}', set ALIYUN_OSS_REGION",
                    oss_endpoint
                ),
            })?,
        };

        let cas_endpoint = non_blank(&lookup, "ALIYUN_CAS_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_CAS_ENDPOINT.to_string());

        Ok(Self {
            access_key_id,
            access_key_secret: Credential::new(access_key_secret),
            oss_endpoint,
            oss_region,
            bucket,
            domain,
            cas_endpoint,
            cert,
        })
    }
}

impl SafelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = non_blank(&lookup, "BASE_SERVER_URL")
            .unwrap_or_else(|| DEFAULT_SAFELINE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let auth = match non_blank(&lookup, "API_TOKEN") {
            Some(token) => SafelineAuth::ApiToken(Credential::new(token)),
            None => {
                let password = required(
                    &lookup,
                    "LOGIN_PASSWORD",
                    "SafeLine needs API_TOKEN, or LOGIN_PASSWORD for a session login",
                )?;
                SafelineAuth::Login {
                    user: non_blank(&lookup, "LOGIN_USER")
                        .unwrap_or_else(|| DEFAULT_LOGIN_USER.to_string()),
                    password: Credential::new(password),
                }
            }
        };

        let cert_id_raw =
            non_blank(&lookup, "CERT_ID").unwrap_or_else(|| DEFAULT_CERT_ID.to_string());
        let cert_id = cert_id_raw
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| SyncError::InvalidConfig {
                field: "CERT_ID",
                reason: format!("'{}' is not a positive integer", cert_id_raw),
            })?;

        let cert = cert_paths(
            &lookup,
            "path of the new certificate for the WAF site",
            "path of the new private key for the WAF site",
        )?;

        let insecure_tls = match non_blank(&lookup, "SAFELINE_INSECURE_TLS") {
            Some(value) => parse_bool(&value).map_err(|reason| SyncError::InvalidConfig {
                field: "SAFELINE_INSECURE_TLS",
                reason,
            })?,
            None => false,
        };

        Ok(Self {
            base_url,
            auth,
            cert_id,
            cert,
            insecure_tls,
        })
    }
}
