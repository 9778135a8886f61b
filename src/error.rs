//! Error taxonomy shared by both sync flows.
//!
//! Every variant is fatal for the run that produced it. A certificate that is
//! still valid is reported through the flow outcome, never through an error.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A required configuration value is blank
    #[error("{field} must not be empty: {hint}")]
    ConfigMissing {
        field: &'static str,
        hint: &'static str,
    },

    /// A configuration value is present but unusable
    #[error("Invalid value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Network failure, non-success status or an error envelope
    #[error("{operation} failed: {message}")]
    RemoteCallFailed { operation: String, message: String },

    /// The remote answered with a body we could not decode
    #[error("Failed to parse {operation} response: {message}")]
    ResponseParseFailed { operation: String, message: String },

    /// Reading the local certificate or key failed
    #[error("Failed to read {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bucket {bucket} has no custom domain {domain} bound")]
    DomainNotBound { bucket: String, domain: String },

    #[error("Certificate {0} does not exist on the WAF")]
    CertificateNotFound(u64),

    /// CAS reports the certificate we just uploaded as expired
    #[error("Uploaded certificate {identifier} for {domain} is already expired")]
    UploadedCertificateExpired { domain: String, identifier: String },

    #[error("Unknown mode '{0}', expected one of: help, all, aliyun, safeline")]
    UnknownMode(String),
}

impl SyncError {
    pub fn remote(operation: impl Into<String>, message: impl ToString) -> Self {
        SyncError::RemoteCallFailed {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(operation: impl Into<String>, message: impl ToString) -> Self {
        SyncError::ResponseParseFailed {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_missing_message() {
        let err = SyncError::ConfigMissing {
            field: "ALIYUN_OSS_DOMAIN",
            hint: "bind the domain to the bucket first",
        };
        assert_eq!(
            err.to_string(),
            "ALIYUN_OSS_DOMAIN must not be empty: bind the domain to the bucket first"
        );
    }

    #[test]
    fn test_remote_helper() {
        let err = SyncError::remote("ListCname", "403 Forbidden");
        assert!(matches!(err, SyncError::RemoteCallFailed { .. }));
        assert_eq!(err.to_string(), "ListCname failed: 403 Forbidden");
    }
}
