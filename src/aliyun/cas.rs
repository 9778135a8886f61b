//! Certificate Management Service (CAS) calls
//!
//! RPC-style OpenAPI, version 2020-04-07. Parameters go in a form body so
//! that PEM material never ends up in a URL.

use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::signer::{form_body, Acs3Signer, AcsRequest};
use super::CertificateDetail;
use crate::config::AliyunConfig;
use crate::error::{Result, SyncError};
use crate::http::truncate;

const CAS_API_VERSION: &str = "2020-04-07";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Deserialize)]
struct UploadUserCertificateResponse {
    #[serde(rename = "CertId")]
    cert_id: i64,
}

#[derive(Debug, Deserialize)]
struct UserCertificateDetailResponse {
    #[serde(rename = "CertIdentifier", default)]
    cert_identifier: String,
    #[serde(rename = "Expired", default)]
    expired: bool,
}

#[derive(Debug, Deserialize)]
struct CasErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "RequestId", default)]
    request_id: String,
}

pub struct CasClient {
    http: Client,
    host: String,
    access_key_id: String,
    access_key_secret: String,
}

impl CasClient {
    pub fn new(http: Client, config: &AliyunConfig) -> Self {
        let host = config
            .cas_endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        Self {
            http,
            host,
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.expose().to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, String)]) -> Result<T> {
        let body = form_body(params);
        let nonce = Uuid::new_v4().simple().to_string();
        let signer = Acs3Signer {
            access_key_id: &self.access_key_id,
            access_key_secret: &self.access_key_secret,
        };
        let headers = signer.sign(
            &AcsRequest {
                method: "POST",
                host: &self.host,
                action,
                version: CAS_API_VERSION,
                content_type: Some(FORM_CONTENT_TYPE),
                body: body.as_bytes(),
                nonce: &nonce,
            },
            Utc::now(),
        );

        let url = format!("https://{}/", self.host);
        debug!(action, url = %url, "Calling CAS");

        let mut request = self.http.post(&url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::remote(action, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::remote(action, e))?;

        debug!(action, status = %status, "CAS responded");

        if !status.is_success() {
            let message = match serde_json::from_str::<CasErrorBody>(&text) {
                Ok(err) if !err.code.is_empty() => format!(
                    "HTTP {}: {} {} (RequestId {})",
                    status, err.code, err.message, err.request_id
                ),
                _ => format!("HTTP {}: {}", status, truncate(&text, 512)),
            };
            return Err(SyncError::remote(action, message));
        }

        serde_json::from_str(&text).map_err(|e| SyncError::parse(action, e))
    }

    /// Uploads a certificate/key pair, returns the numeric CAS id
    pub async fn upload_user_certificate(&self, name: &str, cert: &str, key: &str) -> Result<i64> {
        let response: UploadUserCertificateResponse = self
            .call(
                "UploadUserCertificate",
                &[
                    ("Name", name.to_string()),
                    ("Cert", cert.to_string()),
                    ("Key", key.to_string()),
                ],
            )
            .await?;
        Ok(response.cert_id)
    }

    pub async fn user_certificate_detail(&self, cert_id: i64) -> Result<CertificateDetail> {
        let response: UserCertificateDetailResponse = self
            .call(
                "GetUserCertificateDetail",
                &[
                    ("CertId", cert_id.to_string()),
                    ("CertFilter", "true".to_string()),
                ],
            )
            .await?;

        if response.cert_identifier.is_empty() {
            return Err(SyncError::parse(
                "GetUserCertificateDetail",
                format!("certificate {} has no CertIdentifier", cert_id),
            ));
        }

        Ok(CertificateDetail {
            identifier: response.cert_identifier,
            expired: response.expired,
        })
    }

    pub async fn delete_user_certificate(&self, cert_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .call("DeleteUserCertificate", &[("CertId", cert_id.to_string())])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_response_shape() {
        let json = r#"{
            "RequestId": "0E6B6C9E-4C2B-5F3B-8C1B-B1D1C9A3E1F4",
            "Id": 18173192,
            "Name": "img.example.com_202406010830",
            "CertIdentifier": "18173192-cn-hangzhou",
            "Expired": false,
            "EndDate": "2024-08-30"
        }"#;
        let parsed: UserCertificateDetailResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.cert_identifier, "18173192-cn-hangzhou");
        assert!(!parsed.expired);
    }

    #[test]
    fn test_upload_response_shape() {
        let parsed: UploadUserCertificateResponse =
            serde_json::from_str(r#"{"RequestId": "abc", "CertId": 18173192}"#).unwrap();
        assert_eq!(parsed.cert_id, 18173192);
    }

    #[test]
    fn test_error_body_shape() {
        let parsed: CasErrorBody = serde_json::from_str(
            r#"{"RequestId":"r-1","HostId":"cas.aliyuncs.com","Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found."}"#,
        )
        .unwrap();
        assert_eq!(parsed.code, "InvalidAccessKeyId.NotFound");
        assert_eq!(parsed.request_id, "r-1");
    }
}
