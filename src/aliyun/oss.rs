//! OSS bucket custom-domain (CNAME) calls

use chrono::Utc;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::signer::OssV4Signer;
use super::{BoundCertificate, CnameBinding};
use crate::config::AliyunConfig;
use crate::error::{Result, SyncError};
use crate::http::truncate;

// ============================================================
// XML Bodies
// ============================================================

#[derive(Debug, Deserialize)]
struct ListCnameResult {
    #[serde(rename = "Cname", default)]
    cnames: Vec<CnameInfo>,
}

#[derive(Debug, Deserialize)]
struct CnameInfo {
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Certificate")]
    certificate: Option<CnameCertificate>,
}

#[derive(Debug, Deserialize)]
struct CnameCertificate {
    #[serde(rename = "CertId", default)]
    cert_id: String,
    #[serde(rename = "ValidEndDate", default)]
    valid_end_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "BucketCnameConfiguration")]
struct BucketCnameConfiguration {
    #[serde(rename = "Cname")]
    cname: CnameConfiguration,
}

#[derive(Debug, Serialize)]
struct CnameConfiguration {
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "CertificateConfiguration")]
    certificate: CertificateConfiguration,
}

#[derive(Debug, Serialize)]
struct CertificateConfiguration {
    #[serde(rename = "CertId", skip_serializing_if = "Option::is_none")]
    cert_id: Option<String>,
    #[serde(rename = "DeleteCertificate", skip_serializing_if = "Option::is_none")]
    delete_certificate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OssErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "RequestId", default)]
    request_id: String,
}

impl From<CnameInfo> for CnameBinding {
    fn from(info: CnameInfo) -> Self {
        let certificate = info
            .certificate
            .filter(|c| !c.cert_id.trim().is_empty())
            .map(|c| BoundCertificate {
                cert_id: c.cert_id,
                valid_end_date: c.valid_end_date,
            });

        Self {
            domain: info.domain,
            certificate,
        }
    }
}

fn bind_body(domain: &str, cert_identifier: &str) -> Result<String> {
    to_xml(&BucketCnameConfiguration {
        cname: CnameConfiguration {
            domain: domain.to_string(),
            certificate: CertificateConfiguration {
                cert_id: Some(cert_identifier.to_string()),
                delete_certificate: None,
            },
        },
    })
}

fn unbind_body(domain: &str) -> Result<String> {
    to_xml(&BucketCnameConfiguration {
        cname: CnameConfiguration {
            domain: domain.to_string(),
            certificate: CertificateConfiguration {
                cert_id: None,
                delete_certificate: Some(true),
            },
        },
    })
}

fn to_xml(config: &BucketCnameConfiguration) -> Result<String> {
    quick_xml::se::to_string(config).map_err(|e| SyncError::parse("PutCname body", e))
}

fn parse_list(body: &str) -> Result<Vec<CnameBinding>> {
    let parsed: ListCnameResult =
        quick_xml::de::from_str(body).map_err(|e| SyncError::parse("ListCname", e))?;
    Ok(parsed.cnames.into_iter().map(CnameBinding::from).collect())
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match quick_xml::de::from_str::<OssErrorBody>(body) {
        Ok(err) if !err.code.is_empty() => format!(
            "HTTP {}: {} {} (RequestId {})",
            status, err.code, err.message, err.request_id
        ),
        _ => format!("HTTP {}: {}", status, truncate(body, 512)),
    }
}

// ============================================================
// Client
// ============================================================

pub struct OssClient {
    http: Client,
    bucket_url: String,
    bucket: String,
    region: String,
    access_key_id: String,
    access_key_secret: String,
}

impl OssClient {
    pub fn new(http: Client, config: &AliyunConfig) -> Self {
        let endpoint = config.oss_endpoint.trim_end_matches('/');
        let (scheme, host) = match endpoint.split_once("://") {
            Some((scheme, host)) => (scheme, host),
            None => ("https", endpoint),
        };

        Self {
            http,
            bucket_url: format!("{}://{}.{}/", scheme, config.bucket, host),
            bucket: config.bucket.clone(),
            region: config.oss_region.clone(),
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.expose().to_string(),
        }
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        query: &[(&str, Option<&str>)],
        body: Option<String>,
    ) -> Result<String> {
        let signer = OssV4Signer {
            access_key_id: &self.access_key_id,
            access_key_secret: &self.access_key_secret,
            region: &self.region,
        };
        let content_type = body.as_ref().map(|_| "application/xml");
        let headers = signer.sign(method.as_str(), &self.bucket, query, content_type, Utc::now());

        let query_string = query
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, v),
                None => k.to_string(),
            })
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.bucket_url, query_string);

        debug!(operation, method = %method, url = %url, "Calling OSS");

        let mut request = self.http.request(method, &url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;

        debug!(operation, status = %status, "OSS responded");

        if !status.is_success() {
            return Err(SyncError::remote(operation, error_message(status, &text)));
        }
        Ok(text)
    }

    /// All custom domains of the bucket with their certificate state
    pub async fn list_cnames(&self) -> Result<Vec<CnameBinding>> {
        let body = self
            .send("ListCname", Method::GET, &[("cname", None)], None)
            .await?;
        parse_list(&body)
    }

    /// Attaches a CAS certificate (`<id>-<region>`) to the domain
    pub async fn bind_certificate(&self, domain: &str, cert_identifier: &str) -> Result<()> {
        let body = bind_body(domain, cert_identifier)?;
        self.send(
            "PutCname (bind certificate)",
            Method::POST,
            &[("cname", None), ("comp", Some("add"))],
            Some(body),
        )
        .await?;
        Ok(())
    }

    /// Detaches whatever certificate the domain currently serves
    pub async fn unbind_certificate(&self, domain: &str) -> Result<()> {
        let body = unbind_body(domain)?;
        self.send(
            "PutCname (unbind certificate)",
            Method::POST,
            &[("cname", None), ("comp", Some("add"))],
            Some(body),
        )
        .await?;
        Ok(())
    }
}
