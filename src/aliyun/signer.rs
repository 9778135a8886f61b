//! Aliyun request signing
//!
//! - OSS control plane: V4 signature (`OSS4-HMAC-SHA256`), unsigned payload.
//! - OpenAPI products (CAS): V3 signature (`ACS3-HMAC-SHA256`), hashed payload.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const OSS_ALGORITHM: &str = "OSS4-HMAC-SHA256";
pub const ACS_ALGORITHM: &str = "ACS3-HMAC-SHA256";
const OSS_UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// RFC 3986 encoding: only `A-Z a-z 0-9 - _ . ~` stay literal
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Lowercases names, trims values, sorts, one `name:value\n` line each
fn canonical_headers(headers: &[(String, String)]) -> (String, Vec<String>) {
    let mut lowered: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    lowered.sort();

    let block = lowered
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect::<String>();
    let names = lowered.into_iter().map(|(k, _)| k).collect();
    (block, names)
}

/// Signs bucket-level OSS requests
pub struct OssV4Signer<'a> {
    pub access_key_id: &'a str,
    pub access_key_secret: &'a str,
    pub region: &'a str,
}

impl OssV4Signer<'_> {
    /// `query` entries with no value are signed as a bare key (`?cname`).
    /// Returns the headers to attach, `Authorization` included.
    pub fn sign(
        &self,
        method: &str,
        bucket: &str,
        query: &[(&str, Option<&str>)],
        content_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers = vec![
            ("x-oss-content-sha256".to_string(), OSS_UNSIGNED_PAYLOAD.to_string()),
            ("x-oss-date".to_string(), datetime.clone()),
        ];
        if let Some(ct) = content_type {
            headers.push(("content-type".to_string(), ct.to_string()));
        }

        let canonical = self.canonical_request(method, bucket, query, &headers);
        let scope = format!("{}/{}/oss/aliyun_v4_request", date, self.region);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            OSS_ALGORITHM,
            datetime,
            scope,
            sha256_hex(canonical.as_bytes())
        );

        let key = format!("aliyun_v4{}", self.access_key_secret);
        let k_date = hmac_sha256(key.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"oss");
        let k_signing = hmac_sha256(&k_service, b"aliyun_v4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        headers.push((
            "authorization".to_string(),
            format!(
                "{} Credential={}/{},Signature={}",
                OSS_ALGORITHM, self.access_key_id, scope, signature
            ),
        ));
        headers
    }

    pub(crate) fn canonical_request(
        &self,
        method: &str,
        bucket: &str,
        query: &[(&str, Option<&str>)],
        headers: &[(String, String)],
    ) -> String {
        let uri = format!("/{}/", percent_encode(bucket));

        let mut pairs: Vec<(String, Option<String>)> = query
            .iter()
            .map(|(k, v)| (percent_encode(k), v.map(percent_encode)))
            .collect();
        pairs.sort();
        let query = pairs
            .into_iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, v),
                None => k,
            })
            .collect::<Vec<_>>()
            .join("&");

        let (header_block, _) = canonical_headers(headers);

        format!(
            "{}\n{}\n{}\n{}\n\n{}",
            method, uri, query, header_block, OSS_UNSIGNED_PAYLOAD
        )
    }
}

/// Signs RPC-style OpenAPI calls
pub struct Acs3Signer<'a> {
    pub access_key_id: &'a str,
    pub access_key_secret: &'a str,
}

/// Per-request inputs that are not part of the credentials
pub struct AcsRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
    pub nonce: &'a str,
}

impl Acs3Signer<'_> {
    pub fn sign(&self, request: &AcsRequest<'_>, now: DateTime<Utc>) -> Vec<(String, String)> {
        let mut headers = vec![
            ("host".to_string(), request.host.to_string()),
            ("x-acs-action".to_string(), request.action.to_string()),
            ("x-acs-version".to_string(), request.version.to_string()),
            (
                "x-acs-date".to_string(),
                now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ),
            ("x-acs-signature-nonce".to_string(), request.nonce.to_string()),
            ("x-acs-content-sha256".to_string(), sha256_hex(request.body)),
        ];
        if let Some(ct) = request.content_type {
            headers.push(("content-type".to_string(), ct.to_string()));
        }

        let (canonical, signed_headers) = self.canonical_request(request.method, &headers);
        let string_to_sign = format!("{}\n{}", ACS_ALGORITHM, sha256_hex(canonical.as_bytes()));
        let signature = hex::encode(hmac_sha256(
            self.access_key_secret.as_bytes(),
            string_to_sign.as_bytes(),
        ));

        headers.push((
            "authorization".to_string(),
            format!(
                "{} Credential={},SignedHeaders={},Signature={}",
                ACS_ALGORITHM, self.access_key_id, signed_headers, signature
            ),
        ));
        headers
    }

    /// Parameters travel in the form body, so the query string is empty
    pub(crate) fn canonical_request(
        &self,
        method: &str,
        headers: &[(String, String)],
    ) -> (String, String) {
        let (header_block, names) = canonical_headers(headers);
        let signed_headers = names.join(";");
        let payload_hash = headers
            .iter()
            .find(|(k, _)| k == "x-acs-content-sha256")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| sha256_hex(b""));

        let canonical = format!(
            "{}\n/\n\n{}\n{}\n{}",
            method, header_block, signed_headers, payload_hash
        );
        (canonical, signed_headers)
    }
}

/// `application/x-www-form-urlencoded` body with RFC 3986 escaping
pub fn form_body(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 15).unwrap()
    }

    fn oss() -> OssV4Signer<'static> {
        OssV4Signer {
            access_key_id: "LTAI5tExample",
            access_key_secret: "secretExample",
            region: "cn-hangzhou",
        }
    }

    fn header<'h>(headers: &'h [(String, String)], name: &str) -> &'h str {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_percent_encode_rfc3986() {
        assert_eq!(percent_encode("a b*~"), "a%20b%2A~");
        assert_eq!(percent_encode("img.example.com_2024"), "img.example.com_2024");
        assert_eq!(percent_encode("x+y/z="), "x%2By%2Fz%3D");
    }

    #[test]
    fn test_oss_canonical_request_layout() {
        let headers = vec![
            ("x-oss-date".to_string(), "20240601T083015Z".to_string()),
            ("x-oss-content-sha256".to_string(), "UNSIGNED-PAYLOAD".to_string()),
        ];
        let canonical = oss().canonical_request(
            "POST",
            "images",
            &[("comp", Some("add")), ("cname", None)],
            &headers,
        );

        assert_eq!(
            canonical,
            "POST\n/images/\ncname&comp=add\n\
             x-oss-content-sha256:UNSIGNED-PAYLOAD\nx-oss-date:20240601T083015Z\n\
             \n\nUNSIGNED-PAYLOAD"
        );
    }

    #[test]
    fn test_oss_signature_shape_and_determinism() {
        let a = oss().sign("GET", "images", &[("cname", None)], None, now());
        let b = oss().sign("GET", "images", &[("cname", None)], None, now());
        assert_eq!(a, b);

        let auth = header(&a, "authorization");
        assert!(auth.starts_with(
            "OSS4-HMAC-SHA256 Credential=LTAI5tExample/20240601/cn-hangzhou/oss/aliyun_v4_request,Signature="
        ));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(header(&a, "x-oss-date"), "20240601T083015Z");
    }

    #[test]
    fn test_oss_signature_depends_on_secret() {
        let other = OssV4Signer {
            access_key_secret: "different",
            ..oss()
        };
        let a = oss().sign("GET", "images", &[("cname", None)], None, now());
        let b = other.sign("GET", "images", &[("cname", None)], None, now());
        assert_ne!(header(&a, "authorization"), header(&b, "authorization"));
    }

    #[test]
    fn test_acs3_signature() {
        let signer = Acs3Signer {
            access_key_id: "LTAI5tExample",
            access_key_secret: "secretExample",
        };
        let body = form_body(&[("CertId", "123".to_string())]);
        let request = AcsRequest {
            method: "POST",
            host: "cas.aliyuncs.com",
            action: "DeleteUserCertificate",
            version: "2020-04-07",
            content_type: Some("application/x-www-form-urlencoded"),
            body: body.as_bytes(),
            nonce: "3156853299f313e23d1673dc12e1703d",
        };

        let headers = signer.sign(&request, now());
        assert_eq!(header(&headers, "x-acs-date"), "2024-06-01T08:30:15Z");
        assert_eq!(header(&headers, "x-acs-content-sha256"), sha256_hex(body.as_bytes()));

        let auth = header(&headers, "authorization");
        assert!(auth.starts_with(
            "ACS3-HMAC-SHA256 Credential=LTAI5tExample,\
             SignedHeaders=content-type;host;x-acs-action;x-acs-content-sha256;x-acs-date;x-acs-signature-nonce;x-acs-version,\
             Signature="
        ));
    }

    #[test]
    fn test_acs3_canonical_request_layout() {
        let signer = Acs3Signer {
            access_key_id: "id",
            access_key_secret: "secret",
        };
        let headers = vec![
            ("x-acs-action".to_string(), "GetUserCertificateDetail".to_string()),
            ("host".to_string(), "cas.aliyuncs.com".to_string()),
            ("x-acs-content-sha256".to_string(), sha256_hex(b"")),
        ];
        let (canonical, signed) = signer.canonical_request("POST", &headers);

        assert_eq!(signed, "host;x-acs-action;x-acs-content-sha256");
        assert!(canonical.starts_with("POST\n/\n\nhost:cas.aliyuncs.com\n"));
        assert!(canonical.ends_with(&format!(
            "\n\nhost;x-acs-action;x-acs-content-sha256\n{}",
            sha256_hex(b"")
        )));
    }

    #[test]
    fn test_sha256_of_empty_body() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_form_body() {
        let body = form_body(&[
            ("Name", "img.example.com_202406010830".to_string()),
            ("Cert", "-----BEGIN CERTIFICATE-----MII+/=".to_string()),
        ]);
        assert_eq!(
            body,
            "Name=img.example.com_202406010830&Cert=-----BEGIN%20CERTIFICATE-----MII%2B%2F%3D"
        );
    }
}
