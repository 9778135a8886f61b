//! SafeLine WAF API client
//!
//! Talks to the appliance's `/api/open` REST surface. Authentication is either
//! a static API token or a CSRF + password login that yields a JWT.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::types::{
    ApiResponse, CertDetail, CertList, CertNode, CsrfToken, LoginData, LoginRequest,
    UpdateCertRequest,
};
use super::WafCertificateApi;
use crate::config::{SafelineAuth, SafelineConfig};
use crate::error::{Result, SyncError};
use crate::http::{build_client, read_success_body};

const API_TOKEN_HEADER: &str = "X-SLCE-API-TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Authorization {
    None,
    ApiToken(String),
    Bearer(String),
}

#[cfg_attr(test, derive(Debug))]
pub struct SafelineClient {
    http: Client,
    base_url: String,
    authorization: Authorization,
}

impl SafelineClient {
    /// Builds the client without touching the network
    pub fn new(config: &SafelineConfig) -> Result<Self> {
        let http = build_client(config.insecure_tls)?;
        let authorization = match &config.auth {
            SafelineAuth::ApiToken(token) => Authorization::ApiToken(token.expose().to_string()),
            SafelineAuth::Login { .. } => Authorization::None,
        };

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            authorization,
        })
    }

    /// Builds the client and logs in when password auth is configured
    pub async fn connect(config: &SafelineConfig) -> Result<Self> {
        let mut client = Self::new(config)?;
        if let SafelineAuth::Login { user, password } = &config.auth {
            let csrf = client.csrf_token().await?;
            client.login(user, password.expose(), &csrf).await?;
        }
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Authorization::None => request,
            Authorization::ApiToken(token) => request.header(API_TOKEN_HEADER, token),
            Authorization::Bearer(jwt) => request.bearer_auth(jwt),
        }
    }

    async fn get<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        debug!(operation, url = %url, "GET");

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;
        decode(operation, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        debug!(operation, url = %url, "POST");

        let response = self
            .authorize(self.http.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;
        decode(operation, response).await
    }

    pub async fn csrf_token(&self) -> Result<String> {
        let data: Option<CsrfToken> = self.get("Fetch CSRF token", "/api/open/auth/csrf").await?;
        data.map(|d| d.csrf_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::parse("Fetch CSRF token", "no csrf_token in response"))
    }

    pub async fn login(&mut self, user: &str, password: &str, csrf_token: &str) -> Result<()> {
        let request = LoginRequest {
            username: user,
            password,
            csrf_token,
        };
        let data: Option<LoginData> = self.post("Login", "/api/open/auth/login", &request).await?;
        let jwt = data
            .map(|d| d.jwt)
            .filter(|j| !j.is_empty())
            .ok_or_else(|| SyncError::parse("Login", "no jwt in response"))?;

        info!(user, "Logged in to SafeLine");
        self.authorization = Authorization::Bearer(jwt);
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(operation: &str, response: reqwest::Response) -> Result<Option<T>> {
    let body = read_success_body(operation, response).await?;
    let envelope: ApiResponse<T> =
        serde_json::from_str(&body).map_err(|e| SyncError::parse(operation, e))?;
    envelope.into_data(operation)
}

#[async_trait]
impl WafCertificateApi for SafelineClient {
    async fn list_certificates(&self) -> Result<Vec<CertNode>> {
        let data: Option<CertList> = self.get("List certificates", "/api/open/cert").await?;
        Ok(data.unwrap_or_default().nodes)
    }

    async fn certificate_detail(&self, id: u64) -> Result<CertDetail> {
        let operation = "Certificate detail";
        let url = self.url(&format!("/api/open/cert/{}", id));
        debug!(operation, url = %url, "GET");

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::CertificateNotFound(id));
        }

        let data: Option<CertDetail> = decode(operation, response).await?;
        data.ok_or(SyncError::CertificateNotFound(id))
    }

    async fn update_certificate(&self, request: &UpdateCertRequest) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .post("Update certificate", "/api/open/cert", request)
            .await?;
        Ok(())
    }
}
