//! Remote copy of generated contracts.
//!
//! `ObjectStorage` is the seam the pipeline talks to; `GoogleDriveStorage`
//! is the production implementation, authenticated with a service account.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use moka::future::Cache;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DriveConfig;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens live one hour; refresh a bit earlier.
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(50 * 60);
const TOKEN_CACHE_KEY: &str = "drive";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid service account credentials: {0}")]
    Credentials(String),
    #[error("token exchange failed: {0}")]
    Auth(String),
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage API returned {0}: {1}")]
    Status(u16, String),
    #[error("upload session has no Location header")]
    MissingLocation,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `data` as `remote_name`, returning the remote file id.
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        remote_name: &str,
        mime_type: &str,
    ) -> Result<String, StorageError>;

    /// Upload a file from disk.
    async fn upload_file(
        &self,
        path: &Path,
        remote_name: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(data, remote_name, mime_type).await
    }
}

/// MIME type for an output file; the two contract formats are fixed.
pub fn mime_for_path(path: &Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf".to_string(),
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string()
        }
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// The fields of a Google service account key file this crate needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub async fn from_file(path: &Path) -> Result<Self, StorageError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::Credentials(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Credentials(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, now: i64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StorageError>;
}

/// Fixed bearer token.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StorageError> {
        Ok(self.0.clone())
    }
}

/// OAuth2 JWT-bearer flow for a service account, cached process-wide.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    http_client: reqwest::Client,
    cache: Cache<String, String>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, http_client: reqwest::Client) -> Self {
        let cache = Cache::builder()
            .time_to_live(TOKEN_CACHE_TTL)
            .max_capacity(1)
            .build();
        Self {
            key,
            http_client,
            cache,
        }
    }

    fn signed_assertion(&self) -> Result<String, StorageError> {
        let claims = AssertionClaims::new(&self.key, chrono::Utc::now().timestamp());
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| StorageError::Credentials(e.to_string()))?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| StorageError::Credentials(e.to_string()))
    }

    async fn fetch_token(&self) -> Result<String, StorageError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, StorageError> {
        if let Some(token) = self.cache.get(TOKEN_CACHE_KEY).await {
            return Ok(token);
        }
        let token = self.fetch_token().await?;
        log::debug!("Obtained Google API access token for {}", self.key.client_email);
        self.cache
            .insert(TOKEN_CACHE_KEY.to_string(), token.clone())
            .await;
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Google Drive v3 uploads through a resumable session.
pub struct GoogleDriveStorage {
    api_url: String,
    folder_id: Option<String>,
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleDriveStorage {
    pub fn new(
        api_url: impl Into<String>,
        folder_id: Option<String>,
        http_client: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            folder_id,
            http_client,
            tokens,
        }
    }

    pub async fn from_config(
        config: &DriveConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, StorageError> {
        let key = ServiceAccountKey::from_file(&config.credentials_path).await?;
        let tokens = Arc::new(ServiceAccountTokenSource::new(key, http_client.clone()));
        Ok(Self::new(
            config.api_url.clone(),
            config.folder_id.clone(),
            http_client,
            tokens,
        ))
    }

    async fn error_status(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StorageError::Status(status, body)
    }
}

#[async_trait]
impl ObjectStorage for GoogleDriveStorage {
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        remote_name: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let token = self.tokens.access_token().await?;

        let mut metadata = json!({ "name": remote_name, "mimeType": mime_type });
        if let Some(folder) = &self.folder_id {
            metadata["parents"] = json!([folder]);
        }

        let session = self
            .http_client
            .post(format!("{}/upload/drive/v3/files", self.api_url))
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", "id"),
            ])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(&metadata)
            .send()
            .await?;
        if !session.status().is_success() {
            return Err(Self::error_status(session).await);
        }

        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(StorageError::MissingLocation)?
            .to_string();

        let response = self
            .http_client
            .put(&location)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_status(response).await);
        }

        let created: CreatedFile = response.json().await?;
        log::info!("Uploaded {} to Drive (fileId={})", remote_name, created.id);
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_for_contract_formats() {
        assert_eq!(mime_for_path(&PathBuf::from("a.PDF")), "application/pdf");
        assert_eq!(
            mime_for_path(&PathBuf::from("a.docx")),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(mime_for_path(&PathBuf::from("a.png")), "image/png");
        assert_eq!(mime_for_path(&PathBuf::from("a")), "application/octet-stream");
    }

    #[test]
    fn test_assertion_claims() {
        let key = ServiceAccountKey {
            client_email: "svc@project.iam.gserviceaccount.com".to_string(),
            private_key: String::new(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        let claims = AssertionClaims::new(&key, 1_000);
        assert_eq!(claims.iss, key.client_email);
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.scope, DRIVE_SCOPE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_key_file_token_uri_default() {
        let key: ServiceAccountKey =
            serde_json::from_str(r#"{"client_email":"a@b","private_key":"k"}"#).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }
}
