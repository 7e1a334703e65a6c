//! Download session: a signed cookie remembering the last generated contract.

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub const SESSION_COOKIE: &str = "contrato";
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60; // 1 day

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Output filename inside the output directory
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Per-process signing key for session cookies.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Vec<u8>,
}

impl SessionKeys {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Use the configured secret or fall back to a random one. Sessions then do
    /// not survive a restart.
    pub fn from_secret_or_random(secret: Option<&str>) -> Self {
        match secret {
            Some(s) => Self::new(s.as_bytes().to_vec()),
            None => {
                log::warn!("SESSION_SECRET not set, using a random per-process secret");
                let random = format!(
                    "{}{}",
                    uuid::Uuid::new_v4().simple(),
                    uuid::Uuid::new_v4().simple()
                );
                Self::new(random.into_bytes())
            }
        }
    }

    /// Sign a token pointing at `filename`.
    pub fn issue(&self, filename: &str) -> Result<String, SessionError> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: filename.to_string(),
            exp: (now + SESSION_EXPIRY_SECONDS) as usize,
            iat: now as usize,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?)
    }

    /// Validate and decode a token
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    pub fn cookie(&self, filename: &str) -> Result<Cookie<'static>, SessionError> {
        let token = self.issue(filename)?;
        Ok(Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish())
    }

    /// Filename stored in the request's session cookie, if valid.
    pub fn filename_from_request(&self, req: &HttpRequest) -> Option<String> {
        let cookie = req.cookie(SESSION_COOKIE)?;
        match self.verify(cookie.value()) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                log::warn!("Session cookie rejected: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new("secret");
        let token = keys.issue("ana_1.pdf").unwrap();
        assert_eq!(keys.verify(&token).unwrap().sub, "ana_1.pdf");
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = SessionKeys::new("a").issue("x.pdf").unwrap();
        assert!(SessionKeys::new("b").verify(&token).is_err());
    }

    #[test]
    fn test_random_keys_differ() {
        let a = SessionKeys::from_secret_or_random(None);
        let b = SessionKeys::from_secret_or_random(None);
        let token = a.issue("x.pdf").unwrap();
        assert!(b.verify(&token).is_err());
    }

    #[actix_web::test]
    async fn test_filename_from_request_cookie() {
        let keys = SessionKeys::new("s");
        let cookie = keys.cookie("c.docx").unwrap();
        let req = actix_web::test::TestRequest::default()
            .cookie(cookie)
            .to_http_request();
        assert_eq!(keys.filename_from_request(&req), Some("c.docx".to_string()));

        let req = actix_web::test::TestRequest::default().to_http_request();
        assert_eq!(keys.filename_from_request(&req), None);
    }
}
