//! Transactional email through the Brevo HTTP API.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::BrevoConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("BREVO_API_KEY no configurada")]
    NotConfigured,
    #[error("failed to read attachment {0}: {1}")]
    Attachment(String, #[source] std::io::Error),
    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}: {1}")]
    Status(u16, String),
}

/// A plain-text email with an optional file attached.
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub attachment: Option<PathBuf>,
    pub cc: Vec<String>,
    pub reply_to: Option<String>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send `message`, returning the provider's message id.
    async fn send(&self, message: EmailMessage) -> Result<String, EmailError>;
}

#[derive(Debug, Serialize)]
struct Address {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Address {
    fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Attachment {
    content: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest {
    sender: Address,
    to: Vec<Address>,
    subject: String,
    text_content: String,
    html_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<Attachment>,
}

/// Plain text to the minimal HTML body Brevo renders.
pub fn html_body(text: &str, phone: &str) -> String {
    let mut html = format!("<p>{}</p>", text.replace('\n', "<br>"));
    if !phone.is_empty() {
        html.push_str(&format!("<p><strong>Teléfono:</strong> {}</p>", phone));
    }
    html
}

async fn read_attachment(path: &Path) -> Result<Attachment, EmailError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EmailError::Attachment(path.display().to_string(), e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "adjunto".to_string());
    Ok(Attachment {
        content: STANDARD.encode(bytes),
        name,
    })
}

fn message_id(body: &Value) -> String {
    if let Some(id) = body.get("messageId").and_then(Value::as_str) {
        return id.to_string();
    }
    body.get("messageIds")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct BrevoEmailClient {
    http_client: reqwest::Client,
    config: BrevoConfig,
}

impl BrevoEmailClient {
    pub fn new(config: BrevoConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            config,
        }
    }

    async fn build_request(&self, message: EmailMessage) -> Result<SendEmailRequest, EmailError> {
        let mut cc = message.cc;
        if let Some(company_cc) = &self.config.cc {
            if !cc.contains(company_cc) {
                cc.push(company_cc.clone());
            }
        }

        let attachment = match &message.attachment {
            Some(path) => vec![read_attachment(path).await?],
            None => Vec::new(),
        };

        Ok(SendEmailRequest {
            sender: Address {
                email: self.config.from_email.clone(),
                name: Some(self.config.from_name.clone()),
            },
            to: message.to.into_iter().map(Address::new).collect(),
            html_content: html_body(&message.text, &self.config.phone),
            text_content: message.text,
            subject: message.subject,
            reply_to: message.reply_to.map(Address::new),
            cc: cc.into_iter().filter(|c| !c.is_empty()).map(Address::new).collect(),
            attachment,
        })
    }
}

#[async_trait]
impl EmailSender for BrevoEmailClient {
    async fn send(&self, message: EmailMessage) -> Result<String, EmailError> {
        let api_key = self.config.api_key.as_ref().ok_or(EmailError::NotConfigured)?;
        let recipients = message.to.join(", ");
        let payload = self.build_request(message).await?;

        let response = self
            .http_client
            .post(&self.config.url)
            .header("accept", "application/json")
            .header("api-key", api_key)
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status().as_u16();
        if matches!(status, 200 | 201 | 202) {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let id = message_id(&body);
            log::info!("[Brevo] Sent to={} id={}", recipients, id);
            Ok(id)
        } else {
            let body = response.text().await.unwrap_or_default();
            log::error!("[Brevo] Error {}: {}", status, body);
            Err(EmailError::Status(status, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_body() {
        assert_eq!(html_body("Hola\nChau", ""), "<p>Hola<br>Chau</p>");
        assert_eq!(
            html_body("x", "3786-617492"),
            "<p>x</p><p><strong>Teléfono:</strong> 3786-617492</p>"
        );
    }

    #[test]
    fn test_message_id_variants() {
        assert_eq!(message_id(&json!({"messageId": "<a@b>"})), "<a@b>");
        assert_eq!(message_id(&json!({"messageIds": ["<c@d>", "<e@f>"]})), "<c@d>");
        assert_eq!(message_id(&json!({})), "");
    }

    #[test]
    fn test_request_serialization_uses_brevo_names() {
        let req = SendEmailRequest {
            sender: Address {
                email: "from@x".into(),
                name: Some("X".into()),
            },
            to: vec![Address::new("to@x")],
            subject: "s".into(),
            text_content: "t".into(),
            html_content: "<p>t</p>".into(),
            reply_to: None,
            cc: vec![],
            attachment: vec![],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["textContent"], "t");
        assert_eq!(value["htmlContent"], "<p>t</p>");
        assert_eq!(value["to"][0]["email"], "to@x");
        assert!(value.get("cc").is_none());
        assert!(value.get("replyTo").is_none());
    }
}
