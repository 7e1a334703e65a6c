use contract_signing_server::config::BrevoConfig;
use contract_signing_server::email::{BrevoEmailClient, EmailError, EmailMessage, EmailSender};
use httpmock::prelude::*;
use serde_json::json;

fn config(url: String, api_key: Option<&str>) -> BrevoConfig {
    BrevoConfig {
        api_key: api_key.map(str::to_string),
        url,
        from_email: "contratos@example.com".to_string(),
        from_name: "Seguridad Ituzaingó".to_string(),
        cc: Some("copias@example.com".to_string()),
        phone: "3786-617492".to_string(),
    }
}

#[tokio::test]
async fn test_send_with_attachment() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/smtp/email")
                .header("api-key", "test-key")
                .header("accept", "application/json")
                .json_body_partial(
                    json!({
                        "sender": {"email": "contratos@example.com", "name": "Seguridad Ituzaingó"},
                        "to": [{"email": "juan@example.com"}],
                        "subject": "Contrato firmado",
                        "textContent": "Hola\nJuan",
                        "htmlContent": "<p>Hola<br>Juan</p><p><strong>Teléfono:</strong> 3786-617492</p>",
                        "cc": [{"email": "copias@example.com"}],
                        "attachment": [{"content": "UEsDBA==", "name": "contrato.pdf"}]
                    })
                    .to_string(),
                );
            then.status(201).json_body(json!({"messageId": "<abc@brevo>"}));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let attachment = dir.path().join("contrato.pdf");
    std::fs::write(&attachment, b"PK\x03\x04").unwrap();

    let client = BrevoEmailClient::new(
        config(server.url("/v3/smtp/email"), Some("test-key")),
        reqwest::Client::new(),
    );
    let id = client
        .send(
            EmailMessage::new("juan@example.com", "Contrato firmado", "Hola\nJuan")
                .with_attachment(&attachment),
        )
        .await
        .unwrap();

    assert_eq!(id, "<abc@brevo>");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/smtp/email");
            then.status(400).body(r#"{"code":"invalid_parameter"}"#);
        })
        .await;

    let client = BrevoEmailClient::new(
        config(server.url("/v3/smtp/email"), Some("k")),
        reqwest::Client::new(),
    );
    let err = client
        .send(EmailMessage::new("a@b.com", "s", "t"))
        .await
        .unwrap_err();

    match err {
        EmailError::Status(code, body) => {
            assert_eq!(code, 400);
            assert!(body.contains("invalid_parameter"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_missing_api_key_sends_nothing() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(201);
        })
        .await;

    let client = BrevoEmailClient::new(config(server.url("/v3/smtp/email"), None), reqwest::Client::new());
    let err = client
        .send(EmailMessage::new("a@b.com", "s", "t"))
        .await
        .unwrap_err();

    assert!(matches!(err, EmailError::NotConfigured));
    assert_eq!(err.to_string(), "BREVO_API_KEY no configurada");
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_missing_attachment_fails_before_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(201);
        })
        .await;

    let client = BrevoEmailClient::new(
        config(server.url("/v3/smtp/email"), Some("k")),
        reqwest::Client::new(),
    );
    let err = client
        .send(EmailMessage::new("a@b.com", "s", "t").with_attachment("/nonexistent/contrato.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, EmailError::Attachment(_, _)));
    assert_eq!(mock.hits_async().await, 0);
}
