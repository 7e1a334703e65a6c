use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use log::debug;
use sanitize_filename::sanitize;
use std::collections::HashMap;

use super::models::{ContractForm, SignatureInput};
use crate::ErrorResponse;

/// Multipart part carrying the signature as an image file.
const SIGNATURE_FILE_FIELD: &str = "firma";

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::FieldError(_) | MultipartParseError::Utf8Error(_) => {
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!("{}", error)))
            }
            MultipartParseError::IoError(_) => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("{}", error))),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Collect a contract submission.
    ///
    /// Text parts become form fields. A `firma` part sent as a file is taken
    /// as the raw signature image, unless `firmaBase64` was also sent.
    pub async fn parse_contract_multipart(
        mut multipart: Multipart,
    ) -> Result<ContractForm, MultipartParseError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut signature_file: Option<Vec<u8>> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let filename = content_disposition.get_filename().map(sanitize);

            let mut buffer = Vec::new();
            while let Some(chunk) = field.next().await {
                let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                buffer.extend_from_slice(&data_chunk);
            }

            if name == SIGNATURE_FILE_FIELD && filename.is_some() {
                debug!(
                    "Signature file '{}' received ({} bytes)",
                    filename.unwrap_or_default(),
                    buffer.len()
                );
                if !buffer.is_empty() {
                    signature_file = Some(buffer);
                }
                continue;
            }

            let value =
                String::from_utf8(buffer).map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;
            fields.insert(name, value);
        }

        let mut form = ContractForm::from_fields(&fields);
        if form.signature.is_none() {
            form.signature = signature_file.map(SignatureInput::Image);
        }
        Ok(form)
    }
}
