use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use super::traits::Validator;
use super::validation::{validate_required, ValidationError, ValidationErrors};
use super::OutputFormat;

/// Drawn signature as it arrived from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureInput {
    /// Base64 text, optionally a `data:image/png;base64,` URL.
    Base64(String),
    /// Raw image bytes from a multipart file part.
    Image(Vec<u8>),
}

impl SignatureInput {
    fn is_empty(&self) -> bool {
        match self {
            Self::Base64(s) => s.trim().is_empty(),
            Self::Image(b) => b.is_empty(),
        }
    }
}

/// Client data collected by the contract form.
#[derive(Debug, Clone, Default)]
pub struct ContractForm {
    /// `nombre`
    pub name: String,
    /// `dni`
    pub dni: String,
    /// `email`, with `correo` and `mail` accepted as fallbacks
    pub email: String,
    /// `ubicacion`: subscriber's home address
    pub address: String,
    /// `ubicacion_monitoreo`: place being monitored
    pub monitored_location: String,
    /// `firmaBase64` or `firma`
    pub signature: Option<SignatureInput>,
}

fn first_non_empty(fields: &HashMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

impl ContractForm {
    /// Build the form from posted fields, trimming values and resolving aliases.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let signature = first_non_empty(fields, &["firmaBase64", "firma"]);
        Self {
            name: first_non_empty(fields, &["nombre"]),
            dni: first_non_empty(fields, &["dni"]),
            email: first_non_empty(fields, &["email", "correo", "mail"]),
            address: first_non_empty(fields, &["ubicacion"]),
            monitored_location: first_non_empty(fields, &["ubicacion_monitoreo"]),
            signature: if signature.is_empty() {
                None
            } else {
                Some(SignatureInput::Base64(signature))
            },
        }
    }

    /// Literal token -> value pairs applied to the template.
    pub fn placeholder_mapping(&self, date: &str) -> Vec<(String, String)> {
        vec![
            ("{{ nombre }}".to_string(), self.name.clone()),
            ("{{ dni }}".to_string(), self.dni.clone()),
            ("{{ email }}".to_string(), self.email.clone()),
            ("{{ ubicacion }}".to_string(), self.address.clone()),
            (
                "{{ ubicacion_monitoreo }}".to_string(),
                self.monitored_location.clone(),
            ),
            ("{{ fecha_hoy }}".to_string(), date.to_string()),
        ]
    }
}

impl Validator for ContractForm {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        validate_required(&self.name, "nombre", "Nombre", &mut errors);
        validate_required(&self.dni, "dni", "DNI", &mut errors);
        validate_required(&self.email, "email", "Email", &mut errors);
        validate_required(&self.address, "ubicacion", "Domicilio", &mut errors);
        validate_required(
            &self.monitored_location,
            "ubicacion_monitoreo",
            "Lugar monitoreado",
            &mut errors,
        );
        if self.signature.as_ref().map_or(true, SignatureInput::is_empty) {
            errors.add(ValidationError::empty_field("firma", "Firma"));
        }

        errors.into_result()
    }
}

/// Multipart body accepted by `POST /api/contracts` (documentation only).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ContractUploadRequest {
    #[schema(example = "Juan Pérez")]
    pub nombre: String,
    #[schema(example = "30111222")]
    pub dni: String,
    #[schema(example = "juan@example.com")]
    pub email: String,
    #[schema(example = "Av. Rivadavia 1234, Ituzaingó")]
    pub ubicacion: String,
    #[schema(example = "Local comercial, Calle 5 N° 80")]
    pub ubicacion_monitoreo: String,
    /// Base64 PNG (data URL accepted)
    #[serde(rename = "firmaBase64")]
    pub firma_base64: Option<String>,
    /// Signature image file, used when `firmaBase64` is absent
    #[schema(value_type = Option<String>, format = Binary)]
    pub firma: Option<Vec<u8>>,
}

/// Outcome of a contract generation through the JSON API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContractResponse {
    #[schema(example = "juan_perez_20250130_153012_a1b2c3.pdf")]
    pub filename: String,
    #[schema(example = "/api/contracts/juan_perez_20250130_153012_a1b2c3.pdf")]
    pub download_url: String,
    #[schema(value_type = String, example = "pdf")]
    pub format: String,
    pub remote_file_id: Option<String>,
    pub emails_sent: usize,
}

impl ContractResponse {
    pub fn new(
        filename: String,
        format: OutputFormat,
        remote_file_id: Option<String>,
        emails_sent: usize,
    ) -> Self {
        Self {
            download_url: format!("/api/contracts/{}", filename),
            filename,
            format: match format {
                OutputFormat::Pdf => "pdf".to_string(),
                OutputFormat::Docx => "docx".to_string(),
            },
            remote_file_id,
            emails_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_email_aliases() {
        let form = ContractForm::from_fields(&fields(&[("email", "  "), ("correo", " a@b.com ")]));
        assert_eq!(form.email, "a@b.com");

        let form = ContractForm::from_fields(&fields(&[("mail", "c@d.com")]));
        assert_eq!(form.email, "c@d.com");
    }

    #[test]
    fn test_signature_alias() {
        let form = ContractForm::from_fields(&fields(&[("firma", "abc")]));
        assert_eq!(form.signature, Some(SignatureInput::Base64("abc".to_string())));

        let form = ContractForm::from_fields(&fields(&[("firmaBase64", ""), ("firma", "")]));
        assert_eq!(form.signature, None);
    }

    #[test]
    fn test_validate_reports_missing_in_fixed_order() {
        let form = ContractForm::from_fields(&fields(&[("dni", "1"), ("ubicacion", "x")]));
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.fields(),
            vec!["nombre", "email", "ubicacion_monitoreo", "firma"]
        );
    }

    #[test]
    fn test_validate_complete_form() {
        let form = ContractForm::from_fields(&fields(&[
            ("nombre", "Ana"),
            ("dni", "1"),
            ("email", "a@b.com"),
            ("ubicacion", "Casa"),
            ("ubicacion_monitoreo", "Local"),
            ("firmaBase64", "data:image/png;base64,AAAA"),
        ]));
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_response_download_url() {
        let resp = ContractResponse::new("a.pdf".to_string(), OutputFormat::Pdf, None, 2);
        assert_eq!(resp.download_url, "/api/contracts/a.pdf");
        assert_eq!(resp.format, "pdf");
    }
}
