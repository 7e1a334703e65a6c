//! Contract module - everything between the submitted form and the signed file.
//!
//! - `models` - form fields and API payloads
//! - `validation` - presence checks with descriptive errors
//! - `signature` - base64 / raw image normalization to PNG
//! - `template` - placeholder substitution and signature table on the DOCX template
//! - `engine` - DOCX to PDF conversion through LibreOffice
//! - `pipeline` - the per-request sequence (fill, convert, upload, notify)
//! - `handlers` - HTTP endpoints

pub mod common;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod multipart_parser;
pub mod pages;
pub mod pipeline;
pub mod signature;
pub mod template;
pub mod traits;
pub mod validation;

pub use engine::PdfConverter;
pub use models::{ContractForm, ContractResponse};
pub use pipeline::ContractPipeline;
pub use template::TemplateFiller;
pub use traits::Validator;

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors that can occur while producing a contract.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("{0}")]
    Validation(validation::ValidationErrors),
    #[error("invalid signature image: {0}")]
    InvalidSignature(String),
    #[error("No se pudo abrir la plantilla del contrato: {0}")]
    TemplateOpen(String),
    #[error("No se pudo guardar el DOCX: {0}")]
    Save(String),
    #[error("cannot render company signature: {0}")]
    CompanySignature(String),
    #[error("PDF conversion failed: {0}")]
    Conversion(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Final file handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
        }
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct GeneratedContract {
    /// Base name shared by every file of this request, without extension.
    pub slug: String,
    pub path: PathBuf,
    pub format: OutputFormat,
    pub remote_file_id: Option<String>,
    pub emails_sent: usize,
}

impl GeneratedContract {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}{}", self.slug, self.format.extension()))
    }
}
