#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use contract_signing_server::config::CompanyConfig;
use contract_signing_server::contract::{ContractPipeline, PdfConverter};
use contract_signing_server::email::{EmailError, EmailMessage, EmailSender};
use contract_signing_server::storage::{ObjectStorage, StorageError};
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FONT_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

/// Records uploads in memory.
#[derive(Default)]
pub struct MockObjectStorage {
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    pub fail: bool,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        remote_name: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Status(503, "unavailable".to_string()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((remote_name.to_string(), mime_type.to_string(), data.len()));
        Ok(format!("file-{}", uploads.len()))
    }
}

/// Records sent messages in memory.
#[derive(Default)]
pub struct MockEmailSender {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<String, EmailError> {
        if self.fail {
            return Err(EmailError::NotConfigured);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("<msg-{}@test>", sent.len()))
    }
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn pack(docx: Docx) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    docx.build().pack(&mut cursor).unwrap();
    cursor.into_inner()
}

/// Contract template with every token, one of them split across runs,
/// and a signature table ready to be reused.
pub fn template_bytes() -> Vec<u8> {
    let signature_table = Table::new(vec![
        TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new()),
            TableCell::new().add_paragraph(Paragraph::new()),
        ]),
        TableRow::new(vec![
            TableCell::new().add_paragraph(text_paragraph("Firma del Cliente")),
            TableCell::new().add_paragraph(text_paragraph("Firma de la Empresa")),
        ]),
    ]);

    let docx = Docx::new()
        .add_paragraph(text_paragraph("CONTRATO DE SERVICIO DE MONITOREO"))
        .add_paragraph(text_paragraph("Cliente: {{ nombre }}, DNI {{ dni }}"))
        .add_paragraph(text_paragraph("Email: {{ email }}"))
        .add_paragraph(text_paragraph("Domicilio: {{ ubicacion }}"))
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Lugar monitoreado: {{ ubicacion_"))
                .add_run(Run::new().add_text("monitoreo }}")),
        )
        .add_paragraph(text_paragraph("Fecha: {{ fecha_hoy }}"))
        .add_table(signature_table);
    pack(docx)
}

/// Tokens inside a table cell and inside a table nested in a cell.
pub fn table_template_bytes() -> Vec<u8> {
    let nested = Table::new(vec![TableRow::new(vec![
        TableCell::new().add_paragraph(text_paragraph("DNI {{ dni }}"))
    ])]);
    let table = Table::new(vec![TableRow::new(vec![
        TableCell::new().add_paragraph(text_paragraph("Titular: {{ nombre }}")),
        TableCell::new()
            .add_paragraph(text_paragraph("Datos"))
            .add_table(nested),
    ])]);
    pack(Docx::new().add_table(table))
}

/// Signature table with a third row and its own column grid.
pub fn three_row_signature_template_bytes() -> Vec<u8> {
    let table = Table::new(vec![
        TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new()),
            TableCell::new().add_paragraph(Paragraph::new()),
        ]),
        TableRow::new(vec![
            TableCell::new().add_paragraph(text_paragraph("Firma del Cliente")),
            TableCell::new().add_paragraph(text_paragraph("Firma de la Empresa")),
        ]),
        TableRow::new(vec![
            TableCell::new().add_paragraph(text_paragraph("Aclaración")),
            TableCell::new().add_paragraph(text_paragraph("Aclaración")),
        ]),
    ])
    .set_grid(vec![1000, 1000]);
    pack(Docx::new().add_table(table))
}

/// Template without a signature table.
pub fn plain_template_bytes() -> Vec<u8> {
    pack(Docx::new().add_paragraph(text_paragraph("Cliente: {{ nombre }}")))
}

pub fn write_template(dir: &Path) -> PathBuf {
    let path = dir.join("Contrato_Plantilla.docx");
    std::fs::write(&path, template_bytes()).unwrap();
    path
}

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 10, 10, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .unwrap();
    png
}

pub fn signature_data_url() -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(sample_png(60, 20)))
}

pub fn complete_fields() -> HashMap<String, String> {
    [
        ("nombre", "Juan Pérez"),
        ("dni", "30111222"),
        ("email", "juan@example.com"),
        ("ubicacion", "Av. Rivadavia 1234"),
        ("ubicacion_monitoreo", "Local Calle 5"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain(std::iter::once((
        "firmaBase64".to_string(),
        signature_data_url(),
    )))
    .collect()
}

pub fn test_company(dir: &Path) -> CompanyConfig {
    CompanyConfig {
        name: "Seguridad Ituzaingó".to_string(),
        representative: "Alan Arndt, Dueño de la Empresa".to_string(),
        email: "empresa@example.com".to_string(),
        phone: "3786-617492".to_string(),
        signature_path: dir.join("firma_empresa.png"),
        signature_text: "Alan Arndt".to_string(),
        signature_font: PathBuf::from(FONT_FIXTURE),
    }
}

/// Converter that can never succeed, so the pipeline falls back to DOCX.
pub fn missing_converter() -> PdfConverter {
    PdfConverter::new(Duration::from_secs(5))
        .with_binaries(vec!["definitely-not-soffice".to_string()])
}

pub fn test_pipeline(
    dir: &Path,
    storage: Option<Arc<dyn ObjectStorage>>,
    mailer: Arc<dyn EmailSender>,
) -> ContractPipeline {
    ContractPipeline::new(
        write_template(dir),
        dir.join("static"),
        test_company(dir),
        missing_converter(),
        storage,
        mailer,
    )
}
