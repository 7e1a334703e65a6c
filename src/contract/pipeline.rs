//! The per-request contract sequence.
//!
//! validate -> decode signature -> fill template -> save DOCX -> convert to PDF
//! -> remote copy -> emails. Steps after the DOCX is saved never fail the
//! request: a failed conversion falls back to the DOCX, upload and email
//! failures are logged.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::common::{output_base_name, remote_filename, today};
use super::engine::PdfConverter;
use super::models::ContractForm;
use super::signature::{decode_signature, ensure_company_signature, load_company_signature};
use super::template::TemplateFiller;
use super::traits::Validator;
use super::{ContractError, GeneratedContract, OutputFormat};
use crate::config::CompanyConfig;
use crate::email::{EmailMessage, EmailSender};
use crate::storage::{mime_for_path, ObjectStorage};

pub struct ContractPipeline {
    template_path: PathBuf,
    output_dir: PathBuf,
    company: CompanyConfig,
    converter: PdfConverter,
    storage: Option<Arc<dyn ObjectStorage>>,
    mailer: Arc<dyn EmailSender>,
}

impl ContractPipeline {
    pub fn new(
        template_path: PathBuf,
        output_dir: PathBuf,
        company: CompanyConfig,
        converter: PdfConverter,
        storage: Option<Arc<dyn ObjectStorage>>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            template_path,
            output_dir,
            company,
            converter,
            storage,
            mailer,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn company(&self) -> &CompanyConfig {
        &self.company
    }

    pub async fn run(&self, form: &ContractForm) -> Result<GeneratedContract, ContractError> {
        form.validate().map_err(ContractError::Validation)?;
        log::debug!(
            "Generating contract: ubicacion='{}' ubicacion_monitoreo='{}'",
            form.address,
            form.monitored_location
        );

        let signature = match &form.signature {
            Some(input) => decode_signature(input)?,
            None => return Err(ContractError::InvalidSignature("missing".to_string())),
        };

        let mut filler = TemplateFiller::open(&self.template_path).await?;
        let changed = filler.replace_placeholders(&form.placeholder_mapping(&today()));
        log::debug!("Template placeholders replaced in {} paragraphs", changed);

        ensure_company_signature(&self.company).await;
        let company_signature = load_company_signature(&self.company.signature_path).await;
        filler.add_signatures(Some(&signature), company_signature.as_ref());

        let slug = output_base_name(&form.name);
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ContractError::Save(e.to_string()))?;
        let docx_path = self.output_dir.join(format!("{}.docx", slug));
        let pdf_path = self.output_dir.join(format!("{}.pdf", slug));

        let bytes = filler.to_bytes()?;
        tokio::fs::write(&docx_path, bytes)
            .await
            .map_err(|e| ContractError::Save(e.to_string()))?;
        log::info!("Contract saved to {}", docx_path.display());

        let (path, format) = match self.converter.convert(&docx_path, &pdf_path).await {
            Ok(()) => (pdf_path, OutputFormat::Pdf),
            Err(e) => {
                log::warn!("PDF conversion failed, delivering DOCX instead: {}", e);
                (docx_path, OutputFormat::Docx)
            }
        };

        let remote_file_id = self.upload(form, &path, format).await;
        let emails_sent = self.notify(form, &path).await;

        Ok(GeneratedContract {
            slug,
            path,
            format,
            remote_file_id,
            emails_sent,
        })
    }

    async fn upload(&self, form: &ContractForm, path: &Path, format: OutputFormat) -> Option<String> {
        let storage = self.storage.as_ref()?;
        let remote_name = remote_filename(
            &form.name,
            &form.dni,
            format.extension(),
            Local::now().date_naive(),
        );
        match storage
            .upload_file(path, &remote_name, &mime_for_path(path))
            .await
        {
            Ok(id) => {
                log::info!("[Drive] Uploaded {} fileId={}", remote_name, id);
                Some(id)
            }
            Err(e) => {
                log::error!("[Drive] Upload of {} failed: {}", remote_name, e);
                None
            }
        }
    }

    /// Client copy plus business copy. Returns how many were accepted.
    async fn notify(&self, form: &ContractForm, attachment: &Path) -> usize {
        let mut messages = Vec::new();
        let body = client_email_body(form, &self.company);

        if !form.email.is_empty() {
            messages.push(
                EmailMessage::new(
                    form.email.clone(),
                    format!("Contrato firmado - {}", self.company.name),
                    body.clone(),
                )
                .with_attachment(attachment),
            );
        }
        if !self.company.email.is_empty() {
            messages.push(
                EmailMessage::new(
                    self.company.email.clone(),
                    format!("Nuevo contrato firmado - {}", self.company.name),
                    format!("El/La cliente {} firmó un contrato.\n\n{}", form.name, body),
                )
                .with_attachment(attachment),
            );
        }

        let mut sent = 0;
        for message in messages {
            let to = message.to.join(", ");
            match self.mailer.send(message).await {
                Ok(_) => sent += 1,
                Err(e) => log::warn!("Email to {} not sent: {}", to, e),
            }
        }
        sent
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

pub fn client_email_body(form: &ContractForm, company: &CompanyConfig) -> String {
    format!(
        "Estimado/a {name},\n\n\
         Adjuntamos el contrato firmado correspondiente al servicio de monitoreo en {location}.\n\
         Domicilio del abonado: {address}.\n\
         Le recomendamos conservar el archivo para su referencia.\n\n\
         Quedamos a disposición por cualquier consulta.\n\n\
         Atentamente,\n\
         {company}\n\
         {representative}\n\
         Tel.: {phone}\n\
         Email: {email}\n",
        name = form.name,
        location = form.monitored_location,
        address = form.address,
        company = company.name,
        representative = company.representative,
        phone = or_dash(&company.phone),
        email = or_dash(&company.email),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_email_body() {
        let form = ContractForm {
            name: "Ana".into(),
            address: "Casa 1".into(),
            monitored_location: "Local 2".into(),
            ..Default::default()
        };
        let company = CompanyConfig {
            name: "Seguridad".into(),
            representative: "Dueño".into(),
            email: String::new(),
            phone: "123".into(),
            signature_path: PathBuf::new(),
            signature_text: String::new(),
            signature_font: PathBuf::new(),
        };
        let body = client_email_body(&form, &company);
        assert!(body.starts_with("Estimado/a Ana,\n\n"));
        assert!(body.contains("servicio de monitoreo en Local 2.\nDomicilio del abonado: Casa 1.\n"));
        assert!(body.contains("Tel.: 123\nEmail: -\n"));
    }
}
