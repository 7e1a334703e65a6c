//! Runtime configuration loaded from the environment (and `.env`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TEMPLATE: &str = "./Contrato_Plantilla.docx";
const DEFAULT_OUTPUT_DIR: &str = "./static";
const DEFAULT_BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";
const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com";
const DEFAULT_SIGNATURE_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Business identity shown in emails and pages.
#[derive(Debug, Clone)]
pub struct CompanyConfig {
    pub name: String,
    pub representative: String,
    pub email: String,
    pub phone: String,
    pub signature_path: PathBuf,
    /// Drawn into the company signature when the image does not exist yet.
    pub signature_text: String,
    pub signature_font: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_key: Option<String>,
    pub url: String,
    pub from_email: String,
    pub from_name: String,
    pub cc: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub credentials_path: PathBuf,
    pub folder_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub company: CompanyConfig,
    pub brevo: BrevoConfig,
    /// `None` disables the remote copy.
    pub drive: Option<DriveConfig>,
    pub session_secret: Option<String>,
    pub soffice_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = var_or("PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::Invalid("PORT", e.to_string()))?;

        let soffice_timeout = var_or("SOFFICE_TIMEOUT_SECS", "180")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid("SOFFICE_TIMEOUT_SECS", e.to_string()))?;

        let output_dir = PathBuf::from(var_or("OUTPUT_DIR", DEFAULT_OUTPUT_DIR));
        let signature_path = non_empty_var("COMPANY_SIGNATURE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.join("firma_empresa.png"));

        let phone = var_or("CONTACTO_TELEFONO", "");

        let company = CompanyConfig {
            name: var_or("COMPANY_NAME", "Seguridad Ituzaingó"),
            representative: var_or("COMPANY_REPRESENTATIVE", "Alan Arndt, Dueño de la Empresa"),
            email: var_or("EMAIL_EMPRESA", ""),
            phone: phone.clone(),
            signature_path,
            signature_text: var_or("COMPANY_SIGNATURE_TEXT", "Alan Arndt"),
            signature_font: PathBuf::from(var_or("COMPANY_SIGNATURE_FONT", DEFAULT_SIGNATURE_FONT)),
        };

        let brevo = BrevoConfig {
            api_key: non_empty_var("BREVO_API_KEY"),
            url: var_or("BREVO_URL", DEFAULT_BREVO_URL),
            from_email: var_or("FROM_EMAIL", "contratos@seguridadituzaingo.com"),
            from_name: var_or("FROM_NAME", "Seguridad Ituzaingó"),
            cc: non_empty_var("CC_EMPRESA"),
            phone,
        };

        let drive = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS").map(|path| DriveConfig {
            credentials_path: PathBuf::from(path),
            folder_id: non_empty_var("GOOGLE_DRIVE_FOLDER_ID"),
            api_url: var_or("GOOGLE_DRIVE_API_URL", DEFAULT_DRIVE_API_URL),
        });
        if drive.is_none() {
            log::warn!("GOOGLE_APPLICATION_CREDENTIALS not set, remote upload disabled");
        }

        let cors_allowed_origins = var_or("CORS_ALLOWED_ORIGINS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port,
            template_path: PathBuf::from(var_or("TEMPLATE_PATH", DEFAULT_TEMPLATE)),
            output_dir,
            company,
            brevo,
            drive,
            session_secret: non_empty_var("SESSION_SECRET").or_else(|| non_empty_var("FLASK_SECRET")),
            soffice_timeout,
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        env::remove_var("PORT");
        env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");
        env::remove_var("OUTPUT_DIR");
        env::remove_var("COMPANY_SIGNATURE_PATH");
        env::remove_var("COMPANY_SIGNATURE_TEXT");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.drive.is_none());
        assert_eq!(config.output_dir, PathBuf::from("./static"));
        assert_eq!(
            config.company.signature_path,
            PathBuf::from("./static").join("firma_empresa.png")
        );
        assert_eq!(config.soffice_timeout, Duration::from_secs(180));
        assert_eq!(config.company.signature_text, "Alan Arndt");
    }
}
