//! LibreOffice conversion engine.
//!
//! Handles invoking `soffice` (or `libreoffice`) in headless mode and moving
//! the produced PDF to its final location.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::tempdir;
use tokio::process::Command;

use super::ContractError;

const CONVERTER_BINARIES: [&str; 2] = ["soffice", "libreoffice"];
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Converts filled DOCX files to PDF through a LibreOffice binary.
#[derive(Debug, Clone)]
pub struct PdfConverter {
    binaries: Vec<String>,
    timeout: Duration,
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PdfConverter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binaries: CONVERTER_BINARIES.iter().map(|b| b.to_string()).collect(),
            timeout,
        }
    }

    /// Use a custom list of binaries, tried in order.
    pub fn with_binaries(mut self, binaries: Vec<String>) -> Self {
        self.binaries = binaries;
        self
    }

    /// Convert `docx_path` to `pdf_path`.
    ///
    /// Each binary gets one attempt. The conversion counts as done only when
    /// the binary exits with success and left a non-empty PDF behind.
    pub async fn convert(&self, docx_path: &Path, pdf_path: &Path) -> Result<(), ContractError> {
        let out_dir = pdf_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let stem = docx_path
            .file_stem()
            .ok_or_else(|| ContractError::Conversion("input has no file name".to_string()))?;
        let generated = out_dir.join(format!("{}.pdf", stem.to_string_lossy()));

        let mut failures = Vec::new();
        for binary in &self.binaries {
            match self.run_binary(binary, docx_path, out_dir).await {
                Ok(()) => {
                    if !is_non_empty_file(&generated).await {
                        failures.push(format!("{}: no PDF produced", binary));
                        continue;
                    }
                    if generated != pdf_path {
                        tokio::fs::rename(&generated, pdf_path).await?;
                    }
                    log::info!("Converted {} to PDF with {}", docx_path.display(), binary);
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("{} failed: {}", binary, e);
                    failures.push(format!("{}: {}", binary, e));
                }
            }
        }

        Err(ContractError::Conversion(failures.join("; ")))
    }

    async fn run_binary(&self, binary: &str, docx_path: &Path, out_dir: &Path) -> Result<(), String> {
        // Private profile so parallel conversions do not fight over the user lock.
        let profile = tempdir().map_err(|e| e.to_string())?;
        let profile_url = format!("-env:UserInstallation=file://{}", profile.path().display());

        let mut command = Command::new(binary);
        command
            .arg(&profile_url)
            .args(["--headless", "--norestore", "--nolockcheck", "--nodefault"])
            .args(["--convert-to", "pdf:writer_pdf_Export", "--outdir"])
            .arg(out_dir)
            .arg(docx_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if std::env::var_os("HOME").is_none() {
            command.env("HOME", "/tmp");
        }
        if std::env::var_os("LANG").is_none() {
            command.env("LANG", "en_US.UTF-8");
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| format!("timed out after {}s", self.timeout.as_secs()))?
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            Ok(())
        } else {
            let code = output.status.code().unwrap_or(-1);
            Err(format!(
                "exited with status {}: {}",
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binaries_fail_with_every_reason() {
        let dir = tempfile::tempdir().unwrap();
        let docx = dir.path().join("a.docx");
        std::fs::write(&docx, b"not really a docx").unwrap();

        let converter = PdfConverter::new(Duration::from_secs(5)).with_binaries(vec![
            "definitely-not-soffice".to_string(),
            "definitely-not-libreoffice".to_string(),
        ]);
        let err = converter
            .convert(&docx, &dir.path().join("a.pdf"))
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("definitely-not-soffice"));
        assert!(msg.contains("definitely-not-libreoffice"));
        assert!(!dir.path().join("a.pdf").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let docx = dir.path().join("b.docx");
        std::fs::write(&docx, b"x").unwrap();

        let converter =
            PdfConverter::new(Duration::from_secs(5)).with_binaries(vec!["true".to_string()]);
        let err = converter
            .convert(&docx, &dir.path().join("b.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no PDF produced"));
    }
}
