//! Signature image normalization.
//!
//! Whatever the browser sent (data URL, bare base64 or an uploaded file) ends
//! up as an RGBA PNG with known pixel dimensions.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GenericImageView, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::io::Cursor;
use std::path::Path;

use super::models::SignatureInput;
use super::ContractError;
use crate::config::CompanyConfig;

const COMPANY_SIGNATURE_WIDTH: u32 = 600;
const COMPANY_SIGNATURE_HEIGHT: u32 = 220;
const COMPANY_SIGNATURE_SCALE: f32 = 72.0;

/// PNG-encoded signature ready to be embedded in the document.
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Drop a `data:<mime>;base64,` prefix if present.
fn strip_data_url(data: &str) -> &str {
    match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, ContractError> {
    let payload: String = strip_data_url(data)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ContractError::InvalidSignature(e.to_string()))
}

/// Decode any supported image and re-encode it as an RGBA PNG.
pub fn normalize_image(raw: &[u8]) -> Result<SignatureImage, ContractError> {
    let img = image::load_from_memory(raw)
        .map_err(|e| ContractError::InvalidSignature(e.to_string()))?;
    let (width, height) = img.dimensions();
    let rgba = image::DynamicImage::ImageRgba8(img.to_rgba8());

    let mut png = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| ContractError::InvalidSignature(e.to_string()))?;

    Ok(SignatureImage { png, width, height })
}

pub fn decode_signature(input: &SignatureInput) -> Result<SignatureImage, ContractError> {
    match input {
        SignatureInput::Base64(data) => normalize_image(&decode_base64(data)?),
        SignatureInput::Image(bytes) => normalize_image(bytes),
    }
}

/// Load the company signature. A missing, empty or unreadable file yields
/// `None` and the company cell stays blank.
pub async fn load_company_signature(path: &Path) -> Option<SignatureImage> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) if !b.is_empty() => b,
        Ok(_) => {
            log::warn!("Company signature {} is empty", path.display());
            return None;
        }
        Err(e) => {
            log::warn!("Company signature {} not available: {}", path.display(), e);
            return None;
        }
    };

    match normalize_image(&bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("Company signature {} could not be decoded: {}", path.display(), e);
            None
        }
    }
}

/// Draw `text` centered on a transparent 600x220 canvas and encode it as PNG.
pub fn render_text_signature(text: &str, font_data: Vec<u8>) -> Result<Vec<u8>, ContractError> {
    let font = Font::try_from_vec(font_data)
        .ok_or_else(|| ContractError::CompanySignature("invalid font data".to_string()))?;
    let scale = Scale::uniform(COMPANY_SIGNATURE_SCALE);

    let mut canvas = RgbaImage::from_pixel(
        COMPANY_SIGNATURE_WIDTH,
        COMPANY_SIGNATURE_HEIGHT,
        Rgba([255, 255, 255, 0]),
    );
    let (text_width, text_height) = text_size(scale, &font, text);
    let x = (COMPANY_SIGNATURE_WIDTH as i32 - text_width) / 2;
    let y = (COMPANY_SIGNATURE_HEIGHT as i32 - text_height) / 2;
    draw_text_mut(&mut canvas, Rgba([0, 0, 0, 255]), x, y, scale, &font, text);

    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| ContractError::CompanySignature(e.to_string()))?;
    Ok(png)
}

/// Create the company signature image from its configured text when the
/// file does not exist yet. Failures are logged and leave the cell blank.
pub async fn ensure_company_signature(company: &CompanyConfig) {
    let path = &company.signature_path;
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return;
    }

    let font_data = match tokio::fs::read(&company.signature_font).await {
        Ok(data) => data,
        Err(e) => {
            log::warn!(
                "Signature font {} not available: {}",
                company.signature_font.display(),
                e
            );
            return;
        }
    };

    let png = match render_text_signature(&company.signature_text, font_data) {
        Ok(png) => png,
        Err(e) => {
            log::warn!("{}", e);
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            log::warn!("Cannot create {}: {}", parent.display(), e);
            return;
        }
    }
    match tokio::fs::write(path, png).await {
        Ok(()) => log::info!("Company signature generated at {}", path.display()),
        Err(e) => log::warn!("Cannot write company signature {}: {}", path.display(), e),
    }
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .unwrap();
    png
}
