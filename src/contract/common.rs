//! Common utilities for contract generation.
//!
//! Shared helpers for file naming, date formatting and HTML escaping.

use chrono::{Local, NaiveDate};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Timestamp tag used in output filenames, e.g. `20250130_153012`.
pub fn now_tag() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Today's date as printed in the contract body (`30/01/2025`).
pub fn today() -> String {
    Local::now().format("%d/%m/%Y").to_string()
}

/// First six hex characters of a fresh v4 UUID.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// ASCII slug of a client name. Accents are folded (`Peña` -> `pena`),
/// every other non-alphanumeric run becomes a single `_`.
pub fn slug(name: &str) -> String {
    let ascii: String = name.nfkd().filter(|c| c.is_ascii()).collect();

    let mut result = String::new();
    let mut last_sep = false;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_sep = false;
        } else if !last_sep {
            result.push('_');
            last_sep = true;
        }
    }

    let trimmed = result.trim_matches('_');
    if trimmed.is_empty() {
        format!("cliente_{}", short_id())
    } else {
        trimmed.to_string()
    }
}

/// Base name for every file produced by one request.
pub fn output_base_name(name: &str) -> String {
    format!("{}_{}_{}", slug(name), now_tag(), short_id())
}

/// Name given to the remote copy: `2025-01-30_Juan_Perez_30111222_Contrato.pdf`.
pub fn remote_filename(name: &str, dni: &str, ext: &str, date: NaiveDate) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let safe = safe.trim().replace(' ', "_");
    format!("{}_{}_{}_Contrato{}", date.format("%Y-%m-%d"), safe, dni, ext)
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
