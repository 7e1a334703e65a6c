//! Server-rendered pages of the signing form.

use super::common::escape_html;

const FORM_PAGE: &str = include_str!("../../templates/formulario_contrato.html");
const THANK_YOU_PAGE: &str = include_str!("../../templates/agradecimiento.html");

/// Form page with the contract text shown above the fields.
pub fn form_page(contract_html: &str) -> String {
    FORM_PAGE.replace("{{contrato_html}}", contract_html)
}

/// Page shown after a successful submission, linking to `/descargar`.
pub fn thank_you_page(phone: &str) -> String {
    let phone_html = if phone.trim().is_empty() {
        String::new()
    } else {
        format!(
            "  <p>Ante cualquier consulta comuníquese al {}.</p>",
            escape_html(phone.trim())
        )
    };
    THANK_YOU_PAGE.replace("{{telefono_html}}", &phone_html)
}
