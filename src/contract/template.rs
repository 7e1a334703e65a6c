//! DOCX template filling.
//!
//! The template is a regular Word document containing literal tokens such as
//! `{{ nombre }}`. Substitution works on whole paragraphs because Word often
//! splits a token across several runs.

use docx_rs::{
    read_docx, AlignmentType, Break, BreakType, DocumentChild, Docx, Paragraph, ParagraphChild,
    Pic, Run, RunChild, Tab, Table, TableCell, TableCellContent, TableChild, TableLayoutType,
    TableRow, TableRowChild, Text, VAlignType, WidthType,
};
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;

use super::common::escape_html;
use super::signature::SignatureImage;
use super::ContractError;

pub const CLIENT_LABEL: &str = "Firma del Cliente";
pub const COMPANY_LABEL: &str = "Firma de la Empresa";
pub const MONITORED_LOCATION_TOKEN: &str = "{{ ubicacion_monitoreo }}";

/// 3.2in per signature column, in twentieths of a point.
const COLUMN_WIDTH_DXA: usize = 4608;
/// 2.8in signature width, in EMU.
const SIGNATURE_WIDTH_EMU: u32 = 2_560_320;
/// 12pt, in half-points.
const LABEL_FONT_SIZE: usize = 24;

const MISSING_TEMPLATE_HTML: &str =
    "<p><strong>No se encontró la plantilla del contrato.</strong></p>";

lazy_static! {
    /// `{{ ubicacion_monitoreo }}` as it comes out of Word after the author
    /// retyped it: stray spaces between letters, `_` dropped or turned into a space.
    static ref MONITORED_LOCATION_RE: Regex = Regex::new(
        r"(?i)\{\{\s*u\s*b\s*i\s*c\s*a\s*c\s*i\s*o\s*n\s*(?:_| |\t)?\s*m\s*o\s*n\s*i\s*t\s*o\s*r\s*e\s*o\s*\}\}"
    )
    .unwrap();
}

/// NBSP -> space, zero-width space removed.
fn normalize(text: &str) -> String {
    text.replace('\u{a0}', " ").replace('\u{200b}', "")
}

/// Apply the literal mapping, then the tolerant monitored-location pattern.
pub fn replace_text(text: &str, mapping: &[(String, String)]) -> String {
    let mut result = normalize(text);
    for (token, value) in mapping {
        if result.contains(token.as_str()) {
            result = result.replace(token.as_str(), value);
        }
    }

    let location = mapping
        .iter()
        .find(|(token, _)| token == MONITORED_LOCATION_TOKEN)
        .map(|(_, value)| value.as_str())
        .unwrap_or("");
    if !location.is_empty() {
        result = MONITORED_LOCATION_RE
            .replace_all(&result, NoExpand(location))
            .into_owned();
    }
    result
}

/// Text of a paragraph, with tabs as `\t` and breaks as `\n`.
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    RunChild::Break(_) => text.push('\n'),
                    _ => {}
                }
            }
        }
    }
    text
}

/// Split `text` into run content. Existing tab and break elements are reused
/// in order so their kind (page break, tab leader) survives.
fn text_children(
    text: &str,
    tabs: &mut VecDeque<RunChild>,
    breaks: &mut VecDeque<RunChild>,
) -> Vec<RunChild> {
    let mut children = Vec::new();
    let mut segment = String::new();
    for ch in text.chars() {
        if ch != '\t' && ch != '\n' {
            segment.push(ch);
            continue;
        }
        if !segment.is_empty() {
            children.push(RunChild::Text(Text::new(std::mem::take(&mut segment))));
        }
        children.push(if ch == '\t' {
            tabs.pop_front()
                .unwrap_or_else(|| RunChild::Tab(Tab::new()))
        } else {
            breaks
                .pop_front()
                .unwrap_or_else(|| RunChild::Break(Break::new(BreakType::TextWrapping)))
        });
    }
    if !segment.is_empty() {
        children.push(RunChild::Text(Text::new(segment)));
    }
    children
}

/// Put `new_text` where the first text element was and drop text, tabs and
/// breaks from every run. Run properties and other content (drawings) stay.
fn set_paragraph_text(paragraph: &mut Paragraph, new_text: &str) {
    let mut tabs = VecDeque::new();
    let mut breaks = VecDeque::new();
    // (paragraph child, position inside the run)
    let mut target: Option<(usize, usize)> = None;

    for (index, child) in paragraph.children.iter_mut().enumerate() {
        if let ParagraphChild::Run(run) = child {
            let mut kept = Vec::with_capacity(run.children.len());
            for run_child in std::mem::take(&mut run.children) {
                match run_child {
                    RunChild::Text(_) => {
                        target.get_or_insert((index, kept.len()));
                    }
                    RunChild::Tab(_) => {
                        target.get_or_insert((index, kept.len()));
                        tabs.push_back(run_child);
                    }
                    RunChild::Break(_) => {
                        target.get_or_insert((index, kept.len()));
                        breaks.push_back(run_child);
                    }
                    other => kept.push(other),
                }
            }
            run.children = kept;
        }
    }

    let content = text_children(new_text, &mut tabs, &mut breaks);
    match target {
        Some((index, position)) => {
            if let ParagraphChild::Run(run) = &mut paragraph.children[index] {
                run.children.splice(position..position, content);
            }
        }
        None => {
            let mut run = Run::new();
            run.children = content;
            paragraph.children.push(ParagraphChild::Run(Box::new(run)));
        }
    }
}

fn substitute_paragraph(paragraph: &mut Paragraph, mapping: &[(String, String)]) -> bool {
    let original = paragraph_text(paragraph);
    let replaced = replace_text(&original, mapping);
    if replaced != original {
        set_paragraph_text(paragraph, &replaced);
        true
    } else {
        false
    }
}

#[allow(irrefutable_let_patterns)]
fn visit_table_paragraphs(table: &mut Table, f: &mut dyn FnMut(&mut Paragraph)) {
    for row in table.rows.iter_mut() {
        if let TableChild::TableRow(row) = row {
            for cell in row.cells.iter_mut() {
                if let TableRowChild::TableCell(cell) = cell {
                    for content in cell.children.iter_mut() {
                        match content {
                            TableCellContent::Paragraph(p) => f(p),
                            TableCellContent::Table(t) => visit_table_paragraphs(t, f),
                            _ => {}
                        }
                    }
                }
            }
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn table_row(table: &Table, index: usize) -> Option<&TableRow> {
    if let TableChild::TableRow(row) = table.rows.get(index)? {
        Some(row)
    } else {
        None
    }
}

#[allow(irrefutable_let_patterns)]
fn cell_text(table: &Table, row: usize, col: usize) -> Option<String> {
    let row = table_row(table, row)?;
    let cell = if let TableRowChild::TableCell(cell) = row.cells.get(col)? {
        cell
    } else {
        return None;
    };
    let text = cell
        .children
        .iter()
        .filter_map(|content| match content {
            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(text)
}

/// A table already laid out for signatures: labels in the second row.
fn is_signature_table(table: &Table) -> bool {
    let has_two_by_two = [0, 1].iter().all(|&r| {
        table_row(table, r)
            .map(|row| row.cells.len() >= 2)
            .unwrap_or(false)
    });
    if !has_two_by_two {
        return false;
    }
    let client = cell_text(table, 1, 0).unwrap_or_default().to_lowercase();
    let company = cell_text(table, 1, 1).unwrap_or_default().to_lowercase();
    client.contains("firma del cliente") && company.contains("firma de la empresa")
}

/// Height keeping the aspect ratio at the fixed signature width.
fn signature_height_emu(width: u32, height: u32) -> u32 {
    u32::try_from(SIGNATURE_WIDTH_EMU as u64 * height as u64 / width.max(1) as u64)
        .unwrap_or(u32::MAX)
}

fn image_cell(signature: Option<&SignatureImage>) -> TableCell {
    let mut paragraph = Paragraph::new().align(AlignmentType::Center);
    if let Some(sig) = signature.filter(|s| !s.png.is_empty() && s.width > 0) {
        let height_emu = signature_height_emu(sig.width, sig.height);
        let pic = Pic::new(&sig.png).size(SIGNATURE_WIDTH_EMU, height_emu);
        paragraph = paragraph.add_run(Run::new().add_image(pic));
    }
    TableCell::new()
        .add_paragraph(paragraph)
        .vertical_align(VAlignType::Center)
        .width(COLUMN_WIDTH_DXA, WidthType::Dxa)
}

fn label_cell(label: &str) -> TableCell {
    let run = Run::new().add_text(label).bold().size(LABEL_FONT_SIZE);
    TableCell::new()
        .add_paragraph(Paragraph::new().align(AlignmentType::Center).add_run(run))
        .vertical_align(VAlignType::Center)
        .width(COLUMN_WIDTH_DXA, WidthType::Dxa)
}

#[allow(irrefutable_let_patterns)]
fn replace_row_cells(row: &mut TableChild, first: TableCell, second: TableCell) {
    if let TableChild::TableRow(row) = row {
        row.cells[0] = TableRowChild::TableCell(first);
        row.cells[1] = TableRowChild::TableCell(second);
    }
}

/// Fixed signature column width on the first two cells of every row.
#[allow(irrefutable_let_patterns)]
fn set_column_widths(table: &mut Table) {
    for row in table.rows.iter_mut() {
        if let TableChild::TableRow(row) = row {
            for cell in row.cells.iter_mut().take(2) {
                if let TableRowChild::TableCell(cell) = cell {
                    let current = std::mem::replace(cell, TableCell::new());
                    *cell = current.width(COLUMN_WIDTH_DXA, WidthType::Dxa);
                }
            }
        }
    }
}

/// An opened contract template being filled for one client.
pub struct TemplateFiller {
    docx: Docx,
}

impl TemplateFiller {
    pub async fn open(path: &Path) -> Result<Self, ContractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ContractError::TemplateOpen(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContractError> {
        let docx = read_docx(bytes).map_err(|e| ContractError::TemplateOpen(e.to_string()))?;
        Ok(Self { docx })
    }

    pub fn document(&self) -> &Docx {
        &self.docx
    }

    /// Substitute tokens in body paragraphs and table cells.
    /// Returns the number of paragraphs that changed.
    pub fn replace_placeholders(&mut self, mapping: &[(String, String)]) -> usize {
        let mut changed = 0;
        let mut apply = |p: &mut Paragraph| {
            if substitute_paragraph(p, mapping) {
                changed += 1;
            }
        };

        for child in self.docx.document.children.iter_mut() {
            match child {
                DocumentChild::Paragraph(p) => apply(&mut **p),
                DocumentChild::Table(t) => visit_table_paragraphs(t, &mut apply),
                _ => {}
            }
        }
        changed
    }

    /// Fill the signature table (client | company). An existing table whose
    /// second row carries both labels is reused, otherwise one is appended.
    pub fn add_signatures(
        &mut self,
        client: Option<&SignatureImage>,
        company: Option<&SignatureImage>,
    ) {
        let existing = self.docx.document.children.iter().position(|child| {
            matches!(child, DocumentChild::Table(t) if is_signature_table(t))
        });

        match existing {
            Some(index) => {
                if let DocumentChild::Table(table) = &mut self.docx.document.children[index] {
                    replace_row_cells(&mut table.rows[0], image_cell(client), image_cell(company));
                    replace_row_cells(
                        &mut table.rows[1],
                        label_cell(CLIENT_LABEL),
                        label_cell(COMPANY_LABEL),
                    );
                    set_column_widths(table);
                    let reused = std::mem::replace(&mut **table, Table::new(vec![]));
                    **table = reused
                        .set_grid(vec![COLUMN_WIDTH_DXA; 2])
                        .layout(TableLayoutType::Fixed);
                }
            }
            None => {
                let table = Table::new(vec![
                    TableRow::new(vec![image_cell(client), image_cell(company)]),
                    TableRow::new(vec![label_cell(CLIENT_LABEL), label_cell(COMPANY_LABEL)]),
                ])
                .set_grid(vec![COLUMN_WIDTH_DXA, COLUMN_WIDTH_DXA])
                .layout(TableLayoutType::Fixed);
                self.docx
                    .document
                    .children
                    .push(DocumentChild::Table(Box::new(table)));
            }
        }
    }

    /// Serialize the filled document.
    pub fn to_bytes(self) -> Result<Vec<u8>, ContractError> {
        let mut cursor = Cursor::new(Vec::new());
        self.docx
            .build()
            .pack(&mut cursor)
            .map_err(|e| ContractError::Save(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Top-level paragraphs of the template as simple HTML, for the form page.
pub async fn preview_html(path: &Path) -> String {
    let filler = match TemplateFiller::open(path).await {
        Ok(f) => f,
        Err(e) => {
            log::warn!("Template preview unavailable: {}", e);
            return MISSING_TEMPLATE_HTML.to_string();
        }
    };

    filler
        .docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => {
                let text = escape_html(&paragraph_text(p));
                let text = text.trim();
                Some(if text.is_empty() {
                    "<p>&nbsp;</p>".to_string()
                } else {
                    format!("<p>{}</p>", text)
                })
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
