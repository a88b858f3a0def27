//! Text from web pages and Office Open XML documents.
//!
//! | Format | Crate       | Output                                          |
//! |--------|-------------|-------------------------------------------------|
//! | HTML   | `html2text` | visible text, entities decoded                  |
//! | DOCX   | `docx-rs`   | one line per non-empty paragraph                |
//! | XLSX   | `calamine`  | `## <sheet>` then a Markdown table per sheet    |
//!
//! All three are pure functions over bytes; the converter runs the Office
//! ones on the blocking pool.

use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;

/// Line width handed to `html2text`. Wide enough that paragraphs stay whole.
const HTML_WRAP_WIDTH: usize = 10_000;

/// Visible text of an HTML page.
pub fn html_to_text(html: &str) -> Result<String, html2text::Error> {
    let text = html2text::from_read(Cursor::new(html.as_bytes()), HTML_WRAP_WIDTH)?;
    Ok(text.trim().to_string())
}

/// Paragraph text of a DOCX document.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, docx_rs::ReaderError> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes)?;
    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|p| !p.trim().is_empty())
        .collect();
    Ok(paragraphs.join("\n"))
}

/// Every non-empty worksheet of an XLSX workbook as Markdown.
pub fn xlsx_to_text(bytes: &[u8]) -> Result<String, calamine::XlsxError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        if let Some(table) = sheet_table(&range) {
            sections.push(format!("## {name}\n\n{table}"));
        }
    }
    Ok(sections.join("\n\n"))
}

/// A Markdown table with the first non-empty row as header. `None` when
/// the sheet has no values.
fn sheet_table(range: &Range<Data>) -> Option<String> {
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();
    let (header, body) = rows.split_first()?;

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(table_row(header));
    lines.push(format!("|{}", " --- |".repeat(header.len())));
    lines.extend(body.iter().map(|cells| table_row(cells)));
    Some(lines.join("\n"))
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other
            .to_string()
            .replace('|', "\\|")
            .replace(['\r', '\n'], " ")
            .trim()
            .to_string(),
    }
}
