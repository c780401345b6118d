//! DOCX text extraction: paragraph and table cell text (spec §4.9).

use crate::error::{RaglineError, Result};
use docx_rs::{
    DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild,
};

pub struct ExtractedDocx {
    pub paragraphs: Vec<String>,
    pub paragraph_count: usize,
}

impl ExtractedDocx {
    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n")
    }
}

/// Extracts readable text from DOCX bytes: every paragraph's runs, plus
/// every table cell's paragraphs, in document order.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocx> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| RaglineError::Validation(format!("failed to parse DOCX: {e}")))?;

    let mut paragraphs = Vec::new();
    for child in &docx.document.children {
        collect_document_child(child, &mut paragraphs);
    }

    let paragraph_count = paragraphs.len();
    Ok(ExtractedDocx { paragraphs, paragraph_count })
}

fn collect_document_child(child: &DocumentChild, out: &mut Vec<String>) {
    match child {
        DocumentChild::Paragraph(paragraph) => {
            let text = paragraph_text(&paragraph.children);
            if !text.trim().is_empty() {
                out.push(text);
            }
        }
        DocumentChild::Table(table) => {
            for row in &table.rows {
                let TableChild::TableRow(row) = row;
                for cell in &row.cells {
                    let TableRowChild::TableCell(cell) = cell;
                    for content in &cell.children {
                        if let TableCellContent::Paragraph(paragraph) = content {
                            let text = paragraph_text(&paragraph.children);
                            if !text.trim().is_empty() {
                                out.push(text);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected_as_invalid() {
        let result = extract(b"not a docx");
        assert!(result.is_err());
    }
}
