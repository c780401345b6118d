//! PDF text extraction, per page (spec §4.9).

use crate::error::{RaglineError, Result};
use lopdf::Document;

pub struct ExtractedPdf {
    pub pages: Vec<String>,
    pub page_count: usize,
}

impl ExtractedPdf {
    pub fn full_text(&self) -> String {
        self.pages.join("\n\n")
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.len()).sum()
    }
}

/// Extracts text page-by-page from PDF bytes. A page whose text cannot be
/// extracted is recorded as an empty string rather than failing the whole
/// document.
pub fn extract(bytes: &[u8]) -> Result<ExtractedPdf> {
    let doc = Document::load_mem(bytes).map_err(|e| {
        RaglineError::Validation(format!("failed to parse PDF: {e}"))
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let page_count = page_numbers.len();

    let mut pages = Vec::with_capacity(page_count);
    for page_number in page_numbers {
        let text = doc.extract_text(&[page_number]).unwrap_or_default();
        pages.push(text);
    }

    Ok(ExtractedPdf { pages, page_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected_as_invalid() {
        let result = extract(b"not a pdf");
        assert!(result.is_err());
    }
}
