//! PDF text extraction.
//!
//! Three structural strategies, from most to least precise:
//! - `layout`: walks page content streams through the lopdf object model and
//!   rebuilds lines and word gaps from glyph positions
//! - `text_layer`: the `pdf-extract` text layer, which understands font
//!   `ToUnicode` maps that `layout` does not
//! - `tokens`: a tolerant lexer over raw and Flate-inflated streams, for files
//!   too damaged to load as a document

pub mod layout;
pub mod tokens;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to load PDF: {0}")]
    Load(#[from] lopdf::Error),

    #[error("document is encrypted")]
    Encrypted,

    #[error("text layer extraction failed: {0}")]
    TextLayer(String),

    #[error("no text operators found")]
    NoText,
}

pub use layout::extract_layout_text;
pub use tokens::extract_content_tokens;

/// Text layer via `pdf-extract`.
pub fn extract_text_layer(bytes: &[u8]) -> Result<String, PdfError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PdfError::TextLayer(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(PdfError::NoText);
    }
    Ok(text)
}

/// Decodes a PDF string object: UTF-16BE or UTF-8 when marked with a BOM,
/// otherwise one byte per character (PDFDocEncoding / WinAnsi are Latin-1 for
/// the printable range).
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return crate::extraction::plain::decode_utf16(rest, u16::from_be_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}
