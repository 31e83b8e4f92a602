//! Word documents.
//!
//! DOCX is a ZIP package; the body lives in `word/document.xml` and is walked as a
//! real XML event stream. Legacy binary DOC has no structural parse here: text is
//! scavenged from the byte stream with resume-shaped patterns instead.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

const DOCUMENT_PART: &str = "word/document.xml";
/// Upper bound on the decompressed document part (zip-bomb guard).
const MAX_PART_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a DOCX package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read document part: {0}")]
    Io(#[from] std::io::Error),

    #[error("document part exceeds size limit")]
    TooLarge,

    #[error("malformed document XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("no text runs found")]
    NoText,

    #[error("no readable text found in binary document")]
    NoBinaryText,
}

// ────────────────────────────────────────────────────────────────────────────
// DOCX package
// ────────────────────────────────────────────────────────────────────────────

pub fn extract_docx_package(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let entry = archive.by_name(DOCUMENT_PART)?;

    let mut xml = Vec::new();
    entry.take(MAX_PART_BYTES).read_to_end(&mut xml)?;
    if xml.len() as u64 >= MAX_PART_BYTES {
        return Err(DocxError::TooLarge);
    }

    let text = walk_word_xml(&xml)?;
    if text.trim().is_empty() {
        return Err(DocxError::NoText);
    }
    Ok(text)
}

/// Walks WordprocessingML and returns the text of `t` runs.
///
/// Runs inside one paragraph are concatenated as-is (Word splits words across
/// runs); each paragraph ends with a newline. Runs outside any paragraph, as in
/// bare fragments, are separated by a space.
///
/// Text boxes are stored twice, as DrawingML in `mc:Choice` and as VML in
/// `mc:Fallback`; the fallback copy is skipped.
fn walk_word_xml(xml: &[u8]) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    let mut paragraph_depth = 0usize;
    let mut fallback_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"Fallback" => fallback_depth += 1,
            Event::End(e) if e.local_name().as_ref() == b"Fallback" => {
                fallback_depth = fallback_depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ if fallback_depth > 0 => {}
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => {
                    if paragraph_depth == 0 && out.chars().last().is_some_and(|c| !c.is_whitespace()) {
                        out.push(' ');
                    }
                    in_text = true;
                }
                b"p" => paragraph_depth += 1,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => match t.unescape() {
                Ok(text) => out.push_str(&text),
                Err(_) => out.push_str(&String::from_utf8_lossy(&t)),
            },
            Event::CData(t) if in_text => out.push_str(&String::from_utf8_lossy(&t)),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    paragraph_depth = paragraph_depth.saturating_sub(1);
                    out.push('\n');
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Loose markup (bare XML, mislabelled uploads)
// ────────────────────────────────────────────────────────────────────────────

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">([^<]{3,})<").expect("between-tags pattern is valid"));

/// Treats the raw bytes as WordprocessingML markup. If the markup has no text runs
/// or does not parse, falls back to any text found between tags.
pub fn extract_docx_markup(bytes: &[u8]) -> Result<String, DocxError> {
    let source = String::from_utf8_lossy(bytes);

    if source.contains("<w:t") {
        if let Ok(text) = walk_word_xml(source.as_bytes()) {
            if !text.trim().is_empty() {
                return Ok(text);
            }
        }
    }

    let pieces: Vec<&str> = BETWEEN_TAGS
        .captures_iter(&source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| s.len() > 2 && s.chars().any(|c| c.is_ascii_alphabetic()))
        .collect();

    if pieces.is_empty() {
        return Err(DocxError::NoText);
    }
    Ok(pieces.join(" "))
}

// ────────────────────────────────────────────────────────────────────────────
// Binary DOC scavenging
// ────────────────────────────────────────────────────────────────────────────

/// Views map every unprintable byte (or UTF-16 unit) to NUL, which none of the
/// patterns match, so a match never spans binary data.
static DOC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // long printable runs that start with a letter
        r#"[A-Za-z][A-Za-z0-9 \t.,;:!?@#%^&*()\-_+={}\[\]|\\<>/~`"']{15,}"#,
        // labelled resume fields
        r"(?i)(?:Name|Email|Phone|Address|Experience|Education|Skills|Summary|Objective)[^<>{}\x00]{10,}",
        // capitalised name pairs
        r"\b[A-Z][a-z]+ +[A-Z][a-z]+\b",
        // dates
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        // phone numbers
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
        // email addresses
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("doc pattern is valid"))
    .collect()
});

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) || b == b'\t'
}

fn byte_view(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if is_printable(b) { b as char } else { '\0' })
        .collect()
}

/// Word 97+ stores most text as UTF-16LE; `offset` picks the byte alignment.
fn utf16le_view(bytes: &[u8], offset: usize) -> String {
    bytes
        .get(offset..)
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|pair| {
            if pair[1] == 0 && is_printable(pair[0]) {
                pair[0] as char
            } else {
                '\0'
            }
        })
        .collect()
}

/// All pattern matches of one view, in offset order, without overlaps.
fn scan_view(view: &str) -> Vec<String> {
    let mut spans: Vec<(usize, usize)> = DOC_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(view).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut pieces = Vec::new();
    let mut covered_until = 0usize;
    for (start, end) in spans {
        if start < covered_until {
            continue;
        }
        covered_until = end;
        let piece = view[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        if piece.len() > 3 {
            pieces.push(piece);
        }
    }
    pieces
}

pub fn scan_doc_binary(bytes: &[u8]) -> Result<String, DocxError> {
    let sections: Vec<String> = [byte_view(bytes), utf16le_view(bytes, 0), utf16le_view(bytes, 1)]
        .iter()
        .map(|view| scan_view(view).join("\n"))
        .filter(|section| !section.is_empty())
        .collect();

    if sections.is_empty() {
        return Err(DocxError::NoBinaryText);
    }
    Ok(sections.join("\n"))
}
