//! Input normalizer: decides which document family an upload belongs to.
//!
//! Order of evidence: declared MIME type, then file extension, then magic bytes.
//! Anything still unresolved is `Unknown` and gets the best-effort chain.

use crate::extraction::types::DocumentFamily;

const GENERIC_MIME_TYPES: &[&str] = &[
    "",
    "application/octet-stream",
    "binary/octet-stream",
    "application/unknown",
    "application/x-download",
];

const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub fn detect_family(
    mime_type: Option<&str>,
    file_name: Option<&str>,
    bytes: &[u8],
) -> DocumentFamily {
    mime_type
        .and_then(family_from_mime)
        .or_else(|| file_name.and_then(family_from_extension))
        .or_else(|| family_from_magic(bytes))
        .unwrap_or(DocumentFamily::Unknown)
}

/// Maps a declared MIME type to a family. Generic and unrecognised types return `None`.
pub fn family_from_mime(mime_type: &str) -> Option<DocumentFamily> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if GENERIC_MIME_TYPES.contains(&essence.as_str()) {
        return None;
    }

    match essence.as_str() {
        "text/plain" | "text/markdown" | "text/x-markdown" => Some(DocumentFamily::PlainText),
        "application/pdf" | "application/x-pdf" | "application/acrobat" => {
            Some(DocumentFamily::Pdf)
        }
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.ms-word.document.macroenabled.12" => Some(DocumentFamily::Docx),
        "application/msword" | "application/vnd.ms-word" => Some(DocumentFamily::Doc),
        "text/rtf" | "application/rtf" | "application/x-rtf" | "text/richtext" => {
            Some(DocumentFamily::Rtf)
        }
        _ => None,
    }
}

pub fn family_from_extension(file_name: &str) -> Option<DocumentFamily> {
    let (_, ext) = file_name.trim().rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "text" | "md" => Some(DocumentFamily::PlainText),
        "pdf" => Some(DocumentFamily::Pdf),
        "docx" | "docm" | "dotx" => Some(DocumentFamily::Docx),
        "doc" | "dot" => Some(DocumentFamily::Doc),
        "rtf" => Some(DocumentFamily::Rtf),
        _ => None,
    }
}

pub fn family_from_magic(bytes: &[u8]) -> Option<DocumentFamily> {
    let head = &bytes[..bytes.len().min(1024)];

    if contains(head, b"%PDF-") {
        return Some(DocumentFamily::Pdf);
    }
    if head.starts_with(b"{\\rtf") {
        return Some(DocumentFamily::Rtf);
    }
    if head.starts_with(ZIP_MAGIC) && contains(bytes, b"word/") {
        return Some(DocumentFamily::Docx);
    }
    if head.starts_with(OLE2_MAGIC) {
        return Some(DocumentFamily::Doc);
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_wins_over_extension() {
        let family = detect_family(Some("application/pdf"), Some("resume.docx"), b"");
        assert_eq!(family, DocumentFamily::Pdf);
    }

    #[test]
    fn test_mime_parameters_and_case_are_ignored() {
        assert_eq!(
            family_from_mime("Text/Plain; charset=utf-8"),
            Some(DocumentFamily::PlainText)
        );
    }

    #[test]
    fn test_generic_mime_falls_back_to_extension() {
        let family = detect_family(
            Some("application/octet-stream"),
            Some("Jane_Doe.DOCX"),
            b"",
        );
        assert_eq!(family, DocumentFamily::Docx);
    }

    #[test]
    fn test_unrecognised_mime_falls_back_to_extension() {
        let family = detect_family(Some("application/x-foo"), Some("cv.rtf"), b"");
        assert_eq!(family, DocumentFamily::Rtf);
    }

    #[test]
    fn test_missing_everything_sniffs_magic() {
        assert_eq!(
            detect_family(None, None, b"%PDF-1.7\n..."),
            DocumentFamily::Pdf
        );
        assert_eq!(
            detect_family(None, Some("upload"), b"{\\rtf1\\ansi hello}"),
            DocumentFamily::Rtf
        );
        assert_eq!(
            detect_family(None, None, b"PK\x03\x04....word/document.xml"),
            DocumentFamily::Docx
        );
        assert_eq!(
            detect_family(None, None, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0]),
            DocumentFamily::Doc
        );
    }

    #[test]
    fn test_plain_zip_is_not_docx() {
        assert_eq!(family_from_magic(b"PK\x03\x04 data.csv"), None);
    }

    #[test]
    fn test_unresolvable_input_is_unknown() {
        assert_eq!(
            detect_family(Some("image/png"), Some("scan.png"), &[0x89, b'P', b'N', b'G']),
            DocumentFamily::Unknown
        );
        assert_eq!(detect_family(None, None, b""), DocumentFamily::Unknown);
    }

    #[test]
    fn test_extension_requires_a_dot() {
        assert_eq!(family_from_extension("pdf"), None);
        assert_eq!(family_from_extension("archive.tar.pdf"), Some(DocumentFamily::Pdf));
    }
}
