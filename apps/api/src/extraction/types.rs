use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Every diagnostic sentence returned in place of extracted text starts with this
/// prefix, so callers can tell a readable failure apart from real document text.
pub const DIAGNOSTIC_PREFIX: &str = "[extraction-failed] ";

/// An uploaded document, exactly as received from the caller.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Bytes,
    pub declared_mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl SourceDocument {
    pub fn new(
        bytes: impl Into<Bytes>,
        declared_mime_type: Option<String>,
        file_name: Option<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime_type,
            file_name,
        }
    }
}

/// Document family the input normalizer routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFamily {
    PlainText,
    Pdf,
    Docx,
    Doc,
    Rtf,
    Unknown,
}

impl DocumentFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFamily::PlainText => "plain-text",
            DocumentFamily::Pdf => "pdf",
            DocumentFamily::Docx => "docx",
            DocumentFamily::Doc => "doc",
            DocumentFamily::Rtf => "rtf",
            DocumentFamily::Unknown => "unknown",
        }
    }

    /// MIME type used when the caller did not declare one (OCR data URIs need it).
    pub fn canonical_mime(&self) -> &'static str {
        match self {
            DocumentFamily::PlainText => "text/plain",
            DocumentFamily::Pdf => "application/pdf",
            DocumentFamily::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFamily::Doc => "application/msword",
            DocumentFamily::Rtf => "application/rtf",
            DocumentFamily::Unknown => "application/octet-stream",
        }
    }

    /// User-presentable diagnostic for a document no strategy could read.
    pub fn failure_message(&self) -> String {
        let body = match self {
            DocumentFamily::PlainText => {
                "Unable to read text from this plain text file. The file may be empty or use an unsupported encoding."
            }
            DocumentFamily::Pdf => {
                "Unable to extract text from this PDF file. The document may be image-based, password-protected, or corrupted. Please try uploading a text-based document or a clearer scan."
            }
            DocumentFamily::Docx | DocumentFamily::Doc => {
                "Unable to extract readable text from this Word document. The file may be corrupted, password-protected, or in an unsupported format. Please try uploading a different file or convert it to PDF."
            }
            DocumentFamily::Rtf => {
                "Unable to extract text from this RTF file. The file may be corrupted or use an unsupported RTF variant."
            }
            DocumentFamily::Unknown => {
                "Unable to extract sufficient readable text from this file. Please upload a PDF, DOCX, DOC, RTF or TXT document."
            }
        };
        format!("{DIAGNOSTIC_PREFIX}{body}")
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the extraction strategies a fallback chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PdfLayout,
    PdfTextLayer,
    PdfContentTokens,
    DocxPackage,
    DocxMarkup,
    DocBinaryScan,
    Rtf,
    PlainText,
    Ocr,
    PrintableRuns,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PdfLayout => "pdf_layout",
            StrategyKind::PdfTextLayer => "pdf_text_layer",
            StrategyKind::PdfContentTokens => "pdf_content_tokens",
            StrategyKind::DocxPackage => "docx_package",
            StrategyKind::DocxMarkup => "docx_markup",
            StrategyKind::DocBinaryScan => "doc_binary_scan",
            StrategyKind::Rtf => "rtf",
            StrategyKind::PlainText => "plain_text",
            StrategyKind::Ocr => "ocr",
            StrategyKind::PrintableRuns => "printable_runs",
        }
    }

    /// Scavenging strategies that pull plausible text out of bytes they cannot parse.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            StrategyKind::PrintableRuns | StrategyKind::DocBinaryScan
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running one strategy against a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Success(String),
    Failed(String),
}

impl<E: fmt::Display> From<Result<String, E>> for Attempt {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Attempt::Success(text),
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

/// Record of one strategy run inside a fallback chain. `raw_output` is the text
/// before cleaning, `None` when the strategy produced nothing.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub strategy: StrategyKind,
    pub succeeded: bool,
    pub raw_output: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityFlag {
    Ok,
    Degraded,
    Failed,
}

/// The only value the pipeline hands back. `extracted_text` is never empty: on
/// failure it carries a diagnostic starting with [`DIAGNOSTIC_PREFIX`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub extracted_text: String,
    pub quality: QualityFlag,
    pub family: DocumentFamily,
    pub strategy: Option<StrategyKind>,
}

impl ExtractionResult {
    pub fn failed(family: DocumentFamily) -> Self {
        Self {
            extracted_text: family.failure_message(),
            quality: QualityFlag::Failed,
            family,
            strategy: None,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.extracted_text.starts_with(DIAGNOSTIC_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_from_result() {
        let ok: Result<String, String> = Ok("text".to_string());
        assert_eq!(Attempt::from(ok), Attempt::Success("text".to_string()));

        let err: Result<String, String> = Err("boom".to_string());
        assert_eq!(Attempt::from(err), Attempt::Failed("boom".to_string()));
    }

    #[test]
    fn test_failure_messages_carry_prefix() {
        for family in [
            DocumentFamily::PlainText,
            DocumentFamily::Pdf,
            DocumentFamily::Docx,
            DocumentFamily::Doc,
            DocumentFamily::Rtf,
            DocumentFamily::Unknown,
        ] {
            let result = ExtractionResult::failed(family);
            assert!(result.is_diagnostic());
            assert!(result.extracted_text.len() > DIAGNOSTIC_PREFIX.len());
            assert_eq!(result.quality, QualityFlag::Failed);
        }
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExtractionResult {
            extracted_text: "Jane Doe".to_string(),
            quality: QualityFlag::Ok,
            family: DocumentFamily::PlainText,
            strategy: Some(StrategyKind::PlainText),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["extractedText"], "Jane Doe");
        assert_eq!(json["quality"], "ok");
        assert_eq!(json["family"], "plain-text");
        assert_eq!(json["strategy"], "plain_text");
    }

    #[test]
    fn test_lossy_strategies() {
        assert!(StrategyKind::PrintableRuns.is_lossy());
        assert!(StrategyKind::DocBinaryScan.is_lossy());
        assert!(!StrategyKind::PdfLayout.is_lossy());
        assert!(!StrategyKind::Ocr.is_lossy());
    }
}
