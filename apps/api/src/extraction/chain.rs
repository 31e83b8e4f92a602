//! Fallback chains: ordered strategies, each result cleaned and put through the
//! quality gate; the first one that passes wins.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::clean::clean_text;
use super::ocr::OcrEngine;
use super::quality::QualityGate;
use super::types::{
    Attempt, DocumentFamily, ExtractionAttempt, SourceDocument, StrategyKind,
};
use super::{docx, pdf, plain, rtf};

// ────────────────────────────────────────────────────────────────────────────
// Strategy trait
// ────────────────────────────────────────────────────────────────────────────

/// One way of pulling raw text out of a document. Implementations never fail
/// loudly: every problem is reported as [`Attempt::Failed`].
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn attempt(&self, doc: &SourceDocument) -> Attempt;
}

/// A synchronous parser over the raw bytes. Runs on the blocking pool so large
/// uploads do not stall the async workers.
pub struct FnStrategy {
    kind: StrategyKind,
    run: fn(&[u8]) -> Attempt,
}

impl FnStrategy {
    pub const fn new(kind: StrategyKind, run: fn(&[u8]) -> Attempt) -> Self {
        Self { kind, run }
    }
}

#[async_trait]
impl ExtractionStrategy for FnStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(&self, doc: &SourceDocument) -> Attempt {
        let run = self.run;
        let bytes = doc.bytes.clone();
        // Third-party parsers can panic on malformed input.
        let task = tokio::task::spawn_blocking(move || catch_unwind(AssertUnwindSafe(|| run(&bytes))));

        match task.await {
            Ok(Ok(attempt)) => attempt,
            Ok(Err(_)) => Attempt::Failed(format!("{} parser panicked", self.kind)),
            Err(e) => Attempt::Failed(format!("{} task failed: {e}", self.kind)),
        }
    }
}

/// Sends the whole document to the OCR service.
pub struct OcrStrategy {
    engine: Arc<dyn OcrEngine>,
    family: DocumentFamily,
}

impl OcrStrategy {
    pub fn new(engine: Arc<dyn OcrEngine>, family: DocumentFamily) -> Self {
        Self { engine, family }
    }
}

#[async_trait]
impl ExtractionStrategy for OcrStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ocr
    }

    async fn attempt(&self, doc: &SourceDocument) -> Attempt {
        let mime_type = doc
            .declared_mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.family.canonical_mime());
        self.engine.recognize(&doc.bytes, mime_type).await.into()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-family chains
// ────────────────────────────────────────────────────────────────────────────

fn pdf_layout(bytes: &[u8]) -> Attempt {
    pdf::extract_layout_text(bytes).into()
}

fn pdf_text_layer(bytes: &[u8]) -> Attempt {
    pdf::extract_text_layer(bytes).into()
}

fn pdf_content_tokens(bytes: &[u8]) -> Attempt {
    pdf::extract_content_tokens(bytes).into()
}

fn docx_package(bytes: &[u8]) -> Attempt {
    docx::extract_docx_package(bytes).into()
}

fn docx_markup(bytes: &[u8]) -> Attempt {
    docx::extract_docx_markup(bytes).into()
}

fn doc_binary_scan(bytes: &[u8]) -> Attempt {
    docx::scan_doc_binary(bytes).into()
}

fn rtf_text(bytes: &[u8]) -> Attempt {
    rtf::extract_rtf_text(bytes).into()
}

fn plain_text(bytes: &[u8]) -> Attempt {
    plain::decode_text(bytes).into()
}

fn printable_runs(bytes: &[u8]) -> Attempt {
    plain::printable_runs(bytes).into()
}

fn sync(kind: StrategyKind, run: fn(&[u8]) -> Attempt) -> Box<dyn ExtractionStrategy> {
    Box::new(FnStrategy::new(kind, run))
}

/// The fallback chain for a family, cheapest and most faithful strategies first.
pub fn chain_for(
    family: DocumentFamily,
    ocr: &Arc<dyn OcrEngine>,
) -> Vec<Box<dyn ExtractionStrategy>> {
    let ocr_step = || -> Box<dyn ExtractionStrategy> {
        Box::new(OcrStrategy::new(Arc::clone(ocr), family))
    };

    match family {
        DocumentFamily::Pdf => vec![
            sync(StrategyKind::PdfLayout, pdf_layout),
            sync(StrategyKind::PdfTextLayer, pdf_text_layer),
            sync(StrategyKind::PdfContentTokens, pdf_content_tokens),
            ocr_step(),
            sync(StrategyKind::PrintableRuns, printable_runs),
        ],
        DocumentFamily::Docx => vec![
            sync(StrategyKind::DocxPackage, docx_package),
            sync(StrategyKind::DocxMarkup, docx_markup),
            sync(StrategyKind::DocBinaryScan, doc_binary_scan),
        ],
        // Legacy .doc uploads are often DOCX packages with the wrong extension.
        DocumentFamily::Doc => vec![
            sync(StrategyKind::DocxPackage, docx_package),
            sync(StrategyKind::DocBinaryScan, doc_binary_scan),
            sync(StrategyKind::PrintableRuns, printable_runs),
        ],
        DocumentFamily::Rtf => vec![sync(StrategyKind::Rtf, rtf_text), ocr_step()],
        DocumentFamily::PlainText => vec![sync(StrategyKind::PlainText, plain_text)],
        DocumentFamily::Unknown => vec![
            ocr_step(),
            sync(StrategyKind::PlainText, plain_text),
            sync(StrategyKind::PrintableRuns, printable_runs),
        ],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// Winning strategy and its cleaned text.
    pub winner: Option<(StrategyKind, String)>,
    pub attempts: Vec<ExtractionAttempt>,
}

/// Runs strategies in order and stops at the first cleaned result that passes
/// the gate. Later strategies are never invoked once one has passed.
pub async fn run_chain(
    strategies: &[Box<dyn ExtractionStrategy>],
    doc: &SourceDocument,
    gate: &QualityGate,
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();

    for strategy in strategies {
        let kind = strategy.kind();
        match strategy.attempt(doc).await {
            Attempt::Success(raw) => {
                let cleaned = clean_text(&raw, kind);
                match gate.check(&cleaned) {
                    Ok(()) => {
                        outcome.attempts.push(ExtractionAttempt {
                            strategy: kind,
                            succeeded: true,
                            raw_output: Some(raw),
                            failure_reason: None,
                        });
                        outcome.winner = Some((kind, cleaned));
                        return outcome;
                    }
                    Err(rejection) => {
                        debug!(strategy = %kind, raw_len = raw.len(), reason = %rejection, "strategy output rejected");
                        outcome.attempts.push(ExtractionAttempt {
                            strategy: kind,
                            succeeded: false,
                            raw_output: Some(raw),
                            failure_reason: Some(rejection.to_string()),
                        });
                    }
                }
            }
            Attempt::Failed(reason) => {
                debug!(strategy = %kind, reason = %reason, "strategy failed");
                outcome.attempts.push(ExtractionAttempt {
                    strategy: kind,
                    succeeded: false,
                    raw_output: None,
                    failure_reason: Some(reason),
                });
            }
        }
    }

    outcome
}
