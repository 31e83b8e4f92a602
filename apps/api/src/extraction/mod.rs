//! Document text extraction.
//!
//! bytes → detect family → fallback chain (each attempt cleaned and gated) →
//! [`ExtractionResult`]. Nothing in here returns an error to the caller: every
//! failure ends up as a failed attempt, and total exhaustion as a diagnostic
//! result.

pub mod chain;
pub mod clean;
pub mod detect;
pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod plain;
pub mod quality;
pub mod rtf;
pub mod types;

#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use chain::{chain_for, run_chain, ExtractionStrategy};
use detect::detect_family;
use ocr::{DisabledOcr, OcrEngine, OcrError, OcrSpaceClient};
use quality::QualityGate;
use types::{DocumentFamily, ExtractionResult, QualityFlag, SourceDocument};

/// Entry point of the extraction core. Immutable after construction and shared
/// across requests.
pub struct ExtractionPipeline {
    gate: QualityGate,
    ocr: Arc<dyn OcrEngine>,
}

impl ExtractionPipeline {
    pub fn new(config: &ExtractionConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            gate: QualityGate::from_config(config),
            ocr,
        }
    }

    /// Builds the pipeline with the OCR.space client, or with OCR disabled when
    /// no API key is configured.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, OcrError> {
        let ocr: Arc<dyn OcrEngine> = match OcrSpaceClient::from_config(config)? {
            Some(client) => Arc::new(client),
            None => {
                warn!("OCR_API_KEY not set; OCR fallback disabled");
                Arc::new(DisabledOcr)
            }
        };
        Ok(Self::new(config, ocr))
    }

    pub fn strategies_for(&self, family: DocumentFamily) -> Vec<Box<dyn ExtractionStrategy>> {
        chain_for(family, &self.ocr)
    }

    pub async fn extract(&self, doc: &SourceDocument) -> ExtractionResult {
        let family = detect_family(
            doc.declared_mime_type.as_deref(),
            doc.file_name.as_deref(),
            &doc.bytes,
        );
        debug!(
            family = %family,
            mime_type = doc.declared_mime_type.as_deref().unwrap_or(""),
            bytes = doc.bytes.len(),
            "routing document"
        );

        let strategies = self.strategies_for(family);
        let outcome = run_chain(&strategies, doc, &self.gate).await;

        let result = match outcome.winner {
            Some((strategy, text)) => ExtractionResult {
                extracted_text: text,
                quality: if strategy.is_lossy() {
                    QualityFlag::Degraded
                } else {
                    QualityFlag::Ok
                },
                family,
                strategy: Some(strategy),
            },
            None => {
                let reasons: Vec<String> = outcome
                    .attempts
                    .iter()
                    .map(|a| {
                        let reason = a.failure_reason.as_deref().unwrap_or("unknown");
                        match a.raw_output.as_ref().map(String::len) {
                            Some(len) => format!("{} ({len} bytes raw): {reason}", a.strategy),
                            None => format!("{}: {reason}", a.strategy),
                        }
                    })
                    .collect();
                warn!(family = %family, attempts = ?reasons, "all strategies exhausted");
                ExtractionResult::failed(family)
            }
        };

        info!(
            family = %family,
            strategy = result.strategy.map(|s| s.as_str()).unwrap_or("none"),
            quality = ?result.quality,
            attempts = outcome.attempts.len(),
            rejected = outcome.attempts.iter().filter(|a| !a.succeeded).count(),
            text_length = result.extracted_text.len(),
            diagnostic = result.is_diagnostic(),
            "extraction finished"
        );
        result
    }
}
