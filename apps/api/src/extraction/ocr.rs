//! OCR service boundary.
//!
//! The pipeline only sees the `OcrEngine` trait. The production engine talks to an
//! OCR.space-compatible HTTP API; every failure mode comes back as an `OcrError`
//! which the fallback chain records as a failed attempt.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{multipart::Form, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;

const MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("OCR response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("OCR processing error: {0}")]
    Processing(String),

    #[error("OCR returned no text")]
    EmptyResult,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognises text in a whole document (PDF or image) given its declared MIME type.
    async fn recognize(&self, bytes: &[u8], mime_type: &str) -> Result<String, OcrError>;
}

/// Stand-in used when no OCR key is configured; always fails.
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn recognize(&self, _bytes: &[u8], _mime_type: &str) -> Result<String, OcrError> {
        Err(OcrError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

/// OCR.space sends either a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn joined(&self) -> String {
        match self {
            ErrorMessage::One(message) => message.clone(),
            ErrorMessage::Many(messages) => messages.join(", "),
        }
    }
}

/// Client for an OCR.space-compatible `parse/image` endpoint.
#[derive(Clone)]
pub struct OcrSpaceClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OcrSpaceClient {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Builds a client from config, or `None` when OCR has no key.
    pub fn from_config(config: &ExtractionConfig) -> Result<Option<Self>, OcrError> {
        match &config.ocr_api_key {
            Some(key) => Self::new(
                config.ocr_endpoint.clone(),
                key.clone(),
                Duration::from_millis(config.request_timeout_ms),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn form(&self, data_uri: &str) -> Form {
        Form::new()
            .text("base64Image", data_uri.to_string())
            .text("apikey", self.api_key.clone())
            .text("isOverlayRequired", "false")
            .text("detectOrientation", "true")
            .text("scale", "true")
            .text("isTable", "true")
    }
}

#[async_trait]
impl OcrEngine for OcrSpaceClient {
    async fn recognize(&self, bytes: &[u8], mime_type: &str) -> Result<String, OcrError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data_uri = format!("data:{mime_type};base64,{encoded}");

        let mut last_error: Option<OcrError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "OCR call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .multipart(self.form(&data_uri))
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(OcrError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 || status.is_server_error() {
                warn!("OCR API returned {}", status);
                last_error = Some(OcrError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(OcrError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let text = parse_ocr_response(&body)?;
            debug!(text_length = text.len(), "OCR call succeeded");
            return Ok(text);
        }

        Err(last_error.unwrap_or(OcrError::EmptyResult))
    }
}

/// Turns an OCR.space JSON body into text, joining page results with newlines.
fn parse_ocr_response(body: &str) -> Result<String, OcrError> {
    let response: OcrSpaceResponse = serde_json::from_str(body)?;

    if response.is_errored_on_processing {
        let message = response
            .error_message
            .as_ref()
            .map(ErrorMessage::joined)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(OcrError::Processing(message));
    }

    let text = response
        .parsed_results
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.parsed_text.unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(OcrError::EmptyResult);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_page_results() {
        let body = r#"{
            "ParsedResults": [
                {"ParsedText": "Jane Doe\r\n", "FileParseExitCode": 1},
                {"ParsedText": "Software Engineer", "FileParseExitCode": 1}
            ],
            "OCRExitCode": 1,
            "IsErroredOnProcessing": false
        }"#;
        let text = parse_ocr_response(body).unwrap();
        assert_eq!(text, "Jane Doe\r\n\nSoftware Engineer");
    }

    #[test]
    fn test_parse_processing_error_list() {
        let body = r#"{
            "ParsedResults": null,
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["File failed validation", "Unable to recognize the file type"]
        }"#;
        match parse_ocr_response(body) {
            Err(OcrError::Processing(msg)) => {
                assert_eq!(msg, "File failed validation, Unable to recognize the file type")
            }
            other => panic!("expected processing error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_processing_error_string() {
        let body = r#"{"IsErroredOnProcessing": true, "ErrorMessage": "Timed out"}"#;
        assert!(matches!(
            parse_ocr_response(body),
            Err(OcrError::Processing(m)) if m == "Timed out"
        ));
    }

    #[test]
    fn test_parse_processing_error_without_message() {
        let body = r#"{"IsErroredOnProcessing": true}"#;
        assert!(matches!(
            parse_ocr_response(body),
            Err(OcrError::Processing(m)) if m == "Unknown error"
        ));
    }

    #[test]
    fn test_parse_empty_results() {
        let body = r#"{"ParsedResults": [{"ParsedText": "  "}], "IsErroredOnProcessing": false}"#;
        assert!(matches!(parse_ocr_response(body), Err(OcrError::EmptyResult)));
    }

    #[test]
    fn test_parse_non_json_body() {
        assert!(matches!(
            parse_ocr_response("The API key is invalid"),
            Err(OcrError::Parse(_))
        ));
    }

    #[test]
    fn test_from_config_without_key_is_none() {
        let config = ExtractionConfig::default();
        assert!(OcrSpaceClient::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_ocr_fails() {
        let result = DisabledOcr.recognize(b"%PDF-1.4", "application/pdf").await;
        assert!(matches!(result, Err(OcrError::NotConfigured)));
    }
}
