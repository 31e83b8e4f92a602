use axum::{extract::rejection::JsonRejection, extract::State, Json};
use base64::Engine as _;
use serde::Deserialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::detect::family_from_mime;
use crate::extraction::types::{DocumentFamily, ExtractionResult, SourceDocument};
use crate::state::AppState;

/// Upload payload. `base64File` / `fileType` are accepted for older clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default, alias = "base64File")]
    pub file_bytes: Option<String>,
    #[serde(default, alias = "fileType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Splits an optional `data:<mime>;base64,` prefix off the payload.
fn split_data_uri(payload: &str) -> (Option<&str>, &str) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (None, payload);
    };
    match rest.split_once(',') {
        Some((header, data)) => {
            let mime = header
                .strip_suffix(";base64")
                .unwrap_or(header)
                .split(';')
                .next()
                .filter(|m| !m.is_empty());
            (mime, data)
        }
        None => (None, payload),
    }
}

/// Validates the request and decodes it into a document.
pub fn decode_request(req: ExtractRequest, max_upload_bytes: usize) -> Result<SourceDocument, AppError> {
    let payload = req
        .file_bytes
        .ok_or_else(|| AppError::Validation("fileBytes is required".to_string()))?;

    let (uri_mime, data) = split_data_uri(payload.trim());
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(AppError::Validation("fileBytes is empty".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AppError::Validation(format!("fileBytes is not valid base64: {e}")))?;

    if bytes.len() > max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Document is {} bytes; the limit is {max_upload_bytes} bytes",
            bytes.len()
        )));
    }

    let mime_type = req
        .mime_type
        .filter(|m| !m.trim().is_empty())
        .or_else(|| uri_mime.map(str::to_string));

    Ok(SourceDocument::new(bytes, mime_type, req.file_name))
}

async fn run_extraction(state: &AppState, doc: SourceDocument) -> ExtractionResult {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "extract",
        %request_id,
        mime_type = doc.declared_mime_type.as_deref().unwrap_or(""),
        file_name = doc.file_name.as_deref().unwrap_or(""),
    );
    state.pipeline.extract(&doc).instrument(span).await
}

/// POST /api/v1/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, AppError> {
    let Json(req) = payload?;
    let doc = decode_request(req, state.config.max_upload_bytes)?;
    Ok(Json(run_extraction(&state, doc).await))
}

/// POST /api/v1/extract/docx
/// Word-only endpoint: a missing or generic MIME type means DOCX.
pub async fn handle_extract_docx(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, AppError> {
    let Json(req) = payload?;
    let mut doc = decode_request(req, state.config.max_upload_bytes)?;

    let declared = doc.declared_mime_type.as_deref().and_then(family_from_mime);
    if declared.is_none() {
        doc.declared_mime_type = Some(DocumentFamily::Docx.canonical_mime().to_string());
    }
    Ok(Json(run_extraction(&state, doc).await))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, ExtractionConfig};
    use crate::extraction::test_support::{docx_bytes, random_bytes, MockOcr};
    use crate::extraction::types::DIAGNOSTIC_PREFIX;
    use crate::extraction::ExtractionPipeline;
    use crate::routes::build_router;

    fn app(max_upload_bytes: usize) -> Router {
        let extraction = ExtractionConfig::default();
        let pipeline = ExtractionPipeline::new(&extraction, Arc::new(MockOcr::failing("offline")));
        build_router(AppState {
            pipeline: Arc::new(pipeline),
            config: Config {
                port: 0,
                rust_log: "info".to_string(),
                max_upload_bytes,
                extraction,
            },
        })
    }

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    async fn post(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const RESUME: &str = "Jane Doe\nSoftware Engineer\nSkills: Python, SQL";

    #[tokio::test]
    async fn test_extract_plain_text() {
        let body = json!({
            "fileBytes": encode(RESUME.as_bytes()),
            "mimeType": "text/plain",
            "fileName": "resume.txt"
        });
        let (status, json) = post(app(1024), "/api/v1/extract", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["extractedText"], RESUME);
        assert_eq!(json["quality"], "ok");
        assert_eq!(json["family"], "plain-text");
        assert_eq!(json["strategy"], "plain_text");
    }

    #[tokio::test]
    async fn test_extract_accepts_legacy_field_names_and_data_uri() {
        let body = json!({
            "base64File": format!("data:text/plain;base64,{}", encode(RESUME.as_bytes())),
        });
        let (status, json) = post(app(1024), "/api/v1/extract", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["extractedText"], RESUME);
        assert_eq!(json["family"], "plain-text");
    }

    #[tokio::test]
    async fn test_unreadable_document_is_still_200_with_diagnostic() {
        let body = json!({
            "fileBytes": encode(&random_bytes(512, 5)),
            "fileType": "application/pdf"
        });
        let (status, json) = post(app(4096), "/api/v1/extract", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["quality"], "failed");
        assert!(json["strategy"].is_null());
        assert!(json["extractedText"].as_str().unwrap().starts_with(DIAGNOSTIC_PREFIX));
    }

    #[tokio::test]
    async fn test_missing_file_bytes_is_400() {
        let (status, json) = post(app(1024), "/api/v1/extract", json!({"mimeType": "text/plain"}).to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(json["extractedText"].as_str().unwrap().starts_with(DIAGNOSTIC_PREFIX));
    }

    #[tokio::test]
    async fn test_invalid_base64_is_400() {
        let body = json!({"fileBytes": "not base64 at all!!"});
        let (status, json) = post(app(1024), "/api/v1/extract", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let (status, json) = post(app(1024), "/api/v1/extract", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["extractedText"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_document_is_413() {
        let body = json!({"fileBytes": encode(&[b'a'; 64])});
        let (status, json) = post(app(32), "/api/v1/extract", body.to_string()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_docx_endpoint_defaults_to_docx() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
            <w:p><w:r><w:t>Senior Software Engineer</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let body = json!({
            "fileBytes": encode(&docx_bytes(xml)),
            "mimeType": "application/octet-stream"
        });
        let (status, json) = post(app(64 * 1024), "/api/v1/extract/docx", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["family"], "docx");
        assert_eq!(json["extractedText"], "Jane Doe\nSenior Software Engineer");
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_split_data_uri() {
        assert_eq!(split_data_uri("data:application/pdf;base64,QUJD"), (Some("application/pdf"), "QUJD"));
        assert_eq!(split_data_uri("QUJD"), (None, "QUJD"));
        assert_eq!(split_data_uri("data:;base64,QUJD"), (None, "QUJD"));
    }
}
