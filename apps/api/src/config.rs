use std::str::FromStr;

use anyhow::{Context, Result};

pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub extraction: ExtractionConfig,
}

/// Everything the extraction pipeline needs, handed to it at construction time.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub ocr_endpoint: String,
    /// OCR is disabled when no key is configured.
    pub ocr_api_key: Option<String>,
    pub min_quality_length: usize,
    pub min_alpha_ratio: f64,
    pub min_word_ratio: f64,
    pub request_timeout_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            ocr_api_key: None,
            min_quality_length: 20,
            min_alpha_ratio: 0.5,
            min_word_ratio: 0.5,
            request_timeout_ms: 30_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = ExtractionConfig::default();

        Ok(Config {
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            extraction: ExtractionConfig {
                ocr_endpoint: std::env::var("OCR_ENDPOINT").unwrap_or(defaults.ocr_endpoint),
                ocr_api_key: std::env::var("OCR_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                min_quality_length: env_or("MIN_QUALITY_LENGTH", defaults.min_quality_length)?,
                min_alpha_ratio: ratio(env_or("MIN_ALPHA_RATIO", defaults.min_alpha_ratio)?)
                    .context("MIN_ALPHA_RATIO must be between 0 and 1")?,
                min_word_ratio: ratio(env_or("MIN_WORD_RATIO", defaults.min_word_ratio)?)
                    .context("MIN_WORD_RATIO must be between 0 and 1")?,
                request_timeout_ms: env_or("OCR_TIMEOUT_MS", defaults.request_timeout_ms)?,
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(std::env::var(key).ok().as_deref(), default)
        .with_context(|| format!("Environment variable '{key}' has an invalid value"))
}

fn parse_or<T>(raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => Ok(value.parse::<T>()?),
    }
}

fn ratio(value: f64) -> Result<f64> {
    anyhow::ensure!((0.0..=1.0).contains(&value), "ratio {value} out of range");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_missing_or_blank() {
        assert_eq!(parse_or::<u16>(None, 8080).unwrap(), 8080);
        assert_eq!(parse_or::<u16>(Some("  "), 8080).unwrap(), 8080);
    }

    #[test]
    fn test_parse_or_parses_value() {
        assert_eq!(parse_or::<usize>(Some(" 50 "), 20).unwrap(), 50);
        assert!((parse_or::<f64>(Some("0.35"), 0.5).unwrap() - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        assert!(parse_or::<u16>(Some("eighty"), 8080).is_err());
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(ratio(0.0).is_ok());
        assert!(ratio(1.0).is_ok());
        assert!(ratio(1.5).is_err());
        assert!(ratio(-0.1).is_err());
    }

    #[test]
    fn test_default_extraction_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.ocr_endpoint, DEFAULT_OCR_ENDPOINT);
        assert!(config.ocr_api_key.is_none());
        assert_eq!(config.min_quality_length, 20);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
