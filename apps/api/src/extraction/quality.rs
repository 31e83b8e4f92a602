use thiserror::Error;

use crate::config::ExtractionConfig;

/// Why a cleaned extraction was not accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateRejection {
    #[error("no text after cleaning")]
    Empty,

    #[error("only {length} characters (minimum {min})")]
    TooShort { length: usize, min: usize },

    #[error("alphabetic ratio {ratio:.2} below {min:.2}")]
    LowAlphaRatio { ratio: f64, min: f64 },

    #[error("word-like token ratio {ratio:.2} below {min:.2}")]
    LowWordRatio { ratio: f64, min: f64 },
}

/// Accept/reject check applied to every cleaned attempt.
///
/// - length: characters (not bytes), inclusive minimum
/// - alpha ratio: alphabetic chars / non-whitespace chars, inclusive minimum
/// - word ratio: share of whitespace-separated tokens that look like words
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    pub min_length: usize,
    pub min_alpha_ratio: f64,
    pub min_word_ratio: f64,
}

impl QualityGate {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min_length: config.min_quality_length,
            min_alpha_ratio: config.min_alpha_ratio,
            min_word_ratio: config.min_word_ratio,
        }
    }

    pub fn check(&self, text: &str) -> Result<(), GateRejection> {
        if text.trim().is_empty() {
            return Err(GateRejection::Empty);
        }

        let length = text.chars().count();
        if length < self.min_length {
            return Err(GateRejection::TooShort {
                length,
                min: self.min_length,
            });
        }

        let ratio = alpha_ratio(text);
        if ratio < self.min_alpha_ratio {
            return Err(GateRejection::LowAlphaRatio {
                ratio,
                min: self.min_alpha_ratio,
            });
        }

        let ratio = word_ratio(text);
        if ratio < self.min_word_ratio {
            return Err(GateRejection::LowWordRatio {
                ratio,
                min: self.min_word_ratio,
            });
        }

        Ok(())
    }
}

pub fn alpha_ratio(text: &str) -> f64 {
    let mut visible = 0usize;
    let mut alphabetic = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if c.is_alphabetic() {
            alphabetic += 1;
        }
    }
    if visible == 0 {
        return 0.0;
    }
    alphabetic as f64 / visible as f64
}

pub fn word_ratio(text: &str) -> f64 {
    let mut tokens = 0usize;
    let mut words = 0usize;
    for token in text.split_whitespace() {
        tokens += 1;
        if is_word_like(token) {
            words += 1;
        }
    }
    if tokens == 0 {
        return 0.0;
    }
    words as f64 / tokens as f64
}

/// "Skills:", "O'Brien", "e-mail" and "Python," count; "4567", "a#Bx" and "@" do not.
fn is_word_like(token: &str) -> bool {
    let core = token.trim_matches(|c: char| !c.is_alphanumeric());
    let letters = core.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && core
            .chars()
            .all(|c| c.is_alphabetic() || c == '-' || c == '\'' || c == '\u{2019}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(min_length: usize, min_alpha_ratio: f64, min_word_ratio: f64) -> QualityGate {
        QualityGate {
            min_length,
            min_alpha_ratio,
            min_word_ratio,
        }
    }

    #[test]
    fn test_length_boundary() {
        let gate = gate(50, 0.5, 0.5);
        let exact = "a".repeat(50);
        let short = "a".repeat(49);
        assert_eq!(gate.check(&exact), Ok(()));
        assert_eq!(
            gate.check(&short),
            Err(GateRejection::TooShort { length: 49, min: 50 })
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let gate = gate(4, 0.5, 0.5);
        assert_eq!(gate.check("José"), Ok(()));
    }

    #[test]
    fn test_alpha_ratio_boundary() {
        let gate = gate(10, 0.5, 0.0);
        let exact = format!("{}{}", "a".repeat(30), "1".repeat(30));
        let below = format!("{}{}", "a".repeat(29), "1".repeat(31));
        assert_eq!(gate.check(&exact), Ok(()));
        assert!(matches!(
            gate.check(&below),
            Err(GateRejection::LowAlphaRatio { .. })
        ));
    }

    #[test]
    fn test_word_ratio_boundary() {
        let gate = gate(1, 0.0, 0.5);
        assert_eq!(gate.check("Jane Doe 1234 5678"), Ok(()));
        assert!(matches!(
            gate.check("Jane 1234 5678 9999"),
            Err(GateRejection::LowWordRatio { .. })
        ));
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        let gate = gate(0, 0.0, 0.0);
        assert_eq!(gate.check(""), Err(GateRejection::Empty));
        assert_eq!(gate.check(" \n "), Err(GateRejection::Empty));
    }

    #[test]
    fn test_symbol_garbage_rejected() {
        let gate = gate(20, 0.5, 0.5);
        let garbage = "#$%^ &*() !@#$ {}[] <>?/ |\\~` ;:'\" ,.-_ =+#$";
        assert!(gate.check(garbage).is_err());
    }

    #[test]
    fn test_resume_text_accepted() {
        let gate = gate(20, 0.5, 0.5);
        let text = "Jane Doe\njane.doe@example.com | (555) 123-4567\nSoftware Engineer\nSkills: Python, SQL, Rust, Kubernetes";
        assert_eq!(gate.check(text), Ok(()));
    }

    #[test]
    fn test_word_like_tokens() {
        assert!(is_word_like("Skills:"));
        assert!(is_word_like("O'Brien"));
        assert!(is_word_like("(Python),"));
        assert!(!is_word_like("4567"));
        assert!(!is_word_like("a#Bx"));
        assert!(!is_word_like("@"));
        assert!(!is_word_like("I"));
    }
}
