//! Text cleaner shared by every strategy.
//!
//! The rules run in a fixed order and are pure functions of the text and the
//! strategy that produced it, so the same raw text always cleans to the same
//! output. Running the cleaner on its own output changes nothing.
//!
//! Structural noise stripping depends on the strategy: only the syntax a given
//! extractor can leak is removed. Plain text and OCR output never go through it.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::types::StrategyKind;

/// A single named step of the cleaning pipeline.
pub struct CleaningRule {
    pub name: &'static str,
    pub apply: fn(&str, StrategyKind) -> String,
}

/// Rules in application order.
pub static CLEANING_RULES: &[CleaningRule] = &[
    CleaningRule {
        name: "replace_control_chars",
        apply: replace_control_chars,
    },
    CleaningRule {
        name: "strip_structural_noise",
        apply: strip_structural_noise,
    },
    CleaningRule {
        name: "normalize_whitespace",
        apply: normalize_whitespace,
    },
    CleaningRule {
        name: "drop_noise_lines",
        apply: drop_noise_lines,
    },
    CleaningRule {
        name: "trim",
        apply: trim,
    },
];

pub fn clean_text(raw: &str, source: StrategyKind) -> String {
    CLEANING_RULES.iter().fold(raw.to_string(), |text, rule| {
        let cleaned = (rule.apply)(&text, source);
        trace!(rule = rule.name, before = text.len(), after = cleaned.len(), "cleaning rule applied");
        cleaned
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Rule 1: control characters
// ────────────────────────────────────────────────────────────────────────────

fn replace_control_chars(text: &str, _: StrategyKind) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => c,
            c if is_unprintable(c) => ' ',
            c => c,
        })
        .collect()
}

fn is_unprintable(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{FFFD}'
                | '\u{FEFF}'
                | '\u{200B}'..='\u{200F}'
                | '\u{2028}'
                | '\u{2029}'
                | '\u{E000}'..='\u{F8FF}'
        )
}

// ────────────────────────────────────────────────────────────────────────────
// Rule 2: structural noise leaked by the PDF, XML and RTF extractors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoiseSource {
    Pdf,
    Xml,
    Rtf,
}

static PDF_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // object headers and indirect references: "12 0 obj", "5 0 R"
        r"\b\d+\s+\d+\s+(?:obj|R)\b",
        r"\b(?:endobj|endstream|startxref|xref)\b",
        r"%%EOF",
        // dictionaries on a single line
        r"<<[^\n]*?>>",
        // names such as /Font or /Type/Page, only when they start a token
        r"(?m)(?:^|[ \t])(?:/[A-Za-z][A-Za-z0-9_.+-]*)+",
        // text operators
        r"\b(?:BT|Tj|TJ|Tf|Td|Tm|Tc|Tw|Tz|Ts)\b",
    ])
});

static XML_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"<\?xml[^>]*\?>",
        r#"\bxmlns(?::[A-Za-z0-9_]+)?\s*=\s*"[^"]*""#,
        r"</?[A-Za-z][A-Za-z0-9_:.-]*(?:\s[^<>]*)?/?>",
    ])
});

static RTF_NOISE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"\\[a-z]{1,32}-?\d*\s?"]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("noise pattern is valid"))
        .collect()
}

impl NoiseSource {
    fn patterns(self) -> &'static [Regex] {
        match self {
            NoiseSource::Pdf => &PDF_NOISE,
            NoiseSource::Xml => &XML_NOISE,
            NoiseSource::Rtf => &RTF_NOISE,
        }
    }
}

/// Syntax each strategy can leak into its output. The byte scavengers see raw
/// file structure of any format.
fn noise_sources(source: StrategyKind) -> &'static [NoiseSource] {
    match source {
        StrategyKind::PdfLayout | StrategyKind::PdfTextLayer | StrategyKind::PdfContentTokens => {
            &[NoiseSource::Pdf]
        }
        StrategyKind::DocxPackage | StrategyKind::DocxMarkup => &[NoiseSource::Xml],
        StrategyKind::Rtf => &[NoiseSource::Rtf],
        StrategyKind::DocBinaryScan | StrategyKind::PrintableRuns => {
            &[NoiseSource::Pdf, NoiseSource::Xml, NoiseSource::Rtf]
        }
        StrategyKind::PlainText | StrategyKind::Ocr => &[],
    }
}

const MAX_NOISE_PASSES: usize = 8;

/// Removing one token can expose another (`Tj/Name` → ` /Name`), so the patterns
/// are re-applied until the text stops changing.
fn strip_structural_noise(text: &str, source: StrategyKind) -> String {
    let patterns: Vec<&Regex> = noise_sources(source)
        .iter()
        .flat_map(|noise| noise.patterns())
        .collect();
    if patterns.is_empty() {
        return text.to_string();
    }

    let mut current = text.to_string();
    for _ in 0..MAX_NOISE_PASSES {
        let next = patterns
            .iter()
            .fold(current.clone(), |acc, re| re.replace_all(&acc, " ").into_owned());
        if next == current {
            break;
        }
        current = next;
    }
    current
}

// ────────────────────────────────────────────────────────────────────────────
// Rule 3: whitespace
// ────────────────────────────────────────────────────────────────────────────

fn is_horizontal_space(c: char) -> bool {
    c != '\n' && c.is_whitespace()
}

fn collapse_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;
    for c in line.chars() {
        if is_horizontal_space(c) {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Collapses horizontal whitespace, trims lines and keeps at most one blank line
/// between paragraphs.
fn normalize_whitespace(text: &str, _: StrategyKind) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    join_with_single_blank_lines(unified.split('\n').map(collapse_line))
}

fn join_with_single_blank_lines(lines: impl Iterator<Item = String>) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Rule 4: noise lines
// ────────────────────────────────────────────────────────────────────────────

/// Lines such as "-----###-----" or a lone bullet glyph. Thresholds are loose on
/// purpose so that short headers ("C++", "SQL", "Skills") survive.
pub fn is_noise_line(line: &str) -> bool {
    let total = line.chars().count();
    if total == 0 {
        return false;
    }
    let alnum = line.chars().filter(|c| c.is_alphanumeric()).count();
    let ratio = alnum as f64 / total as f64;

    match total {
        1..=4 => ratio < 0.25,
        5..=10 => ratio < 0.2,
        _ => ratio < 0.15 && alnum < 3,
    }
}

fn drop_noise_lines(text: &str, _: StrategyKind) -> String {
    join_with_single_blank_lines(
        text.split('\n')
            .filter(|line| !is_noise_line(line))
            .map(str::to_string),
    )
}

fn trim(text: &str, _: StrategyKind) -> String {
    text.trim().to_string()
}
