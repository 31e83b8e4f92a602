//! Content-stream token parser.
//!
//! Does not need a loadable document: it finds `stream ... endstream` bodies in
//! the raw bytes (inflating Flate streams), lexes them into a small token model
//! and collects the operands of the text-showing operators.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::{decode_pdf_string, PdfError};

/// Upper bound on one inflated stream.
const MAX_INFLATED_BYTES: u64 = 16 * 1024 * 1024;
/// How far back from `stream` to look for the stream dictionary.
const DICT_LOOKBACK: usize = 1024;
/// TJ adjustments more negative than this (thousandths of an em) read as a space.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(Vec<u8>),
    Hex(Vec<u8>),
    Number(f32),
    Name(String),
    Operator(String),
    ArrayOpen,
    ArrayClose,
    DictOpen,
    DictClose,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn take_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    /// Reads a `( ... )` literal after the opening parenthesis. Unterminated
    /// literals end at the end of input.
    fn literal(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        while let Some(b) = self.bump() {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => self.escape(&mut out),
                _ => out.push(b),
            }
        }
        out
    }

    fn escape(&mut self, out: &mut Vec<u8>) {
        let Some(b) = self.bump() else { return };
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut code = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            }
            // Backslash-newline is a line continuation.
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
    }

    fn hex(&mut self) -> Vec<u8> {
        let mut digits = Vec::new();
        while let Some(b) = self.bump() {
            if b == b'>' {
                break;
            }
            if let Some(d) = (b as char).to_digit(16) {
                digits.push(d as u8);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        digits.chunks(2).map(|pair| pair[0] * 16 + pair[1]).collect()
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let b = self.peek()?;
            match b {
                _ if is_whitespace(b) => self.pos += 1,
                b'%' => {
                    while self.peek().is_some_and(|c| c != b'\n' && c != b'\r') {
                        self.pos += 1;
                    }
                }
                b'(' => {
                    self.pos += 1;
                    return Some(Token::Literal(self.literal()));
                }
                b'<' => {
                    self.pos += 1;
                    if self.peek() == Some(b'<') {
                        self.pos += 1;
                        return Some(Token::DictOpen);
                    }
                    return Some(Token::Hex(self.hex()));
                }
                b'>' => {
                    self.pos += 1;
                    if self.peek() == Some(b'>') {
                        self.pos += 1;
                        return Some(Token::DictClose);
                    }
                }
                b'[' => {
                    self.pos += 1;
                    return Some(Token::ArrayOpen);
                }
                b']' => {
                    self.pos += 1;
                    return Some(Token::ArrayClose);
                }
                b'/' => {
                    self.pos += 1;
                    let name = self.take_regular();
                    return Some(Token::Name(String::from_utf8_lossy(name).into_owned()));
                }
                b'{' | b'}' | b')' => self.pos += 1,
                _ => {
                    let word = self.take_regular();
                    let is_numeric = word
                        .iter()
                        .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+'));
                    if is_numeric {
                        if let Some(n) = std::str::from_utf8(word).ok().and_then(|s| s.parse().ok()) {
                            return Some(Token::Number(n));
                        }
                        continue;
                    }
                    return Some(Token::Operator(String::from_utf8_lossy(word).into_owned()));
                }
            }
        }
    }
}

/// Interprets a token stream and returns the text shown by `Tj`, `TJ`, `'` and `"`.
pub fn collect_text(tokens: impl Iterator<Item = Token>) -> String {
    let mut out = String::new();
    let mut operands: Vec<Token> = Vec::new();

    for token in tokens {
        let Token::Operator(op) = token else {
            operands.push(token);
            continue;
        };

        match op.as_str() {
            "Tj" | "'" | "\"" => {
                if op != "Tj" {
                    new_line(&mut out);
                }
                if let Some(text) = operands.iter().rev().find_map(string_operand) {
                    out.push_str(&text);
                }
            }
            "TJ" => {
                let start = operands
                    .iter()
                    .rposition(|t| *t == Token::ArrayOpen)
                    .map_or(0, |i| i + 1);
                for item in &operands[start..] {
                    match item {
                        Token::Number(n) if *n < TJ_SPACE_THRESHOLD => push_space(&mut out),
                        other => {
                            if let Some(text) = string_operand(other) {
                                out.push_str(&text);
                            }
                        }
                    }
                }
            }
            "Td" | "TD" => {
                let ty = operands.iter().rev().find_map(|t| match t {
                    Token::Number(n) => Some(*n),
                    _ => None,
                });
                if ty.is_some_and(|ty| ty.abs() < 0.01) {
                    push_space(&mut out);
                } else {
                    new_line(&mut out);
                }
            }
            "T*" | "Tm" | "ET" => new_line(&mut out),
            _ => {}
        }
        operands.clear();
    }

    out
}

fn string_operand(token: &Token) -> Option<String> {
    match token {
        Token::Literal(bytes) | Token::Hex(bytes) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

fn new_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Stream bodies found in a raw file, inflated where needed. Image streams and
/// streams with filters other than Flate are skipped.
pub fn stream_bodies(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut bodies = Vec::new();
    let mut cursor = 0usize;

    while let Some(keyword) = find(bytes, b"stream", cursor) {
        let after = keyword + b"stream".len();
        cursor = after;

        // "endstream" also contains "stream".
        if keyword >= 3 && &bytes[keyword - 3..keyword] == b"end" {
            continue;
        }

        let mut start = after;
        if bytes.get(start) == Some(&b'\r') {
            start += 1;
        }
        if bytes.get(start) == Some(&b'\n') {
            start += 1;
        }
        let Some(end) = find(bytes, b"endstream", start) else {
            break;
        };
        cursor = end + b"endstream".len();

        let dict_start = keyword.saturating_sub(DICT_LOOKBACK);
        let window = &bytes[dict_start..keyword];
        let dict = rfind(window, b"obj").map_or(window, |i| &window[i..]);
        let body = &bytes[start..end];

        if find(dict, b"/Image", 0).is_some() {
            continue;
        }
        if find(dict, b"/FlateDecode", 0).is_some() || find(dict, b"/Fl ", 0).is_some() {
            if let Some(inflated) = inflate(body) {
                bodies.push(inflated);
            }
        } else if find(dict, b"/Filter", 0).is_none() {
            bodies.push(body.to_vec());
        }
    }

    bodies
}

/// Inflates a zlib stream, keeping whatever decoded before a corruption.
fn inflate(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let _ = ZlibDecoder::new(body)
        .take(MAX_INFLATED_BYTES)
        .read_to_end(&mut out);
    (!out.is_empty()).then_some(out)
}

pub fn extract_content_tokens(bytes: &[u8]) -> Result<String, PdfError> {
    let text = if find(bytes, b"stream", 0).is_none() {
        collect_text(Lexer::new(bytes))
    } else {
        let bodies = stream_bodies(bytes);
        bodies
            .iter()
            .map(|body| collect_text(Lexer::new(body)))
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    };

    if text.trim().is_empty() {
        return Err(PdfError::NoText);
    }
    Ok(text)
}
