//! RTF text extraction: tokenize, skip destination groups, keep body text.

/// Destinations whose content is never document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "fldinst",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "xmlnstbl",
    "filetbl",
    "revtbl",
];

/// Windows-1252 code points for bytes 0x80-0x9F; the rest of the byte range
/// matches Latin-1. Unassigned slots keep their C1 value.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{8D}', '\u{017D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{9D}', '\u{017E}', '\u{0178}',
];

/// Decodes one byte of ANSI text. RTF from Word and WordPad declares
/// `\ansicpg1252`, and other code pages are rare enough to read the same way.
fn ansi_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RtfToken {
    GroupStart,
    GroupEnd,
    ControlWord { name: String, param: Option<i32> },
    ControlSymbol(char),
    Hex(u8),
    Text(char),
}

struct Tokenizer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn control(&mut self) -> Option<RtfToken> {
        let c = self.chars.next()?;
        if !c.is_ascii_alphabetic() {
            if c == '\'' {
                let hi = self.chars.next()?.to_digit(16);
                let lo = self.chars.next()?.to_digit(16);
                return match (hi, lo) {
                    (Some(hi), Some(lo)) => Some(RtfToken::Hex((hi * 16 + lo) as u8)),
                    _ => Some(RtfToken::ControlSymbol('\'')),
                };
            }
            return Some(RtfToken::ControlSymbol(c));
        }

        let mut name = String::from(c);
        while let Some(&next) = self.chars.peek() {
            if next.is_ascii_alphabetic() && name.len() < 32 {
                name.push(next);
                self.chars.next();
            } else {
                break;
            }
        }

        let mut digits = String::new();
        if self.chars.peek() == Some(&'-') {
            digits.push('-');
            self.chars.next();
        }
        while let Some(&next) = self.chars.peek() {
            if next.is_ascii_digit() && digits.len() < 11 {
                digits.push(next);
                self.chars.next();
            } else {
                break;
            }
        }
        // A single space delimits the control word and is not text.
        if self.chars.peek() == Some(&' ') {
            self.chars.next();
        }

        Some(RtfToken::ControlWord {
            name,
            param: digits.parse().ok(),
        })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = RtfToken;

    fn next(&mut self) -> Option<RtfToken> {
        loop {
            let c = self.chars.next()?;
            return match c {
                '{' => Some(RtfToken::GroupStart),
                '}' => Some(RtfToken::GroupEnd),
                '\\' => self.control(),
                // Raw line breaks in RTF source are formatting, not content.
                '\r' | '\n' => continue,
                c => Some(RtfToken::Text(c)),
            };
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    unicode_skip: usize,
}

/// Extracts body text from an RTF document.
pub fn extract_rtf_text(bytes: &[u8]) -> Result<String, &'static str> {
    // RTF is 7-bit; anything else arrives through \' escapes.
    let source: String = bytes.iter().map(|&b| ansi_char(b)).collect();

    let mut out = String::new();
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState {
        skip: false,
        unicode_skip: 1,
    };
    let mut pending_fallback = 0usize;
    let mut group_just_opened = false;

    for token in Tokenizer::new(&source) {
        let opened = std::mem::replace(&mut group_just_opened, false);
        match token {
            RtfToken::GroupStart => {
                stack.push(state);
                group_just_opened = true;
                pending_fallback = 0;
            }
            RtfToken::GroupEnd => {
                state = stack.pop().unwrap_or(state);
                pending_fallback = 0;
            }
            RtfToken::ControlSymbol('*') if opened || state.skip => {
                state.skip = true;
            }
            RtfToken::ControlWord { ref name, .. }
                if opened && SKIPPED_DESTINATIONS.contains(&name.as_str()) =>
            {
                state.skip = true;
            }
            _ if state.skip => {}
            RtfToken::ControlWord { name, param } => match name.as_str() {
                "par" | "line" | "sect" | "page" => out.push('\n'),
                "tab" | "cell" => out.push('\t'),
                "row" => out.push('\n'),
                "emdash" => out.push('\u{2014}'),
                "endash" => out.push('\u{2013}'),
                "bullet" => out.push('\u{2022}'),
                "lquote" => out.push('\u{2018}'),
                "rquote" => out.push('\u{2019}'),
                "ldblquote" => out.push('\u{201C}'),
                "rdblquote" => out.push('\u{201D}'),
                "uc" => state.unicode_skip = param.unwrap_or(1).max(0) as usize,
                "u" => {
                    if let Some(code) = param {
                        let unit = if code < 0 { code + 65536 } else { code };
                        if let Some(c) = char::from_u32(unit as u32) {
                            out.push(c);
                        }
                        pending_fallback = state.unicode_skip;
                    }
                }
                _ => {}
            },
            RtfToken::ControlSymbol(symbol) => match symbol {
                '\\' | '{' | '}' => push_text(&mut out, symbol, &mut pending_fallback),
                '~' => out.push(' '),
                '_' => out.push('-'),
                _ => {}
            },
            RtfToken::Hex(byte) => push_text(&mut out, ansi_char(byte), &mut pending_fallback),
            RtfToken::Text(c) => push_text(&mut out, c, &mut pending_fallback),
        }
    }

    if out.trim().is_empty() {
        return Err("no text in RTF body");
    }
    Ok(out)
}

/// Characters right after `\uN` are the ANSI fallback and must be dropped.
fn push_text(out: &mut String, c: char, pending_fallback: &mut usize) {
    if *pending_fallback > 0 {
        *pending_fallback -= 1;
        return;
    }
    out.push(c);
}
