//! Positional text reconstruction over the lopdf object model.
//!
//! Page content streams are decoded into operations and replayed against a
//! minimal graphics/text state. Every shown string becomes a [`TextFragment`]
//! with a device position; fragments are then grouped into lines by baseline and
//! ordered left to right. Glyph widths are not read from font programs: an
//! average advance of half an em is assumed, which is enough to tell word gaps
//! from kerning.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};

use super::{decode_pdf_string, PdfError};

/// Average glyph advance, in text-space units per point of font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
    pub text: String,
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: IDENTITY,
            tlm: IDENTITY,
            leading: 0.0,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
        }
    }
}

/// Replays one page's operations.
#[derive(Default)]
struct PageInterpreter {
    ctm: Option<Matrix>,
    ctm_stack: Vec<Matrix>,
    text: TextState,
    fragments: Vec<TextFragment>,
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|o| o.as_float().ok())
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    let mut m = IDENTITY;
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = number(operands, i)?;
    }
    Some(m)
}

impl PageInterpreter {
    fn ctm(&self) -> Matrix {
        self.ctm.unwrap_or(IDENTITY)
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.tlm = multiply(&translation(tx, ty), &self.text.tlm);
        self.text.tm = self.text.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.text.leading);
    }

    fn advance(&mut self, tx: f32) {
        self.text.tm = multiply(&translation(tx, 0.0), &self.text.tm);
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = decode_pdf_string(bytes);
        if text.is_empty() {
            return;
        }

        let state = &self.text;
        let advance: f32 = text
            .chars()
            .map(|c| {
                let mut w = AVG_GLYPH_WIDTH * state.font_size + state.char_spacing;
                if c == ' ' {
                    w += state.word_spacing;
                }
                w * state.horizontal_scale
            })
            .sum();

        let trm = multiply(&state.tm, &self.ctm());
        let x_scale = trm[0].hypot(trm[1]);
        let y_scale = trm[2].hypot(trm[3]);
        self.fragments.push(TextFragment {
            x: trm[4],
            y: trm[5],
            width: advance * x_scale,
            size: state.font_size * y_scale,
            text,
        });
        self.advance(advance);
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm()),
            "Q" => self.ctm = self.ctm_stack.pop().or(self.ctm),
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.ctm = Some(multiply(&m, &self.ctm()));
                }
            }
            "BT" => {
                self.text.tm = IDENTITY;
                self.text.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = number(operands, 1) {
                    self.text.font_size = size.abs();
                }
            }
            "Tc" => self.text.char_spacing = number(operands, 0).unwrap_or(0.0),
            "Tw" => self.text.word_spacing = number(operands, 0).unwrap_or(0.0),
            "Tz" => self.text.horizontal_scale = number(operands, 0).unwrap_or(100.0) / 100.0,
            "TL" => self.text.leading = number(operands, 0).unwrap_or(0.0),
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    if op.operator == "TD" {
                        self.text.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.text.tm = m;
                    self.text.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let Some(aw) = number(operands, 0) {
                    self.text.word_spacing = aw;
                }
                if let Some(ac) = number(operands, 1) {
                    self.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = operands.first() else {
                    return;
                };
                for item in items {
                    match item {
                        Object::String(bytes, _) => self.show(bytes),
                        other => {
                            if let Ok(adjust) = other.as_float() {
                                let tx = -adjust / 1000.0
                                    * self.text.font_size
                                    * self.text.horizontal_scale;
                                self.advance(tx);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Fragments for one page, in content-stream order.
pub fn page_fragments(content: &Content) -> Vec<TextFragment> {
    let mut interpreter = PageInterpreter::default();
    for op in &content.operations {
        interpreter.apply(op);
    }
    interpreter.fragments
}

/// Groups fragments into lines by baseline (top to bottom) and joins each line
/// left to right, inserting a space where the horizontal gap looks like a word
/// break. Large vertical gaps become blank lines.
pub fn assemble_lines(mut fragments: Vec<TextFragment>) -> String {
    fragments.retain(|f| !f.text.trim().is_empty());
    if fragments.is_empty() {
        return String::new();
    }
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<TextFragment>> = Vec::new();
    for fragment in fragments {
        let tolerance = (fragment.size * 0.3).max(3.0);
        match lines.last_mut() {
            Some(line) if (line[0].y - fragment.y).abs() <= tolerance => line.push(fragment),
            _ => lines.push(vec![fragment]),
        }
    }

    let mut out = String::new();
    let mut previous: Option<(f32, f32)> = None;
    for mut line in lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));
        let y = line[0].y;
        let size = line.iter().map(|f| f.size).fold(0.0_f32, f32::max);

        if let Some((prev_y, prev_size)) = previous {
            out.push('\n');
            if prev_y - y > 2.0 * prev_size.max(size) {
                out.push('\n');
            }
        }
        previous = Some((y, size));

        let mut end_x: Option<f32> = None;
        for fragment in &line {
            if let Some(end) = end_x {
                let gap = fragment.x - end;
                let word_break = gap > (fragment.size * 0.25).max(1.0);
                if word_break && !out.ends_with(' ') && !fragment.text.starts_with(' ') {
                    out.push(' ');
                }
            }
            out.push_str(&fragment.text);
            end_x = Some(fragment.x + fragment.width);
        }
    }
    out
}

/// Checked on the raw bytes as well: lopdf can decrypt or drop the trailer
/// entry while loading.
fn declares_encryption(bytes: &[u8]) -> bool {
    const KEY: &[u8] = b"/Encrypt";
    bytes.windows(KEY.len()).enumerate().any(|(i, window)| {
        window == KEY
            && bytes
                .get(i + KEY.len())
                .map_or(true, |b| !b.is_ascii_alphanumeric())
    })
}

pub fn extract_layout_text(bytes: &[u8]) -> Result<String, PdfError> {
    if declares_encryption(bytes) {
        return Err(PdfError::Encrypted);
    }
    let doc = Document::load_mem(bytes)?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(PdfError::Encrypted);
    }

    let mut pages = Vec::new();
    for (number, page_id) in doc.get_pages() {
        let content = match doc
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data))
        {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(page = number, error = %e, "skipping undecodable page");
                continue;
            }
        };
        let text = assemble_lines(page_fragments(&content));
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    if pages.is_empty() {
        return Err(PdfError::NoText);
    }
    Ok(pages.join("\n\n"))
}
