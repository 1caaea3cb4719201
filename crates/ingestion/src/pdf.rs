//! PDF access: positioned words from the text layer, and page rendering
//!
//! Text comes from lopdf content streams, decoded with each font's encoding.
//! Positions are approximate (glyph widths are not read from font programs)
//! but line membership and vertical placement are what interleaving needs.

use crate::errors::{IngestionError, Result};
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
const AVG_GLYPH_WIDTH: f32 = 0.5;
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Font resource name to encoding name, for one page
pub type FontEncodings<'a> = BTreeMap<Vec<u8>, &'a str>;

/// A word of the text layer, in page points with a top-left origin
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub text: String,
    pub block: u32,
    pub line: u32,
}

/// Source of positioned words
pub trait TextLayer: Send + Sync {
    /// Words of every page; index 0 holds page 1
    fn extract_words(&self, pdf: &Path) -> Result<Vec<Vec<Word>>>;
}

/// Renders pages to RGB images
pub trait PageRasterizer: Send + Sync {
    /// Render 1-based `page_num` at `scale` times 72 dpi
    fn render_page(&self, pdf: &Path, page_num: u32, scale: f32) -> Result<RgbImage>;
}

/// Text layer read from content streams with lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextLayer;

impl TextLayer for LopdfTextLayer {
    fn extract_words(&self, pdf: &Path) -> Result<Vec<Vec<Word>>> {
        let doc = Document::load(pdf).map_err(|e| IngestionError::PdfParseError {
            path: pdf.display().to_string(),
            message: format!("Failed to load PDF: {}", e),
        })?;

        let pages = doc.get_pages();
        debug!(page_count = pages.len(), "Reading text layer");

        let mut all_pages = Vec::with_capacity(pages.len());
        for (page_num, page_id) in pages {
            match page_words(&doc, page_id) {
                Ok(words) => all_pages.push(words),
                Err(e) => {
                    warn!(page = page_num, error = %e, "Failed to read page text, skipping");
                    all_pages.push(Vec::new());
                }
            }
        }

        Ok(all_pages)
    }
}

fn page_words(doc: &Document, page_id: ObjectId) -> Result<Vec<Word>> {
    let content = doc.get_page_content(page_id)?;
    let content = Content::decode(&content)?;
    let encodings: FontEncodings = doc
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect();

    Ok(words_from_operations(
        &content.operations,
        media_box_height(doc, page_id),
        &encodings,
    ))
}

/// Height of the page's MediaBox, following inheritance through `Parent`
fn media_box_height(doc: &Document, page_id: ObjectId) -> f32 {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };

        if let Ok(obj) = dict.get(b"MediaBox") {
            let obj = match obj {
                Object::Reference(r) => doc.get_object(*r).ok(),
                other => Some(other),
            };
            if let Some(Ok(values)) = obj.map(Object::as_array) {
                let coords: Vec<f32> = values.iter().filter_map(|v| v.as_float().ok()).collect();
                if coords.len() == 4 {
                    return (coords[3] - coords[1]).abs();
                }
            }
        }

        depth += 1;
        if depth > 32 {
            break;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    DEFAULT_PAGE_HEIGHT
}

/// Text state tracked while walking a content stream
struct TextCursor {
    page_height: f32,
    font_size: f32,
    scale: f32,
    leading: f32,
    line_x: f32,
    line_y: f32,
    x: f32,
    block: u32,
    line: u32,
}

impl TextCursor {
    fn new(page_height: f32) -> Self {
        Self {
            page_height,
            font_size: 12.0,
            scale: 1.0,
            leading: 0.0,
            line_x: 0.0,
            line_y: 0.0,
            x: 0.0,
            block: 0,
            line: 0,
        }
    }

    fn begin_block(&mut self) {
        self.block += 1;
        self.line = 0;
        self.scale = 1.0;
        self.line_x = 0.0;
        self.line_y = 0.0;
        self.x = 0.0;
    }

    /// Move the line start; a changed baseline starts a new line
    fn move_to(&mut self, x: f32, y: f32) {
        if (y - self.line_y).abs() > 0.5 {
            self.line += 1;
        }
        self.line_x = x;
        self.line_y = y;
        self.x = x;
    }

    fn next_line(&mut self) {
        let leading = if self.leading > 0.0 {
            self.leading
        } else {
            self.font_size
        };
        self.move_to(self.line_x, self.line_y - leading * self.scale);
    }

    fn size(&self) -> f32 {
        self.font_size * self.scale
    }

    fn show(&mut self, text: &str, words: &mut Vec<Word>) {
        let glyph = AVG_GLYPH_WIDTH * self.size();
        let y1 = self.page_height - self.line_y;
        let y0 = y1 - self.size();

        let mut offset = 0usize;
        for token in text.split(' ') {
            let len = token.chars().count();
            let trimmed = token.trim();
            if !trimmed.is_empty() {
                let x0 = self.x + offset as f32 * glyph;
                words.push(Word {
                    x0,
                    y0,
                    x1: x0 + len as f32 * glyph,
                    y1,
                    text: trimmed.to_string(),
                    block: self.block,
                    line: self.line,
                });
            }
            offset += len + 1;
        }

        self.x += text.chars().count() as f32 * glyph;
    }
}

fn operand(op: &Operation, idx: usize) -> Option<f32> {
    op.operands.get(idx).and_then(|o| o.as_float().ok())
}

/// Decode a PDF string with the current font's encoding; control
/// characters become spaces. CID (`Identity-*`) strings are not decodable
/// without the font's CMap and are skipped.
fn decode_string(obj: &Object, encoding: Option<&str>) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if encoding.is_some_and(|e| e.starts_with("Identity")) {
        return None;
    }

    Some(
        Document::decode_text(encoding, bytes)
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect(),
    )
}

/// Walk text operators and emit positioned words.
///
/// `BT` opens a block; `Tm`, `Td`, `TD`, `T*`, `'` and `"` move the line;
/// `Tj`, `TJ`, `'` and `"` show text. `Tf` selects the encoding from
/// `encodings`; an unknown font decodes with lopdf's default.
pub fn words_from_operations(
    operations: &[Operation],
    page_height: f32,
    encodings: &FontEncodings,
) -> Vec<Word> {
    let mut cursor = TextCursor::new(page_height);
    let mut encoding: Option<&str> = None;
    let mut words = Vec::new();

    for op in operations {
        match op.operator.as_str() {
            "BT" => cursor.begin_block(),
            "Tf" => {
                encoding = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
                if let Some(size) = operand(op, 1) {
                    cursor.font_size = size.abs();
                }
            }
            "TL" => {
                if let Some(leading) = operand(op, 0) {
                    cursor.leading = leading;
                }
            }
            "Tm" => {
                if let (Some(a), Some(d), Some(e), Some(f)) =
                    (operand(op, 0), operand(op, 3), operand(op, 4), operand(op, 5))
                {
                    let scale = if d != 0.0 { d.abs() } else { a.abs() };
                    cursor.scale = if scale > 0.0 { scale } else { 1.0 };
                    cursor.move_to(e, f);
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (operand(op, 0), operand(op, 1)) {
                    if op.operator == "TD" {
                        cursor.leading = -ty;
                    }
                    let (x, y) = (
                        cursor.line_x + tx * cursor.scale,
                        cursor.line_y + ty * cursor.scale,
                    );
                    cursor.move_to(x, y);
                }
            }
            "T*" => cursor.next_line(),
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(|o| decode_string(o, encoding)) {
                    cursor.show(&text, &mut words);
                }
            }
            "'" => {
                cursor.next_line();
                if let Some(text) = op.operands.first().and_then(|o| decode_string(o, encoding)) {
                    cursor.show(&text, &mut words);
                }
            }
            "\"" => {
                cursor.next_line();
                if let Some(text) = op.operands.get(2).and_then(|o| decode_string(o, encoding)) {
                    cursor.show(&text, &mut words);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let mut text = String::new();
                    for item in items {
                        if let Some(s) = decode_string(item, encoding) {
                            text.push_str(&s);
                        } else if item.as_float().map(|n| n < TJ_SPACE_THRESHOLD).unwrap_or(false)
                        {
                            text.push(' ');
                        }
                    }
                    cursor.show(&text, &mut words);
                }
            }
            _ => {}
        }
    }

    words
}

/// Rasterizer shelling out to poppler's `pdftoppm`
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
    scratch_dir: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn render_page(&self, pdf: &Path, page_num: u32, scale: f32) -> Result<RgbImage> {
        let dpi = (72.0 * scale).round() as u32;
        let root = self
            .scratch_dir
            .join(format!("reportrag-{}-p{}", std::process::id(), page_num));
        let page = page_num.to_string();

        let output = Command::new(&self.binary)
            .args(["-png", "-singlefile", "-r"])
            .arg(dpi.to_string())
            .args(["-f", page.as_str(), "-l", page.as_str()])
            .arg(pdf)
            .arg(&root)
            .output()
            .map_err(|e| IngestionError::RasterizeError {
                path: pdf.display().to_string(),
                page: page_num,
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(IngestionError::RasterizeError {
                path: pdf.display().to_string(),
                page: page_num,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png_path = root.with_extension("png");
        let image = image::open(&png_path);
        if let Err(e) = std::fs::remove_file(&png_path) {
            debug!(path = %png_path.display(), error = %e, "Failed to remove rendered page");
        }

        Ok(image?.to_rgb8())
    }
}
