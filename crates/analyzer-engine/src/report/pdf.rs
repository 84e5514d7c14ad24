use anyhow::{anyhow, Result};
use printpdf::{
    image_crate, BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use tracing::warn;

use super::document::{Block, ReportDocument};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;

const IMAGE_SIDE_PT: f32 = 200.0;
const PT_TO_MM: f32 = 25.4 / 72.0;

struct Style {
    size: f32,
    line_mm: f32,
    wrap_chars: usize,
}

const TITLE: Style = Style {
    size: 18.0,
    line_mm: 9.0,
    wrap_chars: 50,
};
const HEADING: Style = Style {
    size: 11.0,
    line_mm: 5.5,
    wrap_chars: 85,
};
const BODY: Style = Style {
    size: 10.0,
    line_mm: 5.0,
    wrap_chars: 95,
};
const MONO: Style = Style {
    size: 8.0,
    line_mm: 3.8,
    wrap_chars: 98,
};

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
}

/// Lays blocks out top-down on A4 pages, starting a new page when the
/// next line or image would cross the bottom margin.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    cursor: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(latin1(title), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fonts = Fonts {
            regular: builtin(&doc, BuiltinFont::Helvetica)?,
            bold: builtin(&doc, BuiltinFont::HelveticaBold)?,
            mono: builtin(&doc, BuiltinFont::Courier)?,
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            fonts,
            cursor: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn ensure_room(&mut self, height: f32) {
        if self.cursor - height >= MARGIN {
            return;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Layer {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn text(&mut self, text: &str, style: &Style, font: FontKind, hard_wrap: bool) {
        for line in text.split('\n') {
            let pieces = if hard_wrap {
                hard_wrap_line(line, style.wrap_chars)
            } else {
                word_wrap_line(line, style.wrap_chars)
            };
            for piece in pieces {
                self.ensure_room(style.line_mm);
                self.cursor -= style.line_mm;
                let font = match font {
                    FontKind::Regular => &self.fonts.regular,
                    FontKind::Bold => &self.fonts.bold,
                    FontKind::Mono => &self.fonts.mono,
                };
                self.layer
                    .use_text(latin1(&piece), style.size, Mm(MARGIN), Mm(self.cursor), font);
            }
        }
    }

    fn image(&mut self, bytes: &[u8]) {
        let decoded = match image_crate::load_from_memory(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "stored image could not be decoded; leaving it out of the report");
                return;
            }
        };
        let (width, height) = (decoded.width().max(1), decoded.height().max(1));
        let side_mm = IMAGE_SIDE_PT * PT_TO_MM;
        self.ensure_room(side_mm);
        self.cursor -= side_mm;
        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(self.cursor)),
                scale_x: Some(IMAGE_SIDE_PT / width as f32),
                scale_y: Some(IMAGE_SIDE_PT / height as f32),
                dpi: Some(72.0),
                ..Default::default()
            },
        );
    }

    fn space(&mut self, mm: f32) {
        self.cursor -= mm;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|err| anyhow!("failed to serialize PDF report: {err:?}"))
    }
}

#[derive(Clone, Copy)]
enum FontKind {
    Regular,
    Bold,
    Mono,
}

pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>> {
    let mut writer = PageWriter::new(&document.title)?;
    for block in &document.blocks {
        match block {
            Block::Title(text) => {
                writer.text(text, &TITLE, FontKind::Bold, false);
                writer.space(2.0);
            }
            Block::Line(text) => writer.text(text, &BODY, FontKind::Regular, false),
            Block::Heading(text) => {
                writer.space(1.5);
                writer.text(text, &HEADING, FontKind::Bold, false);
            }
            Block::Label(text) => writer.text(text, &BODY, FontKind::Regular, false),
            Block::Image(bytes) => {
                writer.image(bytes);
                writer.space(1.5);
            }
            Block::Prose(text) => writer.text(text.trim_matches('\n'), &BODY, FontKind::Regular, false),
            Block::Preformatted(text) => {
                writer.space(1.0);
                writer.text(text.trim_end_matches('\n'), &MONO, FontKind::Mono, true);
                writer.space(1.0);
            }
            Block::Spacer => writer.space(4.0),
        }
    }
    writer.finish()
}

fn builtin(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|err| anyhow!("failed to load builtin PDF font: {err:?}"))
}

/// Builtin PDF fonts only cover Latin-1; anything else prints as `?`.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\t' => ' ',
            ch if ch.is_control() => ' ',
            ch if (ch as u32) <= 0xFF => ch,
            _ => '?',
        })
        .collect()
}

fn word_wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        for chunk in hard_wrap_line(word, width) {
            let needed = if current.is_empty() {
                chunk.chars().count()
            } else {
                current.chars().count() + 1 + chunk.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&chunk);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn hard_wrap_line(line: &str, width: usize) -> Vec<String> {
    let expanded = line.replace('\t', "    ");
    let chars: Vec<char> = expanded.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
