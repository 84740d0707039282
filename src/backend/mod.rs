//! Capabilities the pipeline needs from a document-rendering backend.
//!
//! The extraction, reconstruction and debug stages only talk to these traits;
//! `mutool`, `writer` and `fonts` are the concrete implementations used by the
//! binary.

use anyhow::Result;

use crate::document::BBox;

pub mod fonts;
pub mod mutool;
mod raster;
pub(crate) mod stext;
pub mod writer;

pub use fonts::{FontMetrics, SystemFonts};
pub use mutool::MutoolDocument;
pub use raster::Raster;
pub use writer::PdfWriter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// One run of same-font text from a page's text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
    pub font: String,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub id: String,
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse_hex(value: &str) -> Option<Rgb> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|ch| [ch, ch]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
        Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl StandardFont {
    pub fn name(&self) -> &'static str {
        match self {
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FontSource {
    Standard(StandardFont),
    Embedded(FontMetrics),
}

/// A font the canvas can draw with and the resolver can measure.
#[derive(Debug, Clone)]
pub struct FontHandle {
    pub name: String,
    pub source: FontSource,
}

impl FontHandle {
    pub fn standard(font: StandardFont) -> Self {
        Self {
            name: font.name().to_string(),
            source: FontSource::Standard(font),
        }
    }

    pub fn embedded(name: impl Into<String>, metrics: FontMetrics) -> Self {
        Self {
            name: name.into(),
            source: FontSource::Embedded(metrics),
        }
    }
}

impl PartialEq for FontHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontHandle,
    pub size: f32,
    /// Measured width at `size`, used for non-left alignment.
    pub width: f32,
    pub color: Rgb,
}

pub trait SourceDocument {
    fn page_count(&self) -> usize;
    fn page_size(&self, index: usize) -> Result<PageSize>;
    fn text_layer(&self, index: usize) -> Result<Vec<TextSpan>>;
    fn images(&self, index: usize) -> Result<Vec<ImageInfo>>;
    fn image_bytes(&self, id: &str) -> Result<Vec<u8>>;
    fn rasterize(&self, index: usize, scale: f32) -> Result<Raster>;
}

pub trait FontResolver {
    /// `None` when the named font is not available to this backend.
    fn resolve(&self, name: &str) -> Option<FontHandle>;
    fn fallback(&self) -> FontHandle;
    fn measure_text_width(&self, font: &FontHandle, size: f32, text: &str) -> Result<f32>;
}

/// Drawing operations target the page most recently opened with `new_page`.
pub trait PageCanvas {
    fn new_page(&mut self, size: PageSize) -> Result<()>;
    fn paint_background(&mut self, raster: &Raster) -> Result<()>;
    fn draw_filled_rect(&mut self, bbox: BBox, color: Rgb) -> Result<()>;
    fn insert_text_in_box(&mut self, bbox: BBox, run: &TextRun, align: Align) -> Result<()>;
}
