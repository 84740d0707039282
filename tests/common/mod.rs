#![allow(dead_code)]

use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

use pdf_translator_rust::backend::{
    Align, FontHandle, FontResolver, ImageInfo, PageCanvas, PageSize, Raster, Rgb,
    SourceDocument, StandardFont, TextRun, TextSpan,
};
use pdf_translator_rust::document::BBox;
use pdf_translator_rust::ocr::{OcrEngine, OcrError};
use pdf_translator_rust::translate::{BatchFuture, TranslationEngine};

pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub size: Option<PageSize>,
    pub spans: Vec<TextSpan>,
    pub images: Vec<(ImageInfo, Vec<u8>)>,
}

/// In-memory source that records every rasterize call as `(page, scale)`.
#[derive(Default)]
pub struct FakeSource {
    pub pages: Vec<FakePage>,
    pub rasterized: RefCell<Vec<(usize, f32)>>,
}

impl FakeSource {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            rasterized: RefCell::new(Vec::new()),
        }
    }
}

impl SourceDocument for FakeSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page = self
            .pages
            .get(index)
            .ok_or_else(|| anyhow!("page {} out of range", index))?;
        Ok(page.size.unwrap_or(LETTER))
    }

    fn text_layer(&self, index: usize) -> Result<Vec<TextSpan>> {
        Ok(self.pages[index].spans.clone())
    }

    fn images(&self, index: usize) -> Result<Vec<ImageInfo>> {
        Ok(self.pages[index]
            .images
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    fn image_bytes(&self, id: &str) -> Result<Vec<u8>> {
        self.pages
            .iter()
            .flat_map(|page| page.images.iter())
            .find(|(info, _)| info.id == id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| anyhow!("unknown image {}", id))
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<Raster> {
        self.rasterized.borrow_mut().push((index, scale));
        let size = self.page_size(index)?;
        Ok(Raster::blank(
            (size.width * scale / 4.0) as u32,
            (size.height * scale / 4.0) as u32,
        ))
    }
}

/// OCR spy returning a fixed text.
pub struct SpyOcr {
    pub text: String,
    pub calls: RefCell<Vec<(u32, u32)>>,
}

impl SpyOcr {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl OcrEngine for SpyOcr {
    fn recognize(&self, raster: &Raster, _language: &str) -> Result<String, OcrError> {
        self.calls
            .borrow_mut()
            .push((raster.width(), raster.height()));
        Ok(self.text.clone())
    }
}

/// Translates through a lookup table, or wraps unknown text in brackets.
#[derive(Default)]
pub struct DictionaryEngine {
    pub entries: HashMap<String, String>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl DictionaryEngine {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().expect("lock").len()
    }
}

impl TranslationEngine for DictionaryEngine {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn translate_batch<'a>(&'a self, texts: &'a [String]) -> BatchFuture<'a> {
        Box::pin(async move {
            self.batches.lock().expect("lock").push(texts.to_vec());
            Ok(texts
                .iter()
                .map(|text| {
                    self.entries
                        .get(text)
                        .cloned()
                        .unwrap_or_else(|| format!("[{}]", text))
                })
                .collect())
        })
    }
}

/// Fixed-pitch metrics: every char is half the font size wide.
pub struct FixedPitchFonts;

pub fn fixed_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

impl FontResolver for FixedPitchFonts {
    fn resolve(&self, name: &str) -> Option<FontHandle> {
        match name {
            "Helvetica" => Some(FontHandle::standard(StandardFont::Helvetica)),
            "Courier" => Some(FontHandle::standard(StandardFont::Courier)),
            _ => None,
        }
    }

    fn fallback(&self) -> FontHandle {
        FontHandle::standard(StandardFont::TimesRoman)
    }

    fn measure_text_width(&self, _font: &FontHandle, size: f32, text: &str) -> Result<f32> {
        Ok(fixed_width(text, size))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    NewPage(PageSize),
    Background(u32, u32),
    Rect(BBox, Rgb),
    Text {
        bbox: BBox,
        text: String,
        font: String,
        size: f32,
    },
}

#[derive(Default)]
pub struct RecordingCanvas {
    pub ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    pub fn pages(&self) -> Vec<PageSize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CanvasOp::NewPage(size) => Some(*size),
                _ => None,
            })
            .collect()
    }
}

impl PageCanvas for RecordingCanvas {
    fn new_page(&mut self, size: PageSize) -> Result<()> {
        self.ops.push(CanvasOp::NewPage(size));
        Ok(())
    }

    fn paint_background(&mut self, raster: &Raster) -> Result<()> {
        self.ops
            .push(CanvasOp::Background(raster.width(), raster.height()));
        Ok(())
    }

    fn draw_filled_rect(&mut self, bbox: BBox, color: Rgb) -> Result<()> {
        self.ops.push(CanvasOp::Rect(bbox, color));
        Ok(())
    }

    fn insert_text_in_box(&mut self, bbox: BBox, run: &TextRun, _align: Align) -> Result<()> {
        self.ops.push(CanvasOp::Text {
            bbox,
            text: run.text.clone(),
            font: run.font.name.clone(),
            size: run.size,
        });
        Ok(())
    }
}

pub fn span(text: &str, bbox: BBox, font: &str, size: f32) -> TextSpan {
    TextSpan {
        text: text.to_string(),
        bbox,
        font: font.to_string(),
        size,
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    Raster::blank(width, height).to_png().expect("png")
}
