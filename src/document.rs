use anyhow::{Context, Result};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Axis-aligned rectangle in page space (points, origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|value| value.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn scaled(&self, factor: f32) -> BBox {
        BBox::new(
            self.x0 * factor,
            self.y0 * factor,
            self.x1 * factor,
            self.y1 * factor,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Digital,
    OcrImage,
    OcrPage,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Digital => "digital",
            Origin::OcrImage => "ocr_image",
            Origin::OcrPage => "ocr_page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "text")]
    pub source_text: String,
    /// `None` is the whole-page sentinel (no usable region).
    #[serde(
        serialize_with = "serialize_bbox",
        deserialize_with = "deserialize_bbox",
        default
    )]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub size: f32,
    #[serde(default)]
    pub origin: Origin,
    #[serde(
        rename = "translated",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    translated_text: Option<String>,
}

impl TextBlock {
    pub fn digital(text: impl Into<String>, bbox: BBox, font: impl Into<String>, size: f32) -> Self {
        Self {
            source_text: text.into(),
            bbox: Some(bbox),
            font: font.into(),
            size,
            origin: Origin::Digital,
            translated_text: None,
        }
    }

    pub fn from_image_ocr(
        text: impl Into<String>,
        bbox: Option<BBox>,
        font: impl Into<String>,
        size: f32,
    ) -> Self {
        Self {
            source_text: text.into(),
            bbox,
            font: font.into(),
            size,
            origin: Origin::OcrImage,
            translated_text: None,
        }
    }

    pub fn from_page_ocr(text: impl Into<String>, font: impl Into<String>, size: f32) -> Self {
        Self {
            source_text: text.into(),
            bbox: None,
            font: font.into(),
            size,
            origin: Origin::OcrPage,
            translated_text: None,
        }
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.translated_text.as_deref()
    }

    pub fn is_translated(&self) -> bool {
        self.translated_text.is_some()
    }

    /// Sets the translation once. Returns `false` and keeps the existing value
    /// when the block was already translated.
    pub fn set_translation(&mut self, text: impl Into<String>) -> bool {
        if self.translated_text.is_some() {
            return false;
        }
        self.translated_text = Some(text.into());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    #[serde(
        serialize_with = "serialize_bbox",
        deserialize_with = "deserialize_bbox",
        default
    )]
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

impl Page {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            blocks: Vec::new(),
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|page| page.blocks.len()).sum()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.pages.iter().flat_map(|page| page.blocks.iter())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "failed to serialize document")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).with_context(|| "failed to parse document snapshot")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write snapshot: {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid snapshot: {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingTranslation {
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total: usize,
    pub missing: Vec<MissingTranslation>,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn validate_translations(document: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();
    for page in &document.pages {
        for block in &page.blocks {
            report.total += 1;
            let ok = block
                .translated_text()
                .map(|text| !text.trim().is_empty())
                .unwrap_or(false);
            if !ok {
                report.missing.push(MissingTranslation {
                    page: page.number,
                    text: block.source_text.clone(),
                });
            }
        }
    }
    report
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn serialize_bbox<S>(bbox: &Option<BBox>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match bbox {
        Some(bbox) => [bbox.x0, bbox.y0, bbox.x1, bbox.y1].serialize(serializer),
        None => Vec::<f32>::new().serialize(serializer),
    }
}

fn deserialize_bbox<'de, D>(deserializer: D) -> Result<Option<BBox>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<f32>> = Option::deserialize(deserializer)?;
    Ok(match values.as_deref() {
        Some([x0, y0, x1, y1]) => Some(BBox::new(*x0, *y0, *x1, *y1)),
        Some([]) | None => None,
        Some(other) => {
            warn!(
                "bbox with {} value(s) instead of 4 is treated as having no region: {:?}",
                other.len(),
                other
            );
            None
        }
    })
}
