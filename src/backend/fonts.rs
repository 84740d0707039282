use anyhow::{Context, Result, anyhow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::{FontHandle, FontResolver, FontSource, StandardFont};

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
}

impl fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FontMetrics {
    /// Parses the first face of a font file. Collections are not supported
    /// because the PDF writer can only embed face 0.
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        let face = Face::parse(&data, 0).map_err(|err| anyhow!("failed to parse font: {}", err))?;
        let family = extract_family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        Ok(Self {
            data: Arc::new(data),
            units_per_em,
            space_advance,
            family,
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn measure(&self, text: &str, font_size: f32) -> Result<f32> {
        let face = Face::parse(&self.data, 0)
            .map_err(|err| anyhow!("failed to parse font for measuring: {}", err))?;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        let units = self.units_per_em.max(1) as f32;
        Ok(advance as f32 * (font_size / units))
    }
}

/// Resolves PDF font names to the standard 14 fonts or to installed system
/// fonts, and measures text with their real advance widths.
pub struct SystemFonts {
    db: fontdb::Database,
    fallback: StandardFont,
    families: RefCell<HashMap<String, Option<FontMetrics>>>,
    substitutes: RefCell<HashMap<StandardFont, Option<FontMetrics>>>,
}

impl SystemFonts {
    pub fn load(fallback_font: &str) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("loaded {} system font faces", db.len());
        let fallback = standard_font(fallback_font).unwrap_or_else(|| {
            warn!(
                "fallback font '{}' is not a standard PDF font; using Times-Roman",
                fallback_font
            );
            StandardFont::TimesRoman
        });
        Self::with_database(db, fallback)
    }

    pub fn with_database(db: fontdb::Database, fallback: StandardFont) -> Self {
        Self {
            db,
            fallback,
            families: RefCell::new(HashMap::new()),
            substitutes: RefCell::new(HashMap::new()),
        }
    }

    fn family_metrics(&self, family: &str) -> Option<FontMetrics> {
        if let Some(cached) = self.families.borrow().get(family) {
            return cached.clone();
        }
        let families = [fontdb::Family::Name(family)];
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };
        let metrics = self.load_query(&query);
        self.families
            .borrow_mut()
            .insert(family.to_string(), metrics.clone());
        metrics
    }

    fn substitute_metrics(&self, font: StandardFont) -> Option<FontMetrics> {
        if let Some(cached) = self.substitutes.borrow().get(&font) {
            return cached.clone();
        }
        let (candidates, bold, italic) = substitute_families(font);
        let weight = if bold {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        };
        let style = if italic {
            fontdb::Style::Italic
        } else {
            fontdb::Style::Normal
        };
        let metrics = candidates.iter().find_map(|family| {
            let families = [fontdb::Family::Name(family)];
            let query = fontdb::Query {
                families: &families,
                weight,
                style,
                ..Default::default()
            };
            self.load_query(&query)
        });
        if metrics.is_none() {
            debug!("no metric-compatible substitute for {}", font.name());
        }
        self.substitutes.borrow_mut().insert(font, metrics.clone());
        metrics
    }

    fn load_query(&self, query: &fontdb::Query<'_>) -> Option<FontMetrics> {
        let id = self.db.query(query)?;
        let (data, index) = self
            .db
            .with_face_data(id, |data, index| (data.to_vec(), index))?;
        if index != 0 {
            return None;
        }
        FontMetrics::from_data(data).ok()
    }
}

impl FontResolver for SystemFonts {
    fn resolve(&self, name: &str) -> Option<FontHandle> {
        let clean = strip_subset_prefix(name).trim();
        if clean.is_empty() {
            return None;
        }
        if let Some(font) = standard_font(clean) {
            return Some(FontHandle::standard(font));
        }
        for candidate in family_candidates(clean) {
            if let Some(metrics) = self.family_metrics(&candidate) {
                return Some(FontHandle::embedded(clean, metrics));
            }
        }
        None
    }

    fn fallback(&self) -> FontHandle {
        FontHandle::standard(self.fallback)
    }

    fn measure_text_width(&self, font: &FontHandle, size: f32, text: &str) -> Result<f32> {
        if !size.is_finite() || size <= 0.0 {
            return Err(anyhow!("invalid font size {}", size));
        }
        match &font.source {
            FontSource::Embedded(metrics) => metrics
                .measure(text, size)
                .with_context(|| format!("failed to measure text with {}", font.name)),
            FontSource::Standard(standard) => match self.substitute_metrics(*standard) {
                Some(metrics) => metrics.measure(text, size),
                None => Ok(estimate_text_width_units(text, *standard) * size),
            },
        }
    }
}

/// Maps standard-14 names and their usual aliases, e.g. `Arial,Bold` or
/// `TimesNewRomanPS-ItalicMT`.
pub(crate) fn standard_font(name: &str) -> Option<StandardFont> {
    let lower = name.trim().to_ascii_lowercase().replace(' ', "");
    match lower.as_str() {
        "helv" => return Some(StandardFont::Helvetica),
        "tiro" => return Some(StandardFont::TimesRoman),
        "cour" => return Some(StandardFont::Courier),
        "symb" | "symbol" => return Some(StandardFont::Symbol),
        "zadb" | "zapfdingbats" => return Some(StandardFont::ZapfDingbats),
        _ => {}
    }
    let (family, style) = match lower.find(['-', ',']) {
        Some(idx) => (&lower[..idx], &lower[idx + 1..]),
        None => (lower.as_str(), ""),
    };
    let bold = style.contains("bold");
    let italic = style.contains("italic") || style.contains("oblique");
    let font = match family {
        "helvetica" | "arial" | "arialmt" => match (bold, italic) {
            (false, false) => StandardFont::Helvetica,
            (true, false) => StandardFont::HelveticaBold,
            (false, true) => StandardFont::HelveticaOblique,
            (true, true) => StandardFont::HelveticaBoldOblique,
        },
        "times" | "timesroman" | "timesnewroman" | "timesnewromanps" | "timesnewromanpsmt" => {
            match (bold, italic) {
                (false, false) => StandardFont::TimesRoman,
                (true, false) => StandardFont::TimesBold,
                (false, true) => StandardFont::TimesItalic,
                (true, true) => StandardFont::TimesBoldItalic,
            }
        }
        "courier" | "couriernew" | "couriernewps" | "couriernewpsmt" => match (bold, italic) {
            (false, false) => StandardFont::Courier,
            (true, false) => StandardFont::CourierBold,
            (false, true) => StandardFont::CourierOblique,
            (true, true) => StandardFont::CourierBoldOblique,
        },
        _ => return None,
    };
    Some(font)
}

/// Subset fonts are named `ABCDEF+RealName`.
pub(crate) fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest))
            if prefix.len() == 6 && prefix.chars().all(|ch| ch.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => name,
    }
}

fn family_candidates(name: &str) -> Vec<String> {
    let mut candidates = vec![name.to_string()];
    if let Some(idx) = name.find(['-', ',']) {
        let base = name[..idx].trim();
        if !base.is_empty() {
            candidates.push(base.to_string());
        }
    }
    candidates
}

fn substitute_families(font: StandardFont) -> (&'static [&'static str], bool, bool) {
    const SANS: &[&str] = &["Liberation Sans", "Arimo", "Nimbus Sans", "Arial"];
    const SERIF: &[&str] = &["Liberation Serif", "Tinos", "Nimbus Roman", "Times New Roman"];
    const MONO: &[&str] = &["Liberation Mono", "Cousine", "Nimbus Mono PS", "Courier New"];
    match font {
        StandardFont::Helvetica => (SANS, false, false),
        StandardFont::HelveticaBold => (SANS, true, false),
        StandardFont::HelveticaOblique => (SANS, false, true),
        StandardFont::HelveticaBoldOblique => (SANS, true, true),
        StandardFont::TimesRoman => (SERIF, false, false),
        StandardFont::TimesBold => (SERIF, true, false),
        StandardFont::TimesItalic => (SERIF, false, true),
        StandardFont::TimesBoldItalic => (SERIF, true, true),
        StandardFont::Courier => (MONO, false, false),
        StandardFont::CourierBold => (MONO, true, false),
        StandardFont::CourierOblique => (MONO, false, true),
        StandardFont::CourierBoldOblique => (MONO, true, true),
        StandardFont::Symbol | StandardFont::ZapfDingbats => (&[], false, false),
    }
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.6
    }
}

fn estimate_text_width_units(text: &str, font: StandardFont) -> f32 {
    let monospace = matches!(
        font,
        StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique
    );
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(|ch| {
            if monospace {
                0.6
            } else {
                estimate_char_units_for_width(ch)
            }
        })
        .sum()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
