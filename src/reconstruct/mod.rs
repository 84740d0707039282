mod fit;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::backend::{Align, FontHandle, FontResolver, PageCanvas, Rgb, SourceDocument, TextRun};
use crate::document::{BBox, DEFAULT_FONT_SIZE, Document, Page, TextBlock};

pub use fit::{
    DEFAULT_FONT_STEP, DEFAULT_MIN_FONT_SIZE, FitConfig, FitOutcome, MAX_FONT_SIZE, MIN_FONT_STEP,
    fit_font_size,
};

#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    /// Raster magnification of the background image.
    pub background_scale: f32,
    pub fit: FitConfig,
    pub cover_color: Rgb,
    pub text_color: Rgb,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            background_scale: 2.0,
            fit: FitConfig::default(),
            cover_color: Rgb::WHITE,
            text_color: Rgb::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    EmptyTranslation,
    NoRegion,
    Measurement(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub block: usize,
    pub bbox: BBox,
    pub font: String,
    pub size: f32,
    pub at_floor: bool,
    pub font_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageReport {
    pub number: usize,
    pub placements: Vec<Placement>,
    pub skipped: Vec<(usize, SkipReason)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructReport {
    pub pages: Vec<PageReport>,
}

impl ReconstructReport {
    pub fn placed(&self) -> usize {
        self.pages.iter().map(|page| page.placements.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.pages.iter().map(|page| page.skipped.len()).sum()
    }

    pub fn at_floor(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.placements.iter())
            .filter(|placement| placement.at_floor)
            .count()
    }
}

struct PlannedOverlay {
    bbox: BBox,
    run: TextRun,
    at_floor: bool,
    font_fallback: bool,
}

/// Rebuilds translated pages on top of rasters of the original pages.
pub struct Reconstructor<'a> {
    fonts: &'a dyn FontResolver,
    config: ReconstructConfig,
}

impl<'a> Reconstructor<'a> {
    pub fn new(fonts: &'a dyn FontResolver, config: ReconstructConfig) -> Self {
        Self { fonts, config }
    }

    pub fn reconstruct(
        &self,
        document: &Document,
        source: &dyn SourceDocument,
        canvas: &mut dyn PageCanvas,
    ) -> Result<ReconstructReport> {
        if document.pages.len() != source.page_count() {
            warn!(
                "snapshot has {} page(s) but the source has {}",
                document.pages.len(),
                source.page_count()
            );
        }
        let mut report = ReconstructReport::default();
        for page in &document.pages {
            let page_report = self
                .reconstruct_page(page, source, canvas)
                .with_context(|| format!("failed to rebuild page {}", page.number))?;
            report.pages.push(page_report);
        }
        info!(
            "rebuilt {} page(s): {} overlay(s) placed, {} skipped, {} at minimum size",
            report.pages.len(),
            report.placed(),
            report.skipped(),
            report.at_floor()
        );
        Ok(report)
    }

    pub fn reconstruct_page(
        &self,
        page: &Page,
        source: &dyn SourceDocument,
        canvas: &mut dyn PageCanvas,
    ) -> Result<PageReport> {
        let index = page
            .number
            .checked_sub(1)
            .filter(|index| *index < source.page_count())
            .ok_or_else(|| {
                anyhow!(
                    "page {} does not exist in the source ({} pages)",
                    page.number,
                    source.page_count()
                )
            })?;

        canvas.new_page(source.page_size(index)?)?;
        let background = source
            .rasterize(index, self.config.background_scale)
            .with_context(|| "failed to rasterize background")?;
        canvas.paint_background(&background)?;

        let mut report = PageReport {
            number: page.number,
            ..PageReport::default()
        };
        for (position, block) in page.blocks.iter().enumerate() {
            let planned = match self.plan_block(block) {
                Ok(planned) => planned,
                Err(reason) => {
                    debug!("page {} block {}: skipped ({:?})", page.number, position, reason);
                    report.skipped.push((position, reason));
                    continue;
                }
            };
            canvas.draw_filled_rect(planned.bbox, self.config.cover_color)?;
            canvas.insert_text_in_box(planned.bbox, &planned.run, Align::Left)?;
            report.placements.push(Placement {
                block: position,
                bbox: planned.bbox,
                font: planned.run.font.name,
                size: planned.run.size,
                at_floor: planned.at_floor,
                font_fallback: planned.font_fallback,
            });
        }
        Ok(report)
    }

    fn plan_block(&self, block: &TextBlock) -> std::result::Result<PlannedOverlay, SkipReason> {
        let text = block
            .translated_text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(SkipReason::EmptyTranslation)?;
        let bbox = block
            .bbox
            .filter(|bbox| !bbox.is_degenerate())
            .ok_or(SkipReason::NoRegion)?;

        let (font, font_fallback) = self.resolve_font(&block.font);
        let initial = if block.size.is_finite() && block.size > 0.0 {
            block.size
        } else {
            DEFAULT_FONT_SIZE
        };
        let measure_error = |err: anyhow::Error| SkipReason::Measurement(format!("{:#}", err));
        let fitted = fit_font_size(bbox.width(), initial, self.config.fit, |size| {
            self.fonts.measure_text_width(&font, size, text)
        })
        .map_err(measure_error)?;
        if !fitted.fits {
            debug!("'{}' overflows its box even at {}pt", text, fitted.size);
        }
        let width = self
            .fonts
            .measure_text_width(&font, fitted.size, text)
            .map_err(measure_error)?;

        Ok(PlannedOverlay {
            bbox,
            run: TextRun {
                text: text.to_string(),
                font,
                size: fitted.size,
                width,
                color: self.config.text_color,
            },
            at_floor: !fitted.fits,
            font_fallback,
        })
    }

    fn resolve_font(&self, name: &str) -> (FontHandle, bool) {
        match self.fonts.resolve(name) {
            Some(font) => (font, false),
            None => {
                let fallback = self.fonts.fallback();
                debug!("font '{}' unavailable, using {}", name, fallback.name);
                (fallback, true)
            }
        }
    }
}
