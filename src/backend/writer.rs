use anyhow::{Context, Result, anyhow};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use std::collections::HashMap;
use std::io::{BufWriter, Cursor};

use super::{Align, FontHandle, FontSource, PageCanvas, PageSize, Raster, Rgb, StandardFont, TextRun};
use crate::document::BBox;

/// Share of the font size above the baseline.
const ASCENT_RATIO: f32 = 0.8;

struct CurrentPage {
    layer: PdfLayerReference,
    size: PageSize,
}

/// `PageCanvas` that builds a PDF with printpdf.
pub struct PdfWriter {
    doc: PdfDocumentReference,
    page: Option<CurrentPage>,
    page_count: usize,
    fonts: HashMap<String, IndirectFontRef>,
}

impl PdfWriter {
    pub fn new(title: &str) -> Self {
        Self {
            doc: PdfDocument::empty(title),
            page: None,
            page_count: 0,
            fonts: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        if self.page_count == 0 {
            return Err(anyhow!("no pages to write"));
        }
        let mut buffer = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buffer);
            self.doc
                .save(&mut writer)
                .with_context(|| "failed to write pdf")?;
        }
        Ok(buffer)
    }

    fn current(&self) -> Result<&CurrentPage> {
        self.page
            .as_ref()
            .ok_or_else(|| anyhow!("no page has been started"))
    }

    fn font_ref(&mut self, font: &FontHandle) -> Result<IndirectFontRef> {
        if let Some(existing) = self.fonts.get(&font.name) {
            return Ok(existing.clone());
        }
        let reference = match &font.source {
            FontSource::Standard(standard) => self
                .doc
                .add_builtin_font(builtin_font(*standard))
                .with_context(|| format!("failed to add font {}", font.name))?,
            FontSource::Embedded(metrics) => self
                .doc
                .add_external_font(Cursor::new(metrics.data().to_vec()))
                .with_context(|| format!("failed to embed font {}", font.name))?,
        };
        self.fonts.insert(font.name.clone(), reference.clone());
        Ok(reference)
    }
}

impl PageCanvas for PdfWriter {
    fn new_page(&mut self, size: PageSize) -> Result<()> {
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(anyhow!(
                "invalid page size {}x{}",
                size.width,
                size.height
            ));
        }
        self.page_count += 1;
        let (page, layer) = self.doc.add_page(
            pt_to_mm(size.width),
            pt_to_mm(size.height),
            format!("Layer {}", self.page_count),
        );
        let layer = self.doc.get_page(page).get_layer(layer);
        self.page = Some(CurrentPage { layer, size });
        Ok(())
    }

    fn paint_background(&mut self, raster: &Raster) -> Result<()> {
        let current = self.current()?;
        if raster.width() == 0 || raster.height() == 0 {
            return Err(anyhow!("background raster is empty"));
        }
        // printpdf bundles its own image crate version, so hand it encoded pixels.
        let rgb = image::DynamicImage::ImageRgb8(raster.image().to_rgb8());
        let png = Raster::new(rgb).to_png()?;
        let decoded = printpdf::image_crate::load_from_memory(&png)
            .with_context(|| "failed to decode background for pdf")?;
        let dpi = raster.width() as f32 * 72.0 / current.size.width;
        let image = Image::from_dynamic_image(&decoded);
        image.add_to_layer(
            current.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(0.0)),
                rotate: None,
                scale_x: Some(1.0),
                scale_y: Some(current.size.height * dpi / 72.0 / raster.height() as f32),
                dpi: Some(dpi),
            },
        );
        Ok(())
    }

    fn draw_filled_rect(&mut self, bbox: BBox, color: Rgb) -> Result<()> {
        let current = self.current()?;
        let height = current.size.height;
        current.layer.set_fill_color(pdf_color(color));
        let rect = printpdf::Rect::new(
            pt_to_mm(bbox.x0),
            pt_to_mm(height - bbox.y1),
            pt_to_mm(bbox.x1),
            pt_to_mm(height - bbox.y0),
        )
        .with_mode(PaintMode::Fill);
        current.layer.add_rect(rect);
        Ok(())
    }

    fn insert_text_in_box(&mut self, bbox: BBox, run: &TextRun, align: Align) -> Result<()> {
        let font = self.font_ref(&run.font)?;
        let current = self.current()?;
        let x = match align {
            Align::Left => bbox.x0,
            Align::Center => bbox.x0 + (bbox.width() - run.width) / 2.0,
            Align::Right => bbox.x1 - run.width,
        };
        let baseline = bbox.y0 + run.size * ASCENT_RATIO;
        current.layer.set_fill_color(pdf_color(run.color));
        current.layer.use_text(
            run.text.as_str(),
            run.size,
            pt_to_mm(x),
            pt_to_mm(current.size.height - baseline),
            &font,
        );
        Ok(())
    }
}

fn pt_to_mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn pdf_color(color: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        color.r as f32 / 255.0,
        color.g as f32 / 255.0,
        color.b as f32 / 255.0,
        None,
    ))
}

fn builtin_font(font: StandardFont) -> BuiltinFont {
    match font {
        StandardFont::TimesRoman => BuiltinFont::TimesRoman,
        StandardFont::TimesBold => BuiltinFont::TimesBold,
        StandardFont::TimesItalic => BuiltinFont::TimesItalic,
        StandardFont::TimesBoldItalic => BuiltinFont::TimesBoldItalic,
        StandardFont::Helvetica => BuiltinFont::Helvetica,
        StandardFont::HelveticaBold => BuiltinFont::HelveticaBold,
        StandardFont::HelveticaOblique => BuiltinFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique => BuiltinFont::HelveticaBoldOblique,
        StandardFont::Courier => BuiltinFont::Courier,
        StandardFont::CourierBold => BuiltinFont::CourierBold,
        StandardFont::CourierOblique => BuiltinFont::CourierOblique,
        StandardFont::CourierBoldOblique => BuiltinFont::CourierBoldOblique,
        StandardFont::Symbol => BuiltinFont::Symbol,
        StandardFont::ZapfDingbats => BuiltinFont::ZapfDingbats,
    }
}
