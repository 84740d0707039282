use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

use crate::document::BBox;

/// Decoded bitmap of a page or an embedded image.
#[derive(Debug, Clone)]
pub struct Raster {
    image: DynamicImage,
}

impl Raster {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        let buffer = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        Self::new(DynamicImage::ImageRgb8(buffer))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).with_context(|| "failed to decode raster image")?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .with_context(|| "failed to encode raster as png")?;
        Ok(bytes)
    }

    /// Crops the pixel region covered by `bbox`, expressed in the raster's
    /// own pixel space. The region is clamped to the raster bounds.
    pub fn crop(&self, bbox: &BBox) -> Result<Raster> {
        let (width, height) = self.image.dimensions();
        let x0 = (bbox.x0.max(0.0).floor() as u32).min(width);
        let y0 = (bbox.y0.max(0.0).floor() as u32).min(height);
        let x1 = (bbox.x1.max(0.0).ceil() as u32).min(width);
        let y1 = (bbox.y1.max(0.0).ceil() as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return Err(anyhow!(
                "crop region is outside the raster ({}x{})",
                width,
                height
            ));
        }
        Ok(Raster::new(self.image.crop_imm(x0, y0, x1 - x0, y1 - y0)))
    }
}
