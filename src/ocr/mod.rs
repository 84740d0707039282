mod preprocess;
mod tesseract;

use thiserror::Error;

use crate::backend::Raster;

pub use preprocess::binarize_for_ocr;
pub use tesseract::{Tesseract, TesseractConfig, list_tesseract_languages};

#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine cannot run at all; retrying other images will not help.
    #[error("ocr engine unavailable: {0}")]
    Unavailable(String),
    /// This raster could not be recognized.
    #[error("ocr failed: {0}")]
    Recognition(String),
}

/// Converts a raster to text. An empty string means no text was found.
pub trait OcrEngine {
    fn recognize(&self, raster: &Raster, language: &str) -> Result<String, OcrError>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, raster: &Raster, language: &str) -> Result<String, OcrError> {
        (**self).recognize(raster, language)
    }
}
