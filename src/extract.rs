use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::backend::{ImageInfo, Raster, SourceDocument};
use crate::document::{DEFAULT_FONT_SIZE, Document, ImageRef, Page, TextBlock};
use crate::ocr::{OcrEngine, OcrError};

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub ocr_language: String,
    /// Magnification used when a whole page has to be OCR'd.
    pub page_ocr_scale: f32,
    /// Font and size recorded on OCR blocks, which have no font information.
    pub ocr_font: String,
    pub ocr_font_size: f32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ocr_language: "eng".to_string(),
            page_ocr_scale: 2.0,
            ocr_font: "Times-Roman".to_string(),
            ocr_font_size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Which source produced a page's blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    TextLayer,
    ImageOcr,
    PageOcr,
}

pub struct Extractor<'a> {
    ocr: &'a dyn OcrEngine,
    config: ExtractConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(ocr: &'a dyn OcrEngine, config: ExtractConfig) -> Self {
        Self { ocr, config }
    }

    pub fn extract(&self, source: &dyn SourceDocument) -> Result<Document> {
        let mut pages = Vec::with_capacity(source.page_count());
        for index in 0..source.page_count() {
            let (page, path) = self
                .extract_page(source, index)
                .with_context(|| format!("failed to extract page {}", index + 1))?;
            info!(
                "page {}: {} block(s) via {:?}",
                page.number,
                page.blocks.len(),
                path
            );
            pages.push(page);
        }
        Ok(Document { pages })
    }

    pub fn extract_page(
        &self,
        source: &dyn SourceDocument,
        index: usize,
    ) -> Result<(Page, ExtractionPath)> {
        let mut page = Page::new(index + 1);
        let images = source.images(index)?;
        page.images = images
            .iter()
            .map(|image| ImageRef {
                id: image.id.clone(),
                bbox: image.bbox,
            })
            .collect();

        let spans = source.text_layer(index)?;
        if spans.iter().any(|span| !span.text.trim().is_empty()) {
            page.blocks = spans
                .into_iter()
                .filter(|span| !span.text.trim().is_empty())
                .map(|span| TextBlock::digital(span.text, span.bbox, span.font, span.size))
                .collect();
            return Ok((page, ExtractionPath::TextLayer));
        }

        if !images.is_empty() {
            for image in &images {
                if let Some(block) = self.ocr_image(source, image)? {
                    page.blocks.push(block);
                }
            }
            return Ok((page, ExtractionPath::ImageOcr));
        }

        let raster = source
            .rasterize(index, self.config.page_ocr_scale)
            .with_context(|| "failed to rasterize page for ocr")?;
        if let Some(text) = self.recognize(&raster, &format!("page {}", index + 1))? {
            page.blocks.push(TextBlock::from_page_ocr(
                text,
                self.config.ocr_font.clone(),
                self.config.ocr_font_size,
            ));
        }
        Ok((page, ExtractionPath::PageOcr))
    }

    fn ocr_image(&self, source: &dyn SourceDocument, image: &ImageInfo) -> Result<Option<TextBlock>> {
        let raster = match source
            .image_bytes(&image.id)
            .and_then(|bytes| Raster::decode(&bytes))
        {
            Ok(raster) => raster,
            Err(err) => {
                warn!("skipping image {}: {:#}", image.id, err);
                return Ok(None);
            }
        };
        let Some(text) = self.recognize(&raster, &format!("image {}", image.id))? else {
            return Ok(None);
        };
        Ok(Some(TextBlock::from_image_ocr(
            text,
            image.bbox,
            self.config.ocr_font.clone(),
            self.config.ocr_font_size,
        )))
    }

    /// `Ok(None)` for recognition failures and empty results; engine
    /// unavailability is returned as an error.
    fn recognize(&self, raster: &Raster, label: &str) -> Result<Option<String>> {
        match self.ocr.recognize(raster, &self.config.ocr_language) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("{}: ocr found no text", label);
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            Err(OcrError::Recognition(reason)) => {
                warn!("{}: ocr failed, skipping ({})", label, reason);
                Ok(None)
            }
            Err(err @ OcrError::Unavailable(_)) => Err(anyhow!(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PageSize, TextSpan};
    use crate::document::{BBox, Origin};
    use std::cell::RefCell;

    struct FakeOcr {
        calls: RefCell<Vec<(u32, u32)>>,
        result: fn() -> Result<String, OcrError>,
    }

    impl FakeOcr {
        fn new(result: fn() -> Result<String, OcrError>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                result,
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, raster: &Raster, _language: &str) -> Result<String, OcrError> {
            self.calls.borrow_mut().push((raster.width(), raster.height()));
            (self.result)()
        }
    }

    #[derive(Default)]
    struct FakePage {
        spans: Vec<TextSpan>,
        images: Vec<(ImageInfo, Option<Vec<u8>>)>,
    }

    struct FakeSource {
        pages: Vec<FakePage>,
    }

    impl SourceDocument for FakeSource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, _index: usize) -> Result<PageSize> {
            Ok(PageSize {
                width: 100.0,
                height: 50.0,
            })
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
                .and_then(|(_, bytes)| bytes.clone())
                .ok_or_else(|| anyhow!("no bytes for {}", id))
        }

        fn rasterize(&self, _index: usize, scale: f32) -> Result<Raster> {
            Ok(Raster::blank(
                (100.0 * scale) as u32,
                (50.0 * scale) as u32,
            ))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        Raster::blank(width, height).to_png().expect("png")
    }

    fn image(id: &str, bytes: Option<Vec<u8>>) -> (ImageInfo, Option<Vec<u8>>) {
        (
            ImageInfo {
                id: id.to_string(),
                bbox: Some(BBox::new(10.0, 10.0, 60.0, 40.0)),
            },
            bytes,
        )
    }

    #[test]
    fn image_decode_failure_skips_only_that_image() {
        let source = FakeSource {
            pages: vec![FakePage {
                spans: Vec::new(),
                images: vec![
                    image("1:0", Some(b"not an image".to_vec())),
                    image("1:1", None),
                    image("1:2", Some(png(8, 4))),
                ],
            }],
        };
        let ocr = FakeOcr::new(|| Ok("  Scanned words \n".to_string()));
        let extractor = Extractor::new(&ocr, ExtractConfig::default());
        let (page, path) = extractor.extract_page(&source, 0).expect("extract");
        assert_eq!(path, ExtractionPath::ImageOcr);
        assert_eq!(ocr.calls.borrow().as_slice(), &[(8, 4)]);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].source_text, "Scanned words");
        assert_eq!(page.blocks[0].origin, Origin::OcrImage);
        assert_eq!(page.blocks[0].bbox, Some(BBox::new(10.0, 10.0, 60.0, 40.0)));
        assert_eq!(page.images.len(), 3);
    }

    #[test]
    fn recognition_failure_is_skipped_but_unavailable_is_fatal() {
        let source = FakeSource {
            pages: vec![FakePage {
                spans: Vec::new(),
                images: vec![image("1:0", Some(png(4, 4)))],
            }],
        };
        let failing = FakeOcr::new(|| Err(OcrError::Recognition("garbled".to_string())));
        let (page, _) = Extractor::new(&failing, ExtractConfig::default())
            .extract_page(&source, 0)
            .expect("extract");
        assert!(page.blocks.is_empty());

        let missing = FakeOcr::new(|| Err(OcrError::Unavailable("no binary".to_string())));
        assert!(
            Extractor::new(&missing, ExtractConfig::default())
                .extract(&source)
                .is_err()
        );
    }

    #[test]
    fn images_without_text_do_not_fall_back_to_page_ocr() {
        let source = FakeSource {
            pages: vec![FakePage {
                spans: Vec::new(),
                images: vec![image("1:0", Some(png(4, 4)))],
            }],
        };
        let ocr = FakeOcr::new(|| Ok("   ".to_string()));
        let (page, path) = Extractor::new(&ocr, ExtractConfig::default())
            .extract_page(&source, 0)
            .expect("extract");
        assert_eq!(path, ExtractionPath::ImageOcr);
        assert!(page.blocks.is_empty());
        assert_eq!(ocr.calls.borrow().len(), 1);
    }

    #[test]
    fn blank_text_spans_are_dropped() {
        let span = |text: &str| TextSpan {
            text: text.to_string(),
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
            font: "Helvetica".to_string(),
            size: 10.0,
        };
        let source = FakeSource {
            pages: vec![FakePage {
                spans: vec![span(" "), span("Title"), span("")],
                images: vec![image("1:0", Some(png(4, 4)))],
            }],
        };
        let ocr = FakeOcr::new(|| Ok("unused".to_string()));
        let (page, path) = Extractor::new(&ocr, ExtractConfig::default())
            .extract_page(&source, 0)
            .expect("extract");
        assert_eq!(path, ExtractionPath::TextLayer);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].source_text, "Title");
        assert!(ocr.calls.borrow().is_empty());
    }
}
