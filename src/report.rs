use std::fmt;

use crate::document::{Document, Origin, ValidationReport};
use crate::reconstruct::ReconstructReport;
use crate::translate::BatchStats;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginCounts {
    pub digital: usize,
    pub ocr_image: usize,
    pub ocr_page: usize,
}

impl OriginCounts {
    pub fn of(document: &Document) -> Self {
        let mut counts = Self::default();
        for block in document.blocks() {
            match block.origin {
                Origin::Digital => counts.digital += 1,
                Origin::OcrImage => counts.ocr_image += 1,
                Origin::OcrPage => counts.ocr_page += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.digital + self.ocr_image + self.ocr_page
    }
}

/// What a command did, printed as the command's output.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub pages: usize,
    pub blocks: OriginCounts,
    pub translation: Option<BatchStats>,
    pub validation: Option<ValidationReport>,
    pub reconstruction: Option<ReconstructReport>,
    pub outputs: Vec<String>,
}

impl RunReport {
    pub fn for_document(document: &Document) -> Self {
        Self {
            pages: document.pages.len(),
            blocks: OriginCounts::of(document),
            ..Self::default()
        }
    }

    /// `false` when validation found blocks without a translation.
    pub fn is_success(&self) -> bool {
        self.validation
            .as_ref()
            .map(ValidationReport::is_complete)
            .unwrap_or(true)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pages: {}", self.pages)?;
        write!(
            f,
            "blocks: {} (digital {}, ocr image {}, ocr page {})",
            self.blocks.total(),
            self.blocks.digital,
            self.blocks.ocr_image,
            self.blocks.ocr_page
        )?;
        if let Some(stats) = &self.translation {
            write!(
                f,
                "\ntranslated: {} in {} batch(es), passed through: {}, already translated: {}",
                stats.translated, stats.batches, stats.passed_through, stats.already_translated
            )?;
        }
        if let Some(validation) = &self.validation {
            write!(
                f,
                "\nmissing translations: {} of {}",
                validation.missing.len(),
                validation.total
            )?;
            for missing in &validation.missing {
                write!(f, "\n  page {}: {}", missing.page, missing.text)?;
            }
        }
        if let Some(reconstruction) = &self.reconstruction {
            write!(
                f,
                "\noverlays: {} placed, {} skipped, {} at minimum size",
                reconstruction.placed(),
                reconstruction.skipped(),
                reconstruction.at_floor()
            )?;
        }
        for output in &self.outputs {
            write!(f, "\nwrote {}", output)?;
        }
        Ok(())
    }
}
