use anyhow::{Context, Result, anyhow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::preprocess::binarize_for_ocr;
use super::{OcrEngine, OcrError};
use crate::backend::Raster;
use crate::backend::mutool::command_exists;

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub binary: String,
    pub psm: u32,
    pub preprocess: bool,
    pub threshold: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            psm: 3,
            preprocess: true,
            threshold: 150,
        }
    }
}

/// OCR through the `tesseract` command line tool.
pub struct Tesseract {
    config: TesseractConfig,
    languages: RefCell<HashMap<String, String>>,
}

impl Tesseract {
    pub fn new(config: TesseractConfig) -> Self {
        Self {
            config,
            languages: RefCell::new(HashMap::new()),
        }
    }

    fn resolve_languages(&self, requested: &str) -> Result<String, OcrError> {
        if let Some(cached) = self.languages.borrow().get(requested) {
            return Ok(cached.clone());
        }
        let available = list_tesseract_languages(&self.config.binary).ok();
        let chosen = normalize_languages(requested, available.as_deref())
            .map_err(|err| OcrError::Unavailable(err.to_string()))?;
        self.languages
            .borrow_mut()
            .insert(requested.to_string(), chosen.clone());
        Ok(chosen)
    }

    fn run(&self, path: &Path, languages: &str) -> Result<String, OcrError> {
        let output = Command::new(&self.config.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(languages)
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .output()
            .map_err(|err| {
                OcrError::Unavailable(format!("failed to run {}: {}", self.config.binary, err))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl OcrEngine for Tesseract {
    fn recognize(&self, raster: &Raster, language: &str) -> Result<String, OcrError> {
        if !command_exists(&self.config.binary) {
            return Err(OcrError::Unavailable(format!(
                "{} not found (install tesseract-ocr)",
                self.config.binary
            )));
        }
        let languages = self.resolve_languages(language)?;
        let prepared = if self.config.preprocess {
            Raster::new(binarize_for_ocr(raster.image(), self.config.threshold))
        } else {
            raster.clone()
        };
        let png = prepared
            .to_png()
            .map_err(|err| OcrError::Recognition(err.to_string()))?;
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|err| OcrError::Unavailable(format!("failed to create temp file: {}", err)))?;
        tmp.write_all(&png)
            .and_then(|_| tmp.flush())
            .map_err(|err| OcrError::Unavailable(format!("failed to write temp image: {}", err)))?;

        let text = self.run(tmp.path(), &languages)?;
        debug!(
            "tesseract read {} chars from {}x{} raster",
            text.chars().count(),
            raster.width(),
            raster.height()
        );
        Ok(text)
    }
}

pub fn list_tesseract_languages(binary: &str) -> Result<Vec<String>> {
    let output = Command::new(binary)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", binary))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} --list-langs failed: {}", binary, stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps the requested languages the installation provides. With no list to
/// check against the request is passed through unchanged.
fn normalize_languages(requested: &str, available: Option<&[String]>) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr language is empty"));
    }
    let Some(available) = available else {
        return Ok(trimmed.to_string());
    };

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }
    Ok(chosen.join("+"))
}
