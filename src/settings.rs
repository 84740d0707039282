use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::Rgb;
use crate::extract::ExtractConfig;
use crate::ocr::TesseractConfig;
use crate::providers::{EngineConfig, EngineKind};
use crate::reconstruct::{FitConfig, MIN_FONT_STEP, ReconstructConfig};
use crate::translate::BatchCoordinator;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub max_file_size_mb: u64,
    pub ocr_language: String,
    pub page_ocr_scale: f32,
    pub ocr_font: String,
    pub ocr_font_size: f32,
    pub ocr_preprocess: bool,
    pub ocr_threshold: u8,
    pub engine: String,
    pub batch_size: usize,
    pub endpoint: String,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key_env: Option<String>,
    pub background_scale: f32,
    pub min_font_size: f32,
    pub font_step: f32,
    pub fallback_font: String,
    pub cover_color: String,
    pub text_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            max_file_size_mb: 50,
            ocr_language: "eng".to_string(),
            page_ocr_scale: 2.0,
            ocr_font: "Times-Roman".to_string(),
            ocr_font_size: 12.0,
            ocr_preprocess: true,
            ocr_threshold: 150,
            engine: "libretranslate".to_string(),
            batch_size: 16,
            endpoint: "http://localhost:5000".to_string(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: None,
            background_scale: 2.0,
            min_font_size: 5.0,
            font_step: 0.5,
            fallback_font: "Times-Roman".to_string(),
            cover_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    languages: Option<LanguageSettings>,
    input: Option<InputSettings>,
    extract: Option<ExtractSettings>,
    translate: Option<TranslateSettings>,
    reconstruct: Option<ReconstructSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageSettings {
    source: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InputSettings {
    max_file_size_mb: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractSettings {
    ocr_language: Option<String>,
    page_ocr_scale: Option<f32>,
    ocr_font: Option<String>,
    ocr_font_size: Option<f32>,
    ocr_preprocess: Option<bool>,
    ocr_threshold: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    engine: Option<String>,
    batch_size: Option<usize>,
    endpoint: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReconstructSettings {
    background_scale: Option<f32>,
    min_font_size: Option<f32>,
    font_step: Option<f32>,
    fallback_font: Option<String>,
    cover_color: Option<String>,
    text_color: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings
        .merge_toml(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse built-in settings")?;

    let mut ordered_paths = vec![
        PathBuf::from("pdf-translator.toml"),
        PathBuf::from("pdf-translator.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(languages) = incoming.languages {
            merge_string(&mut self.source_lang, languages.source);
            merge_string(&mut self.target_lang, languages.target);
        }
        if let Some(input) = incoming.input
            && let Some(limit) = input.max_file_size_mb
            && limit > 0
        {
            self.max_file_size_mb = limit;
        }
        if let Some(extract) = incoming.extract {
            merge_string(&mut self.ocr_language, extract.ocr_language);
            merge_positive(&mut self.page_ocr_scale, extract.page_ocr_scale);
            merge_string(&mut self.ocr_font, extract.ocr_font);
            merge_positive(&mut self.ocr_font_size, extract.ocr_font_size);
            if let Some(preprocess) = extract.ocr_preprocess {
                self.ocr_preprocess = preprocess;
            }
            if let Some(threshold) = extract.ocr_threshold {
                self.ocr_threshold = threshold;
            }
        }
        if let Some(translate) = incoming.translate {
            merge_string(&mut self.engine, translate.engine);
            if let Some(size) = translate.batch_size
                && size > 0
            {
                self.batch_size = size;
            }
            merge_string(&mut self.endpoint, translate.endpoint);
            merge_optional(&mut self.base_url, translate.base_url);
            merge_string(&mut self.model, translate.model);
            merge_optional(&mut self.api_key_env, translate.api_key_env);
        }
        if let Some(reconstruct) = incoming.reconstruct {
            merge_positive(&mut self.background_scale, reconstruct.background_scale);
            merge_positive(&mut self.min_font_size, reconstruct.min_font_size);
            merge_positive(&mut self.font_step, reconstruct.font_step);
            merge_string(&mut self.fallback_font, reconstruct.fallback_font);
            merge_string(&mut self.cover_color, reconstruct.cover_color);
            merge_string(&mut self.text_color, reconstruct.text_color);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("translate.batch_size must be at least 1"));
        }
        for (key, value) in [
            ("extract.page_ocr_scale", self.page_ocr_scale),
            ("extract.ocr_font_size", self.ocr_font_size),
            ("reconstruct.background_scale", self.background_scale),
            ("reconstruct.min_font_size", self.min_font_size),
            ("reconstruct.font_step", self.font_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(anyhow!("{} must be a positive number (got {})", key, value));
            }
        }
        if self.font_step < MIN_FONT_STEP {
            return Err(anyhow!(
                "reconstruct.font_step must be at least {} (got {})",
                MIN_FONT_STEP,
                self.font_step
            ));
        }
        parse_color("reconstruct.cover_color", &self.cover_color)?;
        parse_color("reconstruct.text_color", &self.text_color)?;
        EngineKind::parse(&self.engine)?;
        Ok(())
    }

    pub fn extract_config(&self) -> ExtractConfig {
        ExtractConfig {
            ocr_language: self.ocr_language.clone(),
            page_ocr_scale: self.page_ocr_scale,
            ocr_font: self.ocr_font.clone(),
            ocr_font_size: self.ocr_font_size,
        }
    }

    pub fn tesseract_config(&self) -> TesseractConfig {
        TesseractConfig {
            preprocess: self.ocr_preprocess,
            threshold: self.ocr_threshold,
            ..TesseractConfig::default()
        }
    }

    pub fn batch_coordinator(&self) -> BatchCoordinator {
        BatchCoordinator::new(self.batch_size)
    }

    pub fn reconstruct_config(&self) -> Result<ReconstructConfig> {
        Ok(ReconstructConfig {
            background_scale: self.background_scale,
            fit: FitConfig {
                step: self.font_step,
                floor: self.min_font_size,
            },
            cover_color: parse_color("reconstruct.cover_color", &self.cover_color)?,
            text_color: parse_color("reconstruct.text_color", &self.text_color)?,
        })
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        let kind = EngineKind::parse(&self.engine)?;
        let endpoint = match kind {
            EngineKind::LibreTranslate => Some(self.endpoint.clone()),
            EngineKind::OpenAI => self.base_url.clone(),
        };
        Ok(EngineConfig {
            kind,
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            endpoint,
            model: Some(self.model.clone()),
            api_key_env: self.api_key_env.clone(),
        })
    }
}

fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

fn merge_optional(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            *target = Some(value.to_string());
        }
    }
}

fn merge_positive(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value
        && value.is_finite()
        && value > 0.0
    {
        *target = value;
    }
}

fn parse_color(key: &str, value: &str) -> Result<Rgb> {
    Rgb::parse_hex(value)
        .ok_or_else(|| anyhow!("{} must be a #rgb or #rrggbb color (got '{}')", key, value))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pdf-translator-rust"))
        }
    })
}
