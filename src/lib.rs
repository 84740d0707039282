use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod backend;
pub mod classify;
pub mod debug;
pub mod document;
pub mod extract;
pub mod input;
pub mod logging;
pub mod ocr;
pub mod providers;
pub mod reconstruct;
pub mod report;
pub mod settings;
pub mod translate;

pub use document::{BBox, Document, Origin, Page, TextBlock, validate_translations};
pub use extract::{ExtractConfig, Extractor};
pub use reconstruct::{ReconstructConfig, Reconstructor};
pub use report::RunReport;
pub use translate::{BatchCoordinator, TranslationEngine};

use backend::{MutoolDocument, PdfWriter, SourceDocument, SystemFonts};
use ocr::Tesseract;
use settings::Settings;

/// Command line values that take precedence over the settings files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub engine: Option<String>,
    pub batch_size: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(lang) = non_empty(&self.source_lang) {
            settings.source_lang = lang;
        }
        if let Some(lang) = non_empty(&self.target_lang) {
            settings.target_lang = lang;
        }
        if let Some(engine) = non_empty(&self.engine) {
            settings.engine = engine;
        }
        if let Some(size) = self.batch_size {
            settings.batch_size = size;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Extract, translate and rebuild in one run.
    Translate {
        input: PathBuf,
        output: PathBuf,
        temp_json: Option<PathBuf>,
        temp_translated_json: Option<PathBuf>,
        debug_layout: Option<PathBuf>,
    },
    Extract {
        input: PathBuf,
        output: PathBuf,
    },
    TranslateJson {
        input: PathBuf,
        output: PathBuf,
    },
    Build {
        json: PathBuf,
        original: PathBuf,
        output: PathBuf,
    },
    Validate {
        input: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub settings_path: Option<PathBuf>,
    pub overrides: Overrides,
}

pub async fn run(config: Config) -> Result<RunReport> {
    let mut settings = settings::load_settings(config.settings_path.as_deref())?;
    config.overrides.apply(&mut settings);
    settings.validate()?;

    match config.command {
        Command::Translate {
            input,
            output,
            temp_json,
            temp_translated_json,
            debug_layout,
        } => {
            let engine = build_engine(&settings)?;
            let source = open_pdf(&input, &settings)?;
            let mut document = extract_document(&source, &settings)?;
            let mut outputs = Vec::new();
            if let Some(path) = &temp_json {
                save_snapshot(&document, path, &mut outputs)?;
            }

            let stats = translate_snapshot(
                &mut document,
                &engine,
                &settings,
                temp_translated_json.as_deref(),
            )
            .await?;
            if let Some(path) = &temp_translated_json {
                save_snapshot(&document, path, &mut outputs)?;
            }
            let validation = validate_translations(&document);
            if !validation.is_complete() {
                warn!(
                    "{} block(s) have no translation and keep their original text",
                    validation.missing.len()
                );
            }

            if let Some(dir) = &debug_layout {
                let written = debug::write_layout_overlays(
                    &document,
                    &source,
                    debug::DEFAULT_DEBUG_SCALE,
                    dir,
                )?;
                info!("wrote {} debug file(s) to {}", written.len(), dir.display());
                outputs.push(dir.display().to_string());
            }

            let reconstruction = build_pdf(&document, &source, &settings, &output)?;
            outputs.push(output.display().to_string());

            let mut report = RunReport::for_document(&document);
            report.translation = Some(stats);
            report.reconstruction = Some(reconstruction);
            report.outputs = outputs;
            Ok(report)
        }
        Command::Extract { input, output } => {
            let source = open_pdf(&input, &settings)?;
            let document = extract_document(&source, &settings)?;
            let mut report = RunReport::for_document(&document);
            save_snapshot(&document, &output, &mut report.outputs)?;
            Ok(report)
        }
        Command::TranslateJson { input, output } => {
            let engine = build_engine(&settings)?;
            let mut document = Document::load(&input)?;
            let stats =
                translate_snapshot(&mut document, &engine, &settings, Some(&output)).await?;
            let mut report = RunReport::for_document(&document);
            report.translation = Some(stats);
            save_snapshot(&document, &output, &mut report.outputs)?;
            Ok(report)
        }
        Command::Build {
            json,
            original,
            output,
        } => {
            let document = Document::load(&json)?;
            let source = open_pdf(&original, &settings)?;
            let reconstruction = build_pdf(&document, &source, &settings, &output)?;
            let mut report = RunReport::for_document(&document);
            report.reconstruction = Some(reconstruction);
            report.outputs.push(output.display().to_string());
            Ok(report)
        }
        Command::Validate { input } => {
            let document = Document::load(&input)?;
            let mut report = RunReport::for_document(&document);
            report.validation = Some(validate_translations(&document));
            Ok(report)
        }
    }
}

fn open_pdf(path: &Path, settings: &Settings) -> Result<MutoolDocument> {
    let input = input::load_pdf(path, settings.max_file_size_mb)?;
    MutoolDocument::open(&input.path)
}

fn extract_document(source: &dyn SourceDocument, settings: &Settings) -> Result<Document> {
    let tesseract = Tesseract::new(settings.tesseract_config());
    Extractor::new(&tesseract, settings.extract_config())
        .extract(source)
        .with_context(|| "text extraction failed")
}

/// Missing credentials surface here, before any page is opened.
fn build_engine(settings: &Settings) -> Result<providers::EngineImpl> {
    providers::build_engine(&settings.engine_config()?)
        .with_context(|| format!("cannot use translation engine '{}'", settings.engine))
}

/// On failure the blocks translated so far are written to `partial` so that a
/// later `translate-json` run can resume.
async fn translate_snapshot(
    document: &mut Document,
    engine: &providers::EngineImpl,
    settings: &Settings,
    partial: Option<&Path>,
) -> Result<translate::BatchStats> {
    info!(
        "translating {} block(s) {} -> {} with {}",
        document.block_count(),
        settings.source_lang,
        settings.target_lang,
        engine.name()
    );
    match settings
        .batch_coordinator()
        .translate_document(document, engine)
        .await
    {
        Ok(stats) => Ok(stats),
        Err(err) => {
            if let Some(path) = partial {
                match document.save(path) {
                    Ok(()) => warn!("partial translations saved to {}", path.display()),
                    Err(save_err) => warn!("could not save partial translations: {:#}", save_err),
                }
            }
            Err(err)
        }
    }
}

fn build_pdf(
    document: &Document,
    source: &dyn SourceDocument,
    settings: &Settings,
    output: &Path,
) -> Result<reconstruct::ReconstructReport> {
    let fonts = SystemFonts::load(&settings.fallback_font);
    let reconstructor = Reconstructor::new(&fonts, settings.reconstruct_config()?);
    let title = output
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("translated");
    let mut writer = PdfWriter::new(title);
    let report = reconstructor.reconstruct(document, source, &mut writer)?;
    let bytes = writer.finish()?;
    write_output(output, &bytes)?;
    Ok(report)
}

fn save_snapshot(document: &Document, path: &Path, outputs: &mut Vec<String>) -> Result<()> {
    document.save(path)?;
    outputs.push(path.display().to_string());
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    if bytes.is_empty() {
        return Err(anyhow!("refusing to write an empty file to {}", path.display()));
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_settings_values() {
        let mut settings = Settings::default();
        Overrides {
            source_lang: Some("de".to_string()),
            target_lang: Some(" ".to_string()),
            engine: Some("openai".to_string()),
            batch_size: Some(4),
        }
        .apply(&mut settings);
        assert_eq!(settings.source_lang, "de");
        assert_eq!(settings.target_lang, "es");
        assert_eq!(settings.engine, "openai");
        assert_eq!(settings.batch_size, 4);
    }

    #[test]
    fn zero_batch_size_override_fails_validation() {
        let mut settings = Settings::default();
        Overrides {
            batch_size: Some(0),
            ..Overrides::default()
        }
        .apply(&mut settings);
        assert!(settings.validate().is_err());
    }

    #[tokio::test]
    async fn validate_reports_missing_translations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("translated.json");
        let mut page = Page::new(1);
        let mut done =
            TextBlock::digital("Hello", BBox::new(0.0, 0.0, 10.0, 10.0), "Helvetica", 12.0);
        done.set_translation("Hola");
        page.blocks = vec![done, TextBlock::from_page_ocr("Pending", "Times-Roman", 12.0)];
        Document { pages: vec![page] }.save(&path).expect("save");

        let report = run(Config {
            command: Command::Validate { input: path },
            settings_path: None,
            overrides: Overrides::default(),
        })
        .await
        .expect("validate");
        assert!(!report.is_success());
        assert!(report.to_string().contains("page 1: Pending"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_extraction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.toml");
        fs::write(
            &settings_path,
            "[translate]\nengine = \"openai\"\napi_key_env = \"PDF_TRANSLATOR_TEST_UNSET_KEY\"\n",
        )
        .expect("write settings");
        let input = dir.path().join("in.pdf");
        fs::write(&input, b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n")
            .expect("write pdf");
        let temp_json = dir.path().join("extracted.json");
        let output = dir.path().join("out.pdf");

        let err = run(Config {
            command: Command::Translate {
                input,
                output: output.clone(),
                temp_json: Some(temp_json.clone()),
                temp_translated_json: None,
                debug_layout: None,
            },
            settings_path: Some(settings_path),
            overrides: Overrides::default(),
        })
        .await
        .expect_err("missing key");
        assert!(format!("{:#}", err).contains("PDF_TRANSLATOR_TEST_UNSET_KEY"));
        assert!(!temp_json.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_input_pdf_is_an_input_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run(Config {
            command: Command::Extract {
                input: dir.path().join("missing.pdf"),
                output: dir.path().join("out.json"),
            },
            settings_path: None,
            overrides: Overrides::default(),
        })
        .await
        .expect_err("missing input");
        assert!(err.to_string().contains("input file not found"));
    }
}
