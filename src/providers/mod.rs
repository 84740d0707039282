use anyhow::{Result, anyhow};

mod libretranslate;
mod openai;
mod retry;

pub use libretranslate::LibreTranslate;
pub use openai::OpenAI;

use crate::translate::{BatchFuture, TranslationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    LibreTranslate,
    OpenAI,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::LibreTranslate => "libretranslate",
            EngineKind::OpenAI => "openai",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "libretranslate" | "libre" => Ok(EngineKind::LibreTranslate),
            "openai" => Ok(EngineKind::OpenAI),
            other => Err(anyhow!(
                "unknown translation engine '{}' (expected libretranslate or openai)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub source_lang: String,
    pub target_lang: String,
    /// LibreTranslate server URL or OpenAI-compatible base URL.
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding the API key; empty means the engine default.
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EngineImpl {
    LibreTranslate(LibreTranslate),
    OpenAI(OpenAI),
}

impl TranslationEngine for EngineImpl {
    fn name(&self) -> &str {
        match self {
            EngineImpl::LibreTranslate(engine) => engine.name(),
            EngineImpl::OpenAI(engine) => engine.name(),
        }
    }

    fn translate_batch<'a>(&'a self, texts: &'a [String]) -> BatchFuture<'a> {
        match self {
            EngineImpl::LibreTranslate(engine) => engine.translate_batch(texts),
            EngineImpl::OpenAI(engine) => engine.translate_batch(texts),
        }
    }
}

pub fn build_engine(config: &EngineConfig) -> Result<EngineImpl> {
    match config.kind {
        EngineKind::LibreTranslate => {
            let key = config.api_key_env.as_deref().and_then(get_env);
            let mut engine = LibreTranslate::new(&config.source_lang, &config.target_lang)
                .with_api_key(key);
            if let Some(endpoint) = &config.endpoint {
                engine = engine.with_endpoint(endpoint);
            }
            Ok(EngineImpl::LibreTranslate(engine))
        }
        EngineKind::OpenAI => {
            let key = resolve_openai_key(config.api_key_env.as_deref())?;
            let mut engine = OpenAI::new(key, &config.source_lang, &config.target_lang);
            if let Some(model) = &config.model {
                engine = engine.with_model(model);
            }
            if let Some(endpoint) = &config.endpoint {
                engine = engine.with_base_url(endpoint);
            }
            Ok(EngineImpl::OpenAI(engine))
        }
    }
}

fn resolve_openai_key(key_env: Option<&str>) -> Result<String> {
    let var = key_env
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("OPENAI_API_KEY");
    get_env(var).ok_or_else(|| anyhow!("API key not found (checked {})", var))
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
