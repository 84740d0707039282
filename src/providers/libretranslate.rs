use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use super::retry::send_with_retry;
use crate::translate::{BatchFuture, TranslationEngine};

pub(crate) const DEFAULT_ENDPOINT: &str = "http://localhost:5000";

/// Client for a LibreTranslate server (`POST /translate`).
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    endpoint: String,
    api_key: Option<String>,
    source: String,
    target: String,
    client: reqwest::Client,
}

impl LibreTranslate {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            source: source.into(),
            target: target.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = endpoint.trim().trim_end_matches('/');
        if !endpoint.is_empty() {
            self.endpoint = endpoint.to_string();
        }
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|value| !value.trim().is_empty());
        self
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let mut body = json!({
            "q": texts,
            "source": self.source,
            "target": self.target,
            "format": "text",
        });
        if let Some(key) = &self.api_key {
            body["api_key"] = json!(key);
        }
        body
    }

    async fn call(&self, texts: &[String]) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/translate", self.endpoint);
        let body = self.request_body(texts);
        let text = send_with_retry(
            "LibreTranslate",
            || self.client.post(&url).json(&body),
            extract_error,
        )
        .await?;
        parse_translations(&text)
    }
}

impl TranslationEngine for LibreTranslate {
    fn name(&self) -> &str {
        "libretranslate"
    }

    fn translate_batch<'a>(&'a self, texts: &'a [String]) -> BatchFuture<'a> {
        Box::pin(self.call(texts))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranslatedText {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: TranslatedText,
}

fn parse_translations(body: &str) -> Result<Vec<String>> {
    let payload: TranslateResponse = serde_json::from_str(body)
        .with_context(|| "failed to parse LibreTranslate response JSON")?;
    Ok(match payload.translated_text {
        TranslatedText::Many(values) => values,
        TranslatedText::One(value) => vec![value],
    })
}

fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .filter(|message| !message.trim().is_empty())
        .or_else(|| Some("unknown error".to_string()))
}
