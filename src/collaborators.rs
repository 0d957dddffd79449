//! Optional collaborator interfaces for the detail view.
//!
//! Translation and speech synthesis are independently failable side
//! services: a failure falls back (original text, no audio) and never
//! aborts a search or a corpus build. Neither is ever invoked during
//! indexing — only lazily for the single record under detail view.

use anyhow::anyhow;
use serde_json::Value;
use url::Url;

/// Translates text into the configured display language.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> anyhow::Result<String>;

    fn name(&self) -> &'static str;
}

/// Synthesizes narration audio for a record's abstract.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> anyhow::Result<AudioClip>;

    fn name(&self) -> &'static str;
}

/// Raw audio returned by a speech synthesizer.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Translator backed by a LibreTranslate-compatible HTTP endpoint.
pub struct HttpTranslator {
    endpoint: Url,
    target_lang: String,
    client: reqwest::blocking::Client,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, target_lang: &str) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| anyhow!("invalid translation endpoint '{}': {}", endpoint, e))?;

        Ok(Self {
            endpoint,
            target_lang: target_lang.to_string(),
            client: reqwest::blocking::Client::new(),
        })
    }

    fn extract_translated_text(resp: &Value) -> Option<String> {
        resp.get("translatedText")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({
                "q": text,
                "source": "auto",
                "target": self.target_lang,
                "format": "text",
            }))
            .send()?
            .error_for_status()?
            .json::<Value>()?;

        Self::extract_translated_text(&resp)
            .ok_or_else(|| anyhow!("translation response missing translatedText"))
    }

    fn name(&self) -> &'static str {
        "LibreTranslate"
    }
}

/// Run the translator if one is configured; any failure falls back to the
/// original text (returns None) with a warning rather than propagating.
pub fn translate_or_fallback(translator: Option<&dyn Translator>, text: &str) -> Option<String> {
    let translator = translator?;

    match translator.translate(text) {
        Ok(translated) => Some(translated),
        Err(err) => {
            log::warn!(
                "{} translation failed, falling back to original text: {}",
                translator.name(),
                err
            );
            None
        }
    }
}
