use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default embedding model; changing it invalidates the embeddings cache
/// via the model identity hash
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Default number of results per search
const DEFAULT_TOP_K: usize = 5;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
/// Default display language for translated abstracts
const DEFAULT_TARGET_LANG: &str = "es";
/// Default corpus file name, relative to the base path
const DEFAULT_CORPUS_FILE: &str = "patents.csv";

/// Embedding model configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

/// Configuration for the optional abstract-translation collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Enable or disable translation in the detail view
    #[serde(default)]
    pub enabled: bool,

    /// LibreTranslate-compatible endpoint (e.g., "https://libretranslate.com/translate")
    #[serde(default)]
    pub endpoint: String,

    /// Target language code for translated abstracts
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path to the patent corpus CSV; relative paths resolve against the
    /// base path
    #[serde(default = "default_corpus_file")]
    pub corpus_path: String,

    /// Base URL or path for patent drawing lookups
    /// ({image_base_url}/{publication_number}.png)
    #[serde(default)]
    pub image_base_url: Option<String>,

    /// Number of results per search when -k is not given
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_path: DEFAULT_CORPUS_FILE.to_string(),
            image_base_url: None,
            default_top_k: DEFAULT_TOP_K,
            embedding: EmbeddingConfig::default(),
            translation: TranslationConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_target_lang() -> String {
    DEFAULT_TARGET_LANG.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_corpus_file() -> String {
    DEFAULT_CORPUS_FILE.to_string()
}

impl Config {
    fn validate(&self) {
        if self.corpus_path.trim().is_empty() {
            panic!("corpus_path must not be empty");
        }

        if self.default_top_k == 0 {
            panic!("default_top_k must be at least 1");
        }

        if self.embedding.model.trim().is_empty() {
            panic!("embedding.model must not be empty");
        }

        if self.embedding.download_timeout_secs == 0 {
            panic!("embedding.download_timeout_secs must be greater than 0");
        }

        if self.translation.enabled && self.translation.endpoint.trim().is_empty() {
            panic!("translation.endpoint must be set when translation is enabled");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        let config_path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        if !config_path.exists() {
            let defaults =
                serde_yml::to_string(&Self::default()).expect("default config serializes");
            std::fs::write(&config_path, defaults).expect("config directory is writable");
        }

        let config_str =
            std::fs::read_to_string(&config_path).expect("config file is readable utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).expect("config serializes") {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let config_path = Path::new(&self.base_path).join("config.yaml");
        let config_str = serde_yml::to_string(&self).expect("config serializes");
        std::fs::write(config_path, config_str).expect("config directory is writable");
    }

    /// Corpus CSV path, resolved against the base path when relative.
    pub fn resolved_corpus_path(&self) -> PathBuf {
        let path = Path::new(&self.corpus_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.base_path).join(path)
        }
    }

    #[cfg(test)]
    pub fn for_tests(base_path: &str, corpus_path: &str) -> Self {
        Self {
            corpus_path: corpus_path.to_string(),
            base_path: base_path.to_string(),
            ..Default::default()
        }
    }
}
