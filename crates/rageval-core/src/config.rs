//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_RETRIEVER__KNN=8` sets `retriever.knn`). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// All typed sections, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub retriever: RetrieverSettings,
    pub rerank: RerankSettings,
    pub guardrail: GuardrailSettings,
    pub inferencer: InferencerSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.retriever.validate()?;
        self.inferencer.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_txt_dir: String,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            raw_txt_dir: "../dev_data/txt".into(),
            lancedb_dir: "../dev_data/indexes/lancedb".into(),
            table: "documents".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub questions_path: String,
    pub output_path: Option<String>,
    pub knn: usize,
    pub hierarchical: bool,
    pub query: String,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            questions_path: "../dev_data/questions.json".into(),
            output_path: None,
            knn: 5,
            hierarchical: false,
            query: String::new(),
        }
    }
}

impl RetrieverSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.knn == 0 {
            return Err(Error::InvalidConfig("retriever.knn must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub top_n: Option<usize>,
    pub vector_weight: f32,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self { enabled: true, top_n: None, vector_weight: 0.7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailSettings {
    pub enabled: bool,
    pub denied_terms: Vec<String>,
    pub blocked_message: String,
    pub check_input: bool,
    pub check_context: bool,
    pub check_output: bool,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            denied_terms: Vec::new(),
            blocked_message: "Sorry, I can't help with that request.".into(),
            check_input: true,
            check_context: true,
            check_output: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferencerKind {
    Extractive,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferencerSettings {
    pub kind: InferencerKind,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for InferencerSettings {
    fn default() -> Self {
        Self {
            kind: InferencerKind::Extractive,
            endpoint: None,
            model: None,
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 60,
        }
    }
}

impl InferencerSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.kind == InferencerKind::Chat && (self.endpoint.is_none() || self.model.is_none()) {
            return Err(Error::InvalidConfig("inferencer.kind = \"chat\" requires endpoint and model".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
