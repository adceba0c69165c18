//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RAG__TOP_K=8`). Every setting has a
//! default so an empty environment yields a usable configuration.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(format!("Failed to read settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        match env {
            "prod" | "production" => {
                let fake = env::var("APP_USE_FAKE_EMBEDDINGS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
                if fake {
                    return Err(Error::Configuration("APP_USE_FAKE_EMBEDDINGS is not allowed in production".to_string()));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub rag: RagSettings,
    pub providers: ProviderSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.rag.chunking()?;
        if self.rag.top_k == 0 {
            return Err(Error::Configuration("rag.top_k must be at least 1".to_string()));
        }
        if self.rag.max_context_chars == 0 {
            return Err(Error::Configuration("rag.max_context_chars must be at least 1".to_string()));
        }
        if self.rag.embed_batch_size == 0 {
            return Err(Error::Configuration("rag.embed_batch_size must be at least 1".to_string()));
        }
        if let Some(min) = self.rag.min_score {
            if !(-1.0..=1.0).contains(&min) {
                return Err(Error::Configuration(format!("rag.min_score {} is outside [-1, 1]", min)));
            }
        }
        Ok(())
    }
}

/// Where the archive and the persisted index live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub root: String,
    pub digests_dir: String,
    pub rag_store_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { root: ".".to_string(), digests_dir: "digests".to_string(), rag_store_dir: "rag_store".to_string() }
    }
}

impl DataSettings {
    pub fn root_path(&self) -> PathBuf {
        expand_path(&self.root)
    }

    pub fn digests_path(&self) -> PathBuf {
        resolve_with_base(&self.root_path(), &self.digests_dir)
    }

    pub fn rag_store_path(&self) -> PathBuf {
        resolve_with_base(&self.root_path(), &self.rag_store_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub snippet_chars: usize,
    /// Minimum cosine similarity for a chunk to reach the composer. Unset
    /// means top-K by rank with no cutoff.
    pub min_score: Option<f32>,
    pub embed_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            top_k: 5,
            max_context_chars: 6000,
            snippet_chars: 600,
            min_score: None,
            embed_batch_size: 64,
        }
    }
}

impl RagSettings {
    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            embedding_model: "text-embedding-004".to_string(),
            chat_model: "gemini-2.5-pro".to_string(),
            temperature: 0.4,
            timeout_secs: 60,
        }
    }
}

impl ProviderSettings {
    /// The configured key, falling back to `GOOGLE_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("GOOGLE_API_KEY").ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| Error::Configuration("GOOGLE_API_KEY is not set (environment or .env)".to_string()))
    }
}

/// `~` and `$VAR`/`${VAR}` expansion. Unknown variables are left as written.
pub fn expand_path(raw: impl AsRef<str>) -> PathBuf {
    let raw = raw.as_ref();
    let with_vars = shellexpand::env(raw).map(|c| c.into_owned()).unwrap_or_else(|_| raw.to_string());
    PathBuf::from(shellexpand::tilde(&with_vars).as_ref())
}

/// Expanded `raw`, joined onto `base` unless it is already absolute.
pub fn resolve_with_base(base: &Path, raw: impl AsRef<str>) -> PathBuf {
    match expand_path(raw) {
        p if p.is_absolute() => p,
        p => base.join(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> Config {
        Config::from_figment(Figment::from(Toml::string(toml)))
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let settings = config_from("").settings().expect("settings");
        assert_eq!(settings.rag.chunk_size, 800);
        assert_eq!(settings.rag.chunk_overlap, 150);
        assert_eq!(settings.rag.top_k, 5);
        assert!(settings.rag.min_score.is_none());
        assert_eq!(settings.providers.embedding_model, "text-embedding-004");
    }

    #[test]
    fn toml_overrides_nested_values() {
        let settings = config_from("[rag]\ntop_k = 8\nmin_score = 0.2\n[data]\nroot = \"/srv/digest\"\n")
            .settings()
            .expect("settings");
        assert_eq!(settings.rag.top_k, 8);
        assert_eq!(settings.rag.min_score, Some(0.2));
        assert_eq!(settings.rag.chunk_size, 800, "untouched keys keep defaults");
        assert_eq!(settings.data.digests_path(), PathBuf::from("/srv/digest/digests"));
        assert_eq!(settings.data.rag_store_path(), PathBuf::from("/srv/digest/rag_store"));
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let err = config_from("[rag]\nchunk_size = 100\nchunk_overlap = 100\n").settings().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let err = config_from("[rag]\ntop_k = 0\n").settings().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn absolute_store_dir_ignores_root() {
        let data = DataSettings { root: "/a".into(), digests_dir: "d".into(), rag_store_dir: "/b/store".into() };
        assert_eq!(data.rag_store_path(), PathBuf::from("/b/store"));
        assert_eq!(data.digests_path(), PathBuf::from("/a/d"));
    }

    #[test]
    fn explicit_api_key_wins() {
        let providers = ProviderSettings { api_key: Some("k-123".into()), ..ProviderSettings::default() };
        assert_eq!(providers.resolve_api_key().expect("key"), "k-123");
    }
}
