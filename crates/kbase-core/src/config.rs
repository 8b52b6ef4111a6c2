//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`). Provides helpers to expand
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

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extract and validate the typed settings, expanding `~` and `$VAR` in paths.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.data.source_dir = expand_path(settings.data.source_dir.to_string_lossy());
        settings.data.index_dir = expand_path(settings.data.index_dir.to_string_lossy());
        settings.embedding.model_dir = expand_path(settings.embedding.model_dir.to_string_lossy());
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub build: BuildSettings,
    pub embedding: EmbeddingSettings,
    pub categories: Vec<CategoryRule>,
    pub search: SearchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            chunking: ChunkingConfig::default(),
            build: BuildSettings::default(),
            embedding: EmbeddingSettings::default(),
            categories: default_category_rules(),
            search: SearchSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be >= 1".into()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.build.checkpoint_every == 0 {
            return Err(Error::InvalidConfig("build.checkpoint_every must be >= 1".into()));
        }
        if self.build.streaming_batch_size == 0 || self.build.checkpoint_batch_size == 0 {
            return Err(Error::InvalidConfig("build batch sizes must be >= 1".into()));
        }
        if self.build.strategies.is_empty() {
            return Err(Error::InvalidConfig("build.strategies must name at least one strategy".into()));
        }
        if self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub source_dir: PathBuf,
    pub index_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { source_dir: PathBuf::from("Knowledge"), index_dir: PathBuf::from("knowledge_index") }
    }
}

/// Character-based chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 512, overlap: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// One pass with the small model and micro-batches, no checkpoints.
    Streaming,
    /// Standard model with periodic checkpoint + index flushes; resumable.
    Checkpointed,
    /// Keyword/phrase indices only, no embedding backend required.
    Lexical,
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStrategy::Streaming => f.write_str("streaming"),
            BuildStrategy::Checkpointed => f.write_str("checkpointed"),
            BuildStrategy::Lexical => f.write_str("lexical"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub streaming_batch_size: usize,
    pub checkpoint_batch_size: usize,
    pub checkpoint_every: usize,
    pub strategies: Vec<BuildStrategy>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            streaming_batch_size: 3,
            checkpoint_batch_size: 5,
            checkpoint_every: 5,
            strategies: vec![BuildStrategy::Streaming, BuildStrategy::Checkpointed, BuildStrategy::Lexical],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: PathBuf,
    pub small_model: String,
    pub standard_model: String,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            small_model: "paraphrase-MiniLM-L3-v2".to_string(),
            standard_model: "all-MiniLM-L6-v2".to_string(),
            max_len: 256,
            use_fake: false,
            fake_dim: 384,
        }
    }
}

/// Maps a relative-path segment to a category. `pattern` is matched as a
/// substring of each directory segment; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
    /// When set, some directory segment must also contain this text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<String>,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), category: category.into(), within: None }
    }

    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.within = Some(parent.into());
        self
    }
}

const MENU_SECTION: &str = "Меню";

/// Sections of the knowledge tree. Menu sub-sections are resolved first;
/// anything else under the menu stays `General` even if a later rule matches.
pub fn default_category_rules() -> Vec<CategoryRule> {
    let menu = [
        ("GDS", "GDS"),
        ("Заказы", "Orders"),
        ("Финансы", "Finance"),
        ("Прайсер", "Pricing"),
        ("Сайты", "Websites"),
        ("Маркетинг", "Marketing"),
        ("Справочник", "Reference"),
        ("Настройки", "Settings"),
        ("Квоты", "Quotas"),
        ("Каталог", "Catalog"),
    ];
    let mut rules: Vec<CategoryRule> =
        menu.iter().map(|(pattern, category)| CategoryRule::new(*pattern, *category).within(MENU_SECTION)).collect();
    rules.push(CategoryRule::new(MENU_SECTION, crate::types::DEFAULT_CATEGORY));
    rules.extend([
        CategoryRule::new("F.A.Q", "FAQ"),
        CategoryRule::new("Разное", "Miscellaneous"),
        CategoryRule::new("отельный контракт", "Hotel Contracts"),
        CategoryRule::new("Матчинг", "Matching"),
    ]);
    rules
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_k: 5 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> Config {
        Config::from_figment(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
    }

    #[test]
    fn defaults_are_valid() {
        let settings = config_from("").settings().expect("settings");
        assert_eq!(settings.chunking, ChunkingConfig { chunk_size: 512, overlap: 50 });
        assert_eq!(settings.build.checkpoint_every, 5);
        assert_eq!(settings.build.strategies.len(), 3);
        assert_eq!(settings.search.default_k, 5);
    }

    #[test]
    fn toml_overrides_nested_sections() {
        let config = config_from(
            r#"
            [chunking]
            chunk_size = 256
            overlap = 32

            [build]
            strategies = ["checkpointed", "lexical"]

            [[categories]]
            pattern = "F.A.Q"
            category = "FAQ"
            "#,
        );
        let settings = config.settings().expect("settings");
        assert_eq!(settings.chunking.chunk_size, 256);
        assert_eq!(settings.build.strategies, vec![BuildStrategy::Checkpointed, BuildStrategy::Lexical]);
        assert_eq!(settings.categories[0].category, "FAQ");
        assert_eq!(settings.categories.len(), 1);
    }

    #[test]
    fn default_categories_follow_the_knowledge_tree() {
        let settings = config_from("").settings().expect("settings");
        let gds = settings.categories.iter().find(|r| r.category == "GDS").expect("gds rule");
        assert_eq!(gds.within.as_deref(), Some("Меню"));
        assert!(settings.categories.iter().any(|r| r.pattern == "F.A.Q" && r.category == "FAQ" && r.within.is_none()));
        assert!(settings.categories.iter().any(|r| r.category == "Hotel Contracts"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = config_from("[chunking]\nchunk_size = 10\noverlap = 10\n").settings();
        assert!(err.is_err());
    }
}
