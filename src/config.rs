use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.yaml";

/// Default semantic search model
const DEFAULT_SEMANTIC_MODEL: &str = "bge-small-en-v1.5";
/// Default similarity threshold for semantic search
const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.2;

const DEFAULT_TOP_N: usize = 3;
const DEFAULT_TEMPERATURE: f32 = 0.05;
const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("config file is not valid utf8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// zero-shot over the local embedding model
    #[default]
    Embedding,
    /// zero-shot inference endpoint
    Remote,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub kind: ClassifierKind,

    /// Endpoint for `kind: remote`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bearer token for `kind: remote`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// How many labels are kept per page
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Softmax temperature for `kind: embedding`
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Embedding,
            endpoint: None,
            token: None,
            top_n: DEFAULT_TOP_N,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Enable or disable embeddings (and therefore similarity search)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Results must score strictly above this
    #[serde(default = "default_semantic_threshold")]
    pub default_threshold: f32,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            default_threshold: DEFAULT_SEMANTIC_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Hours on each side of the current one that also count
    #[serde(default = "default_neighbor_hours")]
    pub neighbor_hours: u8,

    /// Minimum visits within the window for a page to be suggested
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,

    #[serde(default = "default_recommend_limit")]
    pub limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            neighbor_hours: default_neighbor_hours(),
            min_occurrences: default_min_occurrences(),
            limit: default_recommend_limit(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_import_max_results")]
    pub max_results: usize,

    /// Only visits newer than this many days are imported
    #[serde(default = "default_import_window_days")]
    pub window_days: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_results: default_import_max_results(),
            window_days: default_import_window_days(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub import: ImportConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            classifier: ClassifierConfig::default(),
            semantic_search: SemanticSearchConfig::default(),
            recommend: RecommendConfig::default(),
            import: ImportConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_semantic_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

fn default_neighbor_hours() -> u8 {
    1
}

fn default_min_occurrences() -> usize {
    1
}

fn default_recommend_limit() -> usize {
    10
}

fn default_import_max_results() -> usize {
    50
}

fn default_import_window_days() -> u32 {
    30
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.top_n == 0 {
            return Err(ConfigError::Invalid(
                "classifier.top_n must be greater than 0".to_string(),
            ));
        }

        if self.classifier.temperature <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "classifier.temperature must be positive, got {}",
                self.classifier.temperature
            )));
        }

        if self.classifier.kind == ClassifierKind::Remote && self.classifier.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "classifier.endpoint is required when classifier.kind is remote".to_string(),
            ));
        }

        let sem = &self.semantic_search;
        if !(-1.0..=1.0).contains(&sem.default_threshold) {
            return Err(ConfigError::Invalid(format!(
                "semantic_search.default_threshold must be between -1.0 and 1.0, got {}",
                sem.default_threshold
            )));
        }

        if self.recommend.neighbor_hours > 12 {
            return Err(ConfigError::Invalid(format!(
                "recommend.neighbor_hours must be at most 12, got {}",
                self.recommend.neighbor_hours
            )));
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from(base_path).join(CONFIG_FILE);
        std::fs::create_dir_all(base_path)?;

        // create new if does not exist
        if std::fs::metadata(&path).is_err() {
            log::info!("Creating default config at {}", path.display());
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = String::from_utf8(std::fs::read(&path)?)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = PathBuf::from(&self.base_path).join(CONFIG_FILE);
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(path, config_str)?;
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
