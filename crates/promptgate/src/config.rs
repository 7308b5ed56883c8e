use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Pattern file; the built-in catalogue is used when absent.
    #[serde(default)]
    pub patterns_file: Option<PathBuf>,
    /// Policy files, one policy per file.
    #[serde(default)]
    pub policy_files: Vec<PathBuf>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patterns_file: None,
            policy_files: Vec::new(),
            limits: LimitsConfig::default(),
            cache: CacheSection::default(),
            semantic: SemanticConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_max_prompt_bytes")]
    pub max_prompt_bytes: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            max_prompt_bytes: default_max_prompt_bytes(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_l1_size")]
    pub l1_size: usize,
    #[serde(default = "default_ttl_l1")]
    pub ttl_l1_secs: u64,
    #[serde(default = "default_ttl_l2")]
    pub ttl_l2_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            l1_size: default_l1_size(),
            ttl_l1_secs: default_ttl_l1(),
            ttl_l2_secs: default_ttl_l2(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SemanticConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_semantic_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Reference entries file (JSON list of id/label/category/severity/text).
    #[serde(default)]
    pub references_file: Option<PathBuf>,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            threshold: default_semantic_threshold(),
            max_embed_chars: default_max_embed_chars(),
            top_k: default_top_k(),
            dimension: default_dimension(),
            references_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_detection_log_path")]
    pub detection_log_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            detection_log_path: default_detection_log_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_deadline_ms() -> u64 {
    150
}

fn default_max_prompt_bytes() -> usize {
    64 * 1024
}

fn default_max_batch_size() -> usize {
    100
}

fn default_l1_size() -> usize {
    1000
}

fn default_ttl_l1() -> u64 {
    300
}

fn default_ttl_l2() -> u64 {
    3600
}

fn default_semantic_threshold() -> f64 {
    0.85
}

fn default_max_embed_chars() -> usize {
    2048
}

fn default_top_k() -> usize {
    5
}

fn default_dimension() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_detection_log_path() -> PathBuf {
    PathBuf::from("decisions.jsonl")
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file, then apply environment overrides.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted. This allows promptgate to start with sensible
/// defaults when no config file has been written yet.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        serde_yml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?
    } else {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        Config::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Environment variables override file values key by key.
fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_parse::<u64>("CACHE_TTL_L1") {
        config.cache.ttl_l1_secs = v;
    }
    if let Some(v) = env_parse::<u64>("CACHE_TTL_L2") {
        config.cache.ttl_l2_secs = v;
    }
    if let Some(v) = env_parse::<usize>("CACHE_L1_SIZE") {
        config.cache.l1_size = v;
    }
    if let Some(v) = env_parse::<f64>("SEMANTIC_THRESHOLD") {
        config.semantic.threshold = v;
    }
    if let Some(v) = env_parse::<u64>("DEADLINE_MS") {
        config.limits.deadline_ms = v;
    }
    if let Some(v) = env_parse::<usize>("MAX_PROMPT_BYTES") {
        config.limits.max_prompt_bytes = v;
    }
    if let Some(v) = env_parse::<usize>("MAX_BATCH_SIZE") {
        config.limits.max_batch_size = v;
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, %raw, "ignoring unparsable environment override");
                None
            }
        },
        Err(_) => None,
    }
}
