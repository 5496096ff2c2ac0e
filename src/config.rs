use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
            static_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_vision_base_url")]
    pub base_url: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Lowercase phrases the model emits when it refuses to describe an outfit.
    #[serde(default = "default_refusal_phrases")]
    pub refusal_phrases: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: default_vision_base_url(),
            model: default_vision_model(),
            timeout_secs: default_vision_timeout_secs(),
            prompt: default_prompt(),
            refusal_phrases: default_refusal_phrases(),
        }
    }
}

fn default_vision_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_vision_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_vision_timeout_secs() -> u64 {
    15
}
fn default_prompt() -> String {
    "Describe the outfit in this image in detail, focusing on specific clothing items \
     (e.g., 'blue denim jacket', 'striped cotton t-shirt', 'black leather boots'), colors, \
     patterns, and styles. If identifiable, mention brand names and material types. \
     The goal is to generate terms that would be useful for a shopping search to find \
     similar items."
        .to_string()
}
fn default_refusal_phrases() -> Vec<String> {
    vec![
        "cannot describe the outfit".to_string(),
        "not an image of clothing".to_string(),
        "please provide an actual image of an outfit".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_query")]
    pub default_query: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            engine: default_engine(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout_secs(),
            default_query: default_query(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://serpapi.com/search.json".to_string()
}
fn default_engine() -> String {
    "google".to_string()
}
fn default_max_results() -> usize {
    5
}
fn default_search_timeout_secs() -> u64 {
    10
}
fn default_query() -> String {
    "white t-shirt".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Append-only diagnostic log. `None` logs to the console only.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("debug_log.txt"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_analyze_url")]
    pub analyze_url: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_crawler_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            analyze_url: default_analyze_url(),
            download_dir: default_download_dir(),
            max_images: default_max_images(),
            timeout_secs: default_crawler_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_analyze_url() -> String {
    "http://127.0.0.1:5000/analyze".to_string()
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("crawled_images")
}
fn default_max_images() -> usize {
    5
}
fn default_crawler_timeout_secs() -> u64 {
    15
}
fn default_min_delay_ms() -> u64 {
    2000
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3"
        .to_string()
}

/// API keys for the outbound services. Never read from the config file.
#[derive(Clone)]
pub struct Secrets {
    pub gemini_api_key: String,
    pub serpapi_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("gemini_api_key", &"<redacted>")
            .field("serpapi_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    /// Reads `GEMINI_API_KEY` and `SERPAPI_KEY`, failing if either is unset or blank.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gemini_api_key: required_env("GEMINI_API_KEY")?,
            serpapi_key: required_env("SERPAPI_KEY")?,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => anyhow::bail!("{} environment variable not set", name),
    }
}

/// Loads and validates the TOML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    if config.vision.timeout_secs == 0 {
        anyhow::bail!("vision.timeout_secs must be > 0");
    }
    if config.vision.prompt.trim().is_empty() {
        anyhow::bail!("vision.prompt must not be empty");
    }

    if config.search.max_results < 1 {
        anyhow::bail!("search.max_results must be >= 1");
    }
    if config.search.timeout_secs == 0 {
        anyhow::bail!("search.timeout_secs must be > 0");
    }
    if config.search.default_query.trim().is_empty() {
        anyhow::bail!("search.default_query must not be empty");
    }

    if config.crawler.timeout_secs == 0 {
        anyhow::bail!("crawler.timeout_secs must be > 0");
    }
    if config.crawler.min_delay_ms > config.crawler.max_delay_ms {
        anyhow::bail!("crawler.min_delay_ms must be <= crawler.max_delay_ms");
    }

    Ok(())
}
