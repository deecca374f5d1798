//! TOML configuration.
//!
//! Every section except `[db]` and `[server]` has defaults, so a minimal
//! config file is:
//!
//! ```toml
//! [db]
//! path = "./data/rsum.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```
//!
//! Secrets (the generation API key and the GitHub token) are never read from
//! the file; the config only names the environment variables that hold them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed browser origin. Any origin is accepted when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

/// Limits applied while distilling a working tree into a prompt corpus.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Fraction of the budget below which an oversized file may be truncated
    /// into the corpus instead of dropped.
    #[serde(default = "default_truncation_guard")]
    pub truncation_guard: f64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
            min_chars: default_min_chars(),
            truncation_guard: default_truncation_guard(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_budget_chars() -> usize {
    300_000
}
fn default_min_chars() -> usize {
    50
}
fn default_truncation_guard() -> f64 {
    0.10
}
fn default_max_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    /// Parent directory for per-run working trees.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            shallow: true,
            token_env: default_token_env(),
        }
    }
}

fn default_shallow() -> bool {
    true
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

impl GitConfig {
    /// Resolved staging root: the configured `work_dir`, or `<tmp>/rsum-work`.
    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("rsum-work"))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Falls back to the provider's default model, see
    /// [`GenerationConfig::resolved_model`].
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (e.g. an OpenAI-compatible gateway or a remote Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
/// Model used when `[generation].model` is omitted. Only the OpenAI
/// provider has one; Ollama models are whatever the host has pulled.
fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("gpt-4o-mini"),
        _ => None,
    }
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    2500
}
fn default_temperature() -> f64 {
    0.2
}
fn default_top_p() -> f64 {
    0.9
}
fn default_timeout_secs() -> u64 {
    120
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// The configured model, or the provider default.
    pub fn resolved_model(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| default_model(&self.provider).map(str::to_string))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks value ranges that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    let corpus = &config.corpus;
    if corpus.budget_chars == 0 {
        anyhow::bail!("corpus.budget_chars must be > 0");
    }
    if corpus.min_chars > corpus.budget_chars {
        anyhow::bail!("corpus.min_chars must not exceed corpus.budget_chars");
    }
    if !(0.0..=1.0).contains(&corpus.truncation_guard) {
        anyhow::bail!("corpus.truncation_guard must be in [0.0, 1.0]");
    }
    if corpus.max_depth == 0 {
        anyhow::bail!("corpus.max_depth must be >= 1");
    }

    let generation = &config.generation;
    match generation.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if generation.is_enabled() && generation.resolved_model().is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            generation.provider
        );
    }
    if !(0.0..=2.0).contains(&generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if !(generation.top_p > 0.0 && generation.top_p <= 1.0) {
        anyhow::bail!("generation.top_p must be in (0.0, 1.0]");
    }

    Ok(())
}
