//! Application configuration for proposalgen.
//!
//! User config lives at `~/.proposalgen/proposalgen.toml` (or the path in
//! `PROPOSALGEN_CONFIG`). The file only names the environment variables that
//! hold secrets; keys themselves are read from the environment once, when the
//! runtime [`RunConfig`] is resolved.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProposalGenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "proposalgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".proposalgen";

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PROPOSALGEN_CONFIG";

// ---------------------------------------------------------------------------
// Config structs (matching proposalgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative model settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Resource catalog settings.
    #[serde(default)]
    pub catalogs: CatalogsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory that receives the per-run output files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of use cases requested from the generator.
    #[serde(default = "default_use_case_count")]
    pub use_case_count: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            use_case_count: default_use_case_count(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_use_case_count() -> usize {
    5
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model id passed to `generateContent`.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API root.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    4096
}
fn default_gemini_timeout() -> u64 {
    120
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the Serper API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Search endpoint root.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Results requested per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Maximum snippets handed to the summarizer.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            results_per_query: default_results_per_query(),
            max_snippets: default_max_snippets(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://google.serper.dev".into()
}
fn default_results_per_query() -> usize {
    3
}
fn default_max_snippets() -> usize {
    10
}
fn default_search_timeout() -> u64 {
    30
}

/// `[catalogs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogsConfig {
    #[serde(default = "default_github_base_url")]
    pub github_base_url: String,

    #[serde(default = "default_huggingface_base_url")]
    pub huggingface_base_url: String,

    #[serde(default = "default_kaggle_base_url")]
    pub kaggle_base_url: String,

    /// Optional GitHub token env var (raises the search rate limit).
    #[serde(default = "default_github_token_env")]
    pub github_token_env: String,

    /// Kaggle credential env vars. Without both, Kaggle falls back to search-page links.
    #[serde(default = "default_kaggle_username_env")]
    pub kaggle_username_env: String,
    #[serde(default = "default_kaggle_key_env")]
    pub kaggle_key_env: String,

    /// Results kept per catalog query.
    #[serde(default = "default_results_per_keyword")]
    pub results_per_keyword: usize,

    /// Keywords derived per use case.
    #[serde(default = "default_keywords_per_use_case")]
    pub keywords_per_use_case: usize,

    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogsConfig {
    fn default() -> Self {
        Self {
            github_base_url: default_github_base_url(),
            huggingface_base_url: default_huggingface_base_url(),
            kaggle_base_url: default_kaggle_base_url(),
            github_token_env: default_github_token_env(),
            kaggle_username_env: default_kaggle_username_env(),
            kaggle_key_env: default_kaggle_key_env(),
            results_per_keyword: default_results_per_keyword(),
            keywords_per_use_case: default_keywords_per_use_case(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".into()
}
fn default_huggingface_base_url() -> String {
    "https://huggingface.co".into()
}
fn default_kaggle_base_url() -> String {
    "https://www.kaggle.com".into()
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_kaggle_username_env() -> String {
    "KAGGLE_USERNAME".into()
}
fn default_kaggle_key_env() -> String {
    "KAGGLE_KEY".into()
}
fn default_results_per_keyword() -> usize {
    3
}
fn default_keywords_per_use_case() -> usize {
    2
}
fn default_catalog_timeout() -> u64 {
    15
}

// ---------------------------------------------------------------------------
// Runtime config (resolved once at startup, passed by reference)
// ---------------------------------------------------------------------------

/// A credential read from the environment. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for placing into a request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Resolved generative-model settings.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Secret,
    pub model: String,
    pub base_url: Url,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

/// Resolved web-search settings.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_key: Secret,
    pub base_url: Url,
    pub results_per_query: usize,
    pub max_snippets: usize,
    pub timeout: Duration,
}

/// Kaggle API credentials (basic auth).
#[derive(Debug, Clone)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: Secret,
}

/// Resolved catalog settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub github_base_url: Url,
    pub github_token: Option<Secret>,
    pub huggingface_base_url: Url,
    pub kaggle_base_url: Url,
    pub kaggle_credentials: Option<KaggleCredentials>,
    pub results_per_keyword: usize,
    pub keywords_per_use_case: usize,
    pub timeout: Duration,
}

/// Everything a run needs, merged from the config file and the environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub use_case_count: usize,
    pub gemini: GeminiSettings,
    pub search: SearchSettings,
    pub catalogs: CatalogSettings,
}

impl RunConfig {
    /// Resolve against the process environment.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` for environment variables.
    ///
    /// Fails with a single [`ProposalGenError::Config`] listing every missing
    /// required variable, so the user can fix them all at once.
    pub fn resolve_with(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_key = read(&config.gemini.api_key_env);
        let search_key = read(&config.search.api_key_env);

        let mut missing = Vec::new();
        if gemini_key.is_none() {
            missing.push(config.gemini.api_key_env.as_str());
        }
        if search_key.is_none() {
            missing.push(config.search.api_key_env.as_str());
        }
        let (Some(gemini_key), Some(search_key)) = (gemini_key, search_key) else {
            return Err(ProposalGenError::config(format!(
                "missing required credentials: {}. Set them in the environment or a .env file.\n\
                 Gemini keys: https://aistudio.google.com/app/apikey\n\
                 Serper keys: https://serper.dev/api-key",
                missing.join(", ")
            )));
        };

        if config.defaults.use_case_count == 0 {
            return Err(ProposalGenError::config("defaults.use_case_count must be at least 1"));
        }

        let kaggle_credentials = match (
            read(&config.catalogs.kaggle_username_env),
            read(&config.catalogs.kaggle_key_env),
        ) {
            (Some(username), Some(key)) => Some(KaggleCredentials {
                username,
                key: Secret::new(key),
            }),
            _ => None,
        };

        Ok(Self {
            output_dir: expand_home(&config.defaults.output_dir),
            use_case_count: config.defaults.use_case_count,
            gemini: GeminiSettings {
                api_key: Secret::new(gemini_key),
                model: config.gemini.model.clone(),
                base_url: parse_base_url("gemini.base_url", &config.gemini.base_url)?,
                temperature: config.gemini.temperature,
                max_output_tokens: config.gemini.max_output_tokens,
                timeout: Duration::from_secs(config.gemini.timeout_secs),
            },
            search: SearchSettings {
                api_key: Secret::new(search_key),
                base_url: parse_base_url("search.base_url", &config.search.base_url)?,
                results_per_query: config.search.results_per_query.max(1),
                max_snippets: config.search.max_snippets.max(1),
                timeout: Duration::from_secs(config.search.timeout_secs),
            },
            catalogs: CatalogSettings {
                github_base_url: parse_base_url(
                    "catalogs.github_base_url",
                    &config.catalogs.github_base_url,
                )?,
                github_token: read(&config.catalogs.github_token_env).map(Secret::new),
                huggingface_base_url: parse_base_url(
                    "catalogs.huggingface_base_url",
                    &config.catalogs.huggingface_base_url,
                )?,
                kaggle_base_url: parse_base_url(
                    "catalogs.kaggle_base_url",
                    &config.catalogs.kaggle_base_url,
                )?,
                kaggle_credentials,
                results_per_keyword: config.catalogs.results_per_keyword.max(1),
                keywords_per_use_case: config.catalogs.keywords_per_use_case.max(1),
                timeout: Duration::from_secs(config.catalogs.timeout_secs),
            },
        })
    }
}

fn parse_base_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ProposalGenError::config(format!("invalid {field} '{raw}': {e}")))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.proposalgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProposalGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file, honoring `PROPOSALGEN_CONFIG`.
pub fn config_file_path() -> Result<PathBuf> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(p) if !p.is_empty() => Ok(PathBuf::from(p)),
        _ => Ok(config_dir()?.join(CONFIG_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProposalGenError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProposalGenError::config(format!("failed to parse {}: {e}", path.display()))
    })
}
