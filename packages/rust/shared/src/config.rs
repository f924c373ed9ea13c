//! Application configuration for quizbank.
//!
//! User config lives at `~/.quizbank/quizbank.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuizbankError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "quizbank.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".quizbank";

// ---------------------------------------------------------------------------
// Config structs (matching quizbank.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token issuance settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Where extracted images are uploaded.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Question extraction rules.
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP API to.
    #[serde(default = "default_address")]
    pub address: String,

    /// Scratch directory for raw uploads and extracted archives.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum accepted request body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            work_dir: default_work_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8000".into()
}
fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("quizbank")
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("quizbank.db")
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the env var holding the token signing secret (never store the secret itself).
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    /// Lifetime of issued access tokens.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            token_ttl_minutes: default_token_ttl(),
        }
    }
}

fn default_secret_env() -> String {
    "SECRET_KEY".into()
}
fn default_token_ttl() -> i64 {
    250
}

/// Which image store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackendKind {
    /// Amazon S3 (or compatible) bucket.
    #[default]
    S3,
    /// Copy into a local directory (development, tests).
    Local,
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Store implementation.
    #[serde(default)]
    pub backend: ImageBackendKind,

    /// Object key prefix; keys are `<prefix>/<file name>`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// S3 bucket name.
    #[serde(default)]
    pub bucket: String,

    /// S3 region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Env var holding the access key id.
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Env var holding the secret access key.
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,

    /// Target directory for the local backend.
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,

    /// Base URL images are served from. Required for the local backend,
    /// optional override of the bucket URL for S3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            backend: ImageBackendKind::default(),
            key_prefix: default_key_prefix(),
            bucket: String::new(),
            region: default_region(),
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
            local_dir: default_local_dir(),
            public_base_url: None,
        }
    }
}

fn default_key_prefix() -> String {
    "images".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_access_key_env() -> String {
    "AWS_ACCESS_KEY_ID".into()
}
fn default_secret_key_env() -> String {
    "AWS_SECRET_KEY".into()
}
fn default_local_dir() -> PathBuf {
    PathBuf::from("uploads")
}

/// How question paragraphs are recognised by their class attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphMatch {
    /// Any class starting with `paragraph_class`.
    #[default]
    Prefix,
    /// A class equal to `paragraph_class`.
    Exact,
}

/// `[extractor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Matching mode for paragraph classes.
    #[serde(default)]
    pub paragraph_match: ParagraphMatch,

    /// Class name or prefix, depending on `paragraph_match`.
    #[serde(default = "default_paragraph_class")]
    pub paragraph_class: String,

    /// Extension (without dot) of the question document inside an archive.
    #[serde(default = "default_document_extension")]
    pub document_extension: String,

    /// Literal prefixes that open an option line.
    #[serde(default = "default_option_prefixes")]
    pub option_prefixes: Vec<String>,

    /// Separator placed between options in the stored `options` string.
    #[serde(default = "default_options_separator")]
    pub options_separator: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            paragraph_match: ParagraphMatch::default(),
            paragraph_class: default_paragraph_class(),
            document_extension: default_document_extension(),
            option_prefixes: default_option_prefixes(),
            options_separator: default_options_separator(),
        }
    }
}

fn default_paragraph_class() -> String {
    "c".into()
}
fn default_document_extension() -> String {
    "html".into()
}
fn default_option_prefixes() -> Vec<String> {
    ["A)", "B)", "C)", "D)"].map(String::from).to_vec()
}
fn default_options_separator() -> String {
    "\n".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.quizbank/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QuizbankError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.quizbank/quizbank.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
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
    let content = std::fs::read_to_string(path).map_err(|e| QuizbankError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| QuizbankError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QuizbankError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QuizbankError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QuizbankError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the token signing secret from the configured env var.
pub fn validate_secret(config: &AppConfig) -> Result<String> {
    let var_name = &config.auth.secret_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(QuizbankError::config(format!(
            "token secret not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the image settings are usable for the selected backend.
pub fn validate_images(config: &ImagesConfig) -> Result<()> {
    if let Some(base) = &config.public_base_url {
        url::Url::parse(base).map_err(|e| {
            QuizbankError::config(format!("images.public_base_url is not a URL: {e}"))
        })?;
    }
    match config.backend {
        ImageBackendKind::S3 if config.bucket.is_empty() => Err(QuizbankError::config(
            "images.bucket must be set for the s3 backend",
        )),
        ImageBackendKind::Local if config.public_base_url.is_none() => Err(
            QuizbankError::config("images.public_base_url must be set for the local backend"),
        ),
        _ => Ok(()),
    }
}
