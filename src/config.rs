//! Configuration loading for chatrelay.
//!
//! Settings come from, in increasing precedence: built-in defaults,
//! `~/.chatrelay/settings.json`, a `.env` file, and the process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed reply sent when the backend cannot produce an answer.
pub const DEFAULT_FALLBACK_TEXT: &str = "Error al procesar tu mensaje. Intenta más tarde.";

/// Get the chatrelay home directory (~/.chatrelay).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".chatrelay"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from the default location, `.env` and the environment.
pub fn load_settings() -> Result<Settings> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let path = get_settings_path()?;
    let mut settings = load_settings_file(&path)?;
    settings.apply_env(|name| std::env::var(name).ok())?;
    Ok(settings)
}

/// Read a settings file, falling back to defaults when it does not exist.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// HTTP listener configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3008
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Backend text-processing service.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Backend {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Request timeout in seconds. Zero waits indefinitely.
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_timeout_secs() -> u64 {
    60
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

impl Backend {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Identity resolution.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Identity {
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl Identity {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// User-facing reply texts.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Replies {
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
}

fn default_fallback_text() -> String {
    DEFAULT_FALLBACK_TEXT.to_string()
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            fallback_text: default_fallback_text(),
        }
    }
}

/// Log output. `RUST_LOG`, when set, replaces `filter`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Logging {
    /// Directory for the rolling log files. Defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Write the log file as JSON lines.
    #[serde(default)]
    pub json: bool,
}

fn default_log_file_name() -> String {
    "chatrelay.log".to_string()
}

fn default_log_filter() -> String {
    "info,chatrelay=debug".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            dir: None,
            file_name: default_log_file_name(),
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Which messaging transport feeds the relay.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Gateway,
    Telegram,
}

impl std::str::FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(TransportKind::Gateway),
            "telegram" => Ok(TransportKind::Telegram),
            other => Err(Error::Config(format!("Unknown transport '{}'", other))),
        }
    }
}

/// Transport configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Transport {
    #[serde(default)]
    pub kind: TransportKind,
    pub gateway_url: Option<String>,
    pub telegram_token: Option<String>,
    /// Bot API server, when not the public `api.telegram.org`.
    #[serde(default)]
    pub telegram_api_url: Option<String>,
}

impl Transport {
    pub fn telegram_api_url(&self) -> Result<Option<reqwest::Url>> {
        self.telegram_api_url
            .as_deref()
            .map(|url| {
                reqwest::Url::parse(url).map_err(|e| {
                    Error::Config(format!("Invalid transport.telegram_api_url '{}': {}", url, e))
                })
            })
            .transpose()
    }
}

/// chatrelay settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub identity: Identity,

    #[serde(default)]
    pub replies: Replies,

    #[serde(default)]
    pub transport: Transport,

    #[serde(default)]
    pub logging: Logging,
}

impl Settings {
    /// Overlay environment variables onto the loaded settings.
    ///
    /// `lookup` is injected so tests do not have to mutate the real
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(url) = lookup("URL_BACKEND") {
            self.backend.url = Some(url);
        }
        if let Some(key) = lookup("BOT_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Some(secs) = lookup("BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_env("BACKEND_TIMEOUT_SECS", &secs)?;
        }
        if let Some(ms) = lookup("LOOKUP_TIMEOUT_MS") {
            self.identity.lookup_timeout_ms = parse_env("LOOKUP_TIMEOUT_MS", &ms)?;
        }
        if let Some(text) = lookup("FALLBACK_TEXT") {
            self.replies.fallback_text = text;
        }
        if let Some(kind) = lookup("TRANSPORT") {
            self.transport.kind = kind.parse()?;
        }
        if let Some(url) = lookup("GATEWAY_URL") {
            self.transport.gateway_url = Some(url);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.transport.telegram_token = Some(token);
        }
        if let Some(url) = lookup("TELEGRAM_API_URL") {
            self.transport.telegram_api_url = Some(url);
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup("LOG_FILE") {
            self.logging.file_name = name;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json = parse_env("LOG_JSON", &json)?;
        }
        Ok(())
    }

    /// Check that the settings are complete enough to serve traffic.
    pub fn validate(&self) -> Result<()> {
        if self.logging.file_name.trim().is_empty() {
            return Err(Error::Config("logging.file_name is empty (LOG_FILE)".to_string()));
        }
        if self.backend.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(Error::Config(
                "backend.url is not set (URL_BACKEND)".to_string(),
            ));
        }
        match self.transport.kind {
            TransportKind::Gateway if self.transport.gateway_url.is_none() => Err(Error::Config(
                "transport.gateway_url is required for the gateway transport (GATEWAY_URL)"
                    .to_string(),
            )),
            TransportKind::Telegram if self.transport.telegram_token.is_none() => {
                Err(Error::Config(
                    "transport.telegram_token is required for the telegram transport (TELEGRAM_BOT_TOKEN)"
                        .to_string(),
                ))
            }
            TransportKind::Telegram => self.transport.telegram_api_url().map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Copy of the settings safe to print.
    pub fn redacted(&self) -> Settings {
        let mut out = self.clone();
        if out.backend.api_key.is_some() {
            out.backend.api_key = Some("***".to_string());
        }
        if out.transport.telegram_token.is_some() {
            out.transport.telegram_token = Some("***".to_string());
        }
        out
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", name, value)))
}
