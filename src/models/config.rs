//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Destination;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Portal endpoints and HTTP behavior
    #[serde(default)]
    pub portal: PortalConfig,

    /// The single credential pair used to log in
    #[serde(default)]
    pub credentials: Credentials,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Resource classification rules
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Display name preprocessing
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Send throttling and retry limits
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Daily trigger
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Where persisted documents live
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    ///
    /// Only the CLI calls this; components receive the finished value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(username) = lookup("UNIV_USERNAME") {
            self.credentials.username = username;
        }
        if let Some(password) = lookup("UNIV_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(admin) = lookup("ADMIN_ID").filter(|v| !v.trim().is_empty() && v != "0") {
            self.telegram.admin_chat = Some(admin.parse()?);
        }
        if let Some(base_url) = lookup("PORTAL_BASE_URL") {
            self.portal.base_url = base_url;
        }
        if let Some(login_url) = lookup("PORTAL_LOGIN_URL") {
            self.portal.login_url = login_url;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.portal.user_agent.trim().is_empty() {
            return Err(AppError::validation("portal.user_agent is empty"));
        }
        if self.portal.timeout_secs == 0 {
            return Err(AppError::validation("portal.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.portal.base_url)
            .map_err(|e| AppError::validation(format!("portal.base_url: {e}")))?;
        url::Url::parse(&self.portal.login_url)
            .map_err(|e| AppError::validation(format!("portal.login_url: {e}")))?;
        if self.delivery.max_send_attempts == 0 {
            return Err(AppError::validation(
                "delivery.max_send_attempts must be > 0",
            ));
        }
        if self.classifier.document_extension.trim().is_empty() {
            return Err(AppError::validation(
                "classifier.document_extension is empty",
            ));
        }
        if !self.classifier.drive_download_template.contains("{id}") {
            return Err(AppError::validation(
                "classifier.drive_download_template must contain {id}",
            ));
        }
        self.schedule.time()?;
        Ok(())
    }

    /// Validate that everything needed for a live check cycle is present.
    pub fn validate_runtime(&self) -> Result<()> {
        self.validate()?;
        if self.credentials.username.is_empty() || self.credentials.password.is_empty() {
            return Err(AppError::validation("portal credentials are not set"));
        }
        if self.telegram.bot_token.is_empty() {
            return Err(AppError::validation("telegram.bot_token is not set"));
        }
        Ok(())
    }
}

/// Portal endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Landing page used to probe whether the session is still alive
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Login form location
    #[serde(default = "defaults::login_url")]
    pub login_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Page content that means the session is gone
    #[serde(default = "defaults::session_expired_markers")]
    pub session_expired_markers: Vec<String>,

    /// Login response content that means the credentials were rejected
    #[serde(default = "defaults::login_failure_markers")]
    pub login_failure_markers: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            login_url: defaults::login_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            session_expired_markers: defaults::session_expired_markers(),
            login_failure_markers: defaults::login_failure_markers(),
        }
    }
}

/// Portal credential pair.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Telegram Bot API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default = "defaults::telegram_api")]
    pub api_base: String,

    /// Receives failure notices from scheduled cycles
    #[serde(default)]
    pub admin_chat: Option<Destination>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: defaults::telegram_api(),
            admin_chat: None,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("api_base", &self.api_base)
            .field("admin_chat", &self.admin_chat)
            .finish()
    }
}

/// Rules used to decide what a resource link points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Content-Type values that mean "this is the document itself"
    #[serde(default = "defaults::document_content_types")]
    pub document_content_types: Vec<String>,

    /// Extension (with dot) of deliverable documents
    #[serde(default = "defaults::document_extension")]
    pub document_extension: String,

    /// URL substrings of the external file host
    #[serde(default = "defaults::drive_patterns")]
    pub drive_patterns: Vec<String>,

    /// Direct-download form of an external file, `{id}` is substituted
    #[serde(default = "defaults::drive_download_template")]
    pub drive_download_template: String,

    /// URL substrings of video hosts
    #[serde(default = "defaults::video_patterns")]
    pub video_patterns: Vec<String>,

    /// URL substrings of portal pages that wrap the real target in a link
    #[serde(default = "defaults::wrapper_patterns")]
    pub wrapper_patterns: Vec<String>,
}

impl ClassifierConfig {
    pub fn is_document_type(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        self.document_content_types
            .iter()
            .any(|t| content_type.contains(&t.to_ascii_lowercase()))
    }

    pub fn is_drive(&self, url: &str) -> bool {
        self.drive_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    pub fn is_video(&self, url: &str) -> bool {
        self.video_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    pub fn is_wrapper(&self, url: &str) -> bool {
        self.wrapper_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Whether the URL path ends with the document extension.
    pub fn has_document_extension(&self, raw: &str) -> bool {
        let extension = self.document_extension.to_ascii_lowercase();
        let path = url::Url::parse(raw)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| raw.split(['?', '#']).next().unwrap_or(raw).to_string());
        path.to_ascii_lowercase().ends_with(&extension)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            document_content_types: defaults::document_content_types(),
            document_extension: defaults::document_extension(),
            drive_patterns: defaults::drive_patterns(),
            drive_download_template: defaults::drive_download_template(),
            video_patterns: defaults::video_patterns(),
            wrapper_patterns: defaults::wrapper_patterns(),
        }
    }
}

/// Display name preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Decorative words removed anywhere in a display name
    #[serde(default = "defaults::name_remove_patterns")]
    pub name_remove_patterns: Vec<String>,

    /// Trailing words removed (case-insensitive) before building a filename
    #[serde(default = "defaults::filename_suffixes")]
    pub filename_suffixes: Vec<String>,
}

impl CleaningConfig {
    /// Clean a display name for captions.
    pub fn clean_name(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|word| !self.name_remove_patterns.iter().any(|p| p == word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Strip one trailing decoration word, ignoring case.
    pub fn strip_suffixes(&self, text: &str) -> String {
        let text = Self::normalize_whitespace(text);
        if self.filename_suffixes.is_empty() {
            return text;
        }
        let alternatives = self
            .filename_suffixes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&format!(r"(?i)(?:^|\s+)(?:{alternatives})\s*$")) {
            Ok(re) => re.replace(&text, "").trim().to_string(),
            Err(_) => text,
        }
    }

    fn normalize_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            name_remove_patterns: defaults::name_remove_patterns(),
            filename_suffixes: defaults::filename_suffixes(),
        }
    }
}

/// Send throttling and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Pause after each delivered resource
    #[serde(default = "defaults::send_delay")]
    pub send_delay_secs: u64,

    /// Extra pause after each module's batch
    #[serde(default = "defaults::module_delay")]
    pub module_delay_secs: u64,

    /// Attempts per send when the channel keeps rate limiting
    #[serde(default = "defaults::max_send_attempts")]
    pub max_send_attempts: u32,

    /// Longest single rate-limit wait we are willing to honor
    #[serde(default = "defaults::max_retry_after")]
    pub max_retry_after_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_delay_secs: defaults::send_delay(),
            module_delay_secs: defaults::module_delay(),
            max_send_attempts: defaults::max_send_attempts(),
            max_retry_after_secs: defaults::max_retry_after(),
        }
    }
}

/// Daily trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily check, `HH:MM`
    #[serde(default = "defaults::daily_at")]
    pub daily_at: String,
}

impl ScheduleConfig {
    pub fn time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M")
            .map_err(|e| AppError::validation(format!("schedule.daily_at '{}': {e}", self.daily_at)))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: defaults::daily_at(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl PathsConfig {
    /// Scratch directory for downloaded artifacts.
    pub fn download_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Portal defaults
    pub fn base_url() -> String {
        "https://elearning.univ-constantine2.dz/elearning/".into()
    }
    pub fn login_url() -> String {
        "https://elearning.univ-constantine2.dz/elearning/login/index.php".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn session_expired_markers() -> Vec<String> {
        vec!["loginerrors".into(), "You are not logged in".into()]
    }
    pub fn login_failure_markers() -> Vec<String> {
        vec!["loginerrors".into(), "Invalid login".into()]
    }

    // Telegram defaults
    pub fn telegram_api() -> String {
        "https://api.telegram.org".into()
    }

    // Classifier defaults
    pub fn document_content_types() -> Vec<String> {
        vec!["application/pdf".into()]
    }
    pub fn document_extension() -> String {
        ".pdf".into()
    }
    pub fn drive_patterns() -> Vec<String> {
        vec!["drive.google.com".into()]
    }
    pub fn drive_download_template() -> String {
        "https://drive.google.com/uc?export=download&id={id}".into()
    }
    pub fn video_patterns() -> Vec<String> {
        vec!["youtube.com".into(), "youtu.be".into()]
    }
    pub fn wrapper_patterns() -> Vec<String> {
        vec!["url/view.php".into(), "resource/view.php".into()]
    }

    // Cleaning defaults
    pub fn name_remove_patterns() -> Vec<String> {
        vec!["URL".into(), "Fichier".into()]
    }
    pub fn filename_suffixes() -> Vec<String> {
        ["Fichier", "URL", "Dossier", "Document", "File", "Link", "Resource"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    // Delivery defaults
    pub fn send_delay() -> u64 {
        3
    }
    pub fn module_delay() -> u64 {
        2
    }
    pub fn max_send_attempts() -> u32 {
        3
    }
    pub fn max_retry_after() -> u64 {
        300
    }

    // Schedule defaults
    pub fn daily_at() -> String {
        "08:00".into()
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
}
