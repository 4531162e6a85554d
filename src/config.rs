use crate::error::ConfigError;
use crate::range::A1Range;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref SHEET_URL_REGEX: Regex = Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").unwrap();
    static ref SHEET_ID_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

pub const DEFAULT_CONFIG_PATH: &str = "sheetdesk.toml";

/// Extract the spreadsheet id from a full URL, or accept a bare id.
pub fn extract_spreadsheet_id(url_or_id: &str) -> Result<String, ConfigError> {
    let url_or_id = url_or_id.trim();
    if let Some(caps) = SHEET_URL_REGEX.captures(url_or_id) {
        return Ok(caps[1].to_string());
    }
    if SHEET_ID_REGEX.is_match(url_or_id) {
        return Ok(url_or_id.to_string());
    }
    Err(ConfigError::InvalidSheetUrl(url_or_id.to_string()))
}

/// One logical table: a spreadsheet plus the range holding its header row
/// and data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetAddress {
    pub sheet_id: String,
    pub range: String,
}

impl SheetAddress {
    pub fn new(url_or_id: &str, range: &str) -> Result<Self, ConfigError> {
        A1Range::parse(range)?;
        Ok(Self {
            sheet_id: extract_spreadsheet_id(url_or_id)?,
            range: range.trim().to_string(),
        })
    }

    /// The range covering only the header row.
    pub fn header_range(&self) -> String {
        match A1Range::parse(&self.range) {
            Ok(r) => r.header_row().to_string(),
            Err(_) => self.range.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub api_base: String,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// URL (or id) of the spreadsheet submissions are stored in.
    pub requests_url: String,
    pub requests_range: String,
    /// URL (or id) of the sheet holding form labels and selector options.
    pub form_url: String,
    pub form_range: String,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            access_token: None,
            api_key: None,
            timeout_secs: 30,
            requests_url: String::new(),
            requests_range: "A:O".to_string(),
            form_url: String::new(),
            form_range: "A:O".to_string(),
            cache_ttl_secs: 300,
            cache_max_entries: 16,
        }
    }
}

impl SheetsConfig {
    pub fn requests_address(&self) -> Result<SheetAddress, ConfigError> {
        SheetAddress::new(&self.requests_url, &self.requests_range)
    }

    /// Form definitions fall back to the requests spreadsheet when no
    /// separate sheet is configured.
    pub fn form_address(&self) -> Result<SheetAddress, ConfigError> {
        let url = if self.form_url.trim().is_empty() {
            &self.requests_url
        } else {
            &self.form_url
        };
        SheetAddress::new(url, &self.form_range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    None,
    Telegram,
    Email,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub kind: NotifierKind,
    /// Recipients that always get a message, in addition to those listed
    /// in the form sheet.
    pub recipients: Vec<String>,
    pub use_form_recipients: bool,
    /// Upper bound on one delivery call, in seconds.
    pub timeout_secs: u64,
    pub telegram_api_base: String,
    pub telegram_token: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::None,
            recipients: Vec::new(),
            use_form_recipients: true,
            timeout_secs: 10,
            telegram_api_base: "https://api.telegram.org".to_string(),
            telegram_token: None,
            smtp_host: String::new(),
            smtp_port: 465,
            smtp_user: None,
            smtp_password: None,
            from: String::new(),
        }
    }
}

/// Column positions the dashboard reads, per deployment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardColumns {
    pub requester: usize,
    pub team: usize,
    pub topic: usize,
    pub room: usize,
    pub building: usize,
    pub zone: usize,
    pub date: usize,
}

impl Default for DashboardColumns {
    fn default() -> Self {
        Self {
            requester: 0,
            team: 1,
            topic: 2,
            room: 6,
            building: 7,
            zone: 8,
            date: 13,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Everything the process needs, built once at startup and handed to
/// constructors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sheets: SheetsConfig,
    pub notify: NotifyConfig,
    pub dashboard: DashboardColumns,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file. Call [`AppConfig::apply_env_overrides`] and
    /// [`AppConfig::validate`] afterwards.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Secrets and the bind address may come from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SHEETDESK_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = lookup("SHEETDESK_ACCESS_TOKEN") {
            self.sheets.access_token = Some(token);
        }
        if let Some(key) = lookup("SHEETDESK_API_KEY") {
            self.sheets.api_key = Some(key);
        }
        if let Some(url) = lookup("SHEETDESK_REQUESTS_URL") {
            self.sheets.requests_url = url;
        }
        if let Some(token) = lookup("SHEETDESK_TELEGRAM_TOKEN") {
            self.notify.telegram_token = Some(token);
        }
        if let Some(password) = lookup("SHEETDESK_SMTP_PASSWORD") {
            self.notify.smtp_password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sheets.requests_address()?;
        self.sheets.form_address()?;

        if self.sheets.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sheets.timeout_secs cannot be 0".to_string()));
        }
        if self.notify.timeout_secs == 0 {
            return Err(ConfigError::Invalid("notify.timeout_secs cannot be 0".to_string()));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        match self.notify.kind {
            NotifierKind::Telegram if self.notify.telegram_token.as_deref().unwrap_or("").is_empty() => Err(
                ConfigError::Invalid("notify.kind = \"telegram\" requires a telegram token".to_string()),
            ),
            NotifierKind::Email if self.notify.smtp_host.is_empty() || self.notify.from.is_empty() => Err(
                ConfigError::Invalid("notify.kind = \"email\" requires smtp_host and from".to_string()),
            ),
            _ => Ok(()),
        }
    }
}
