use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::server::tokens::{self, TokenError, TokenService};

/// Secret used when none is configured. The server warns at startup.
pub const PLACEHOLDER_SECRET: &str = "CHANGE_ME_IN_PRODUCTION";

/// Service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Directory holding generic configuration files
    pub config_dir: PathBuf,
    /// Directory holding specific configuration files
    pub specific_dir: PathBuf,
    /// HMAC secret for bearer tokens
    pub token_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,
    /// Issuer claim written into tokens
    pub token_issuer: String,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            config_dir: PathBuf::from("config_files"),
            specific_dir: PathBuf::from("specific_configs"),
            token_secret: PLACEHOLDER_SECRET.to_string(),
            token_ttl_hours: 24,
            token_issuer: "confstore".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl Settings {
    /// Load settings with priority: env vars > settings file > defaults
    pub fn load(settings_path: Option<PathBuf>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let path = settings_path
            .or_else(|| std::env::var("CONFSTORE_SETTINGS").ok().map(PathBuf::from))
            .unwrap_or_else(Self::default_settings_path);
        if path.exists() {
            settings = Self::from_file(&path)?;
        }

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Read(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        if let Some(bind) = var("CONFSTORE_BIND") {
            self.bind_address = bind;
        }
        if let Some(dir) = var("CONFSTORE_CONFIG_DIR") {
            self.config_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("CONFSTORE_SPECIFIC_DIR") {
            self.specific_dir = PathBuf::from(dir);
        }
        if let Some(secret) = var("CONFSTORE_TOKEN_SECRET") {
            self.token_secret = secret;
        }
        if let Some(hours) = var("CONFSTORE_TOKEN_TTL_HOURS") {
            self.token_ttl_hours = hours.parse().map_err(|_| {
                SettingsError::Invalid(format!(
                    "CONFSTORE_TOKEN_TTL_HOURS must be an integer, got '{}'",
                    hours
                ))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.token_secret.is_empty() {
            return Err(SettingsError::Invalid(
                "token_secret must not be empty".to_string(),
            ));
        }
        tokens::ttl_hours(self.token_ttl_hours)
            .map_err(|e| SettingsError::Invalid(format!("token_ttl_hours: {}", e)))?;
        Ok(())
    }

    /// True when the token secret was never changed from the built-in value.
    pub fn uses_placeholder_secret(&self) -> bool {
        self.token_secret == PLACEHOLDER_SECRET
    }

    /// Builds the token service described by these settings.
    pub fn token_service(&self) -> Result<TokenService, TokenError> {
        TokenService::new(
            self.token_secret.as_bytes(),
            tokens::ttl_hours(self.token_ttl_hours)?,
            self.token_issuer.as_str(),
        )
    }

    /// Default settings file path: ~/.config/confstore/settings.yaml
    pub fn default_settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("confstore")
            .join("settings.yaml")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file '{}': {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse settings file '{}': {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}
