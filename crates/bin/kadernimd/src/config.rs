//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `kadernim.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values. Delivery sections (`[smtp]`, `[whatsapp]`,
//! `[push]`) are optional; a missing section leaves that channel disabled.

use std::time::Duration;

use serde::Deserialize;

use kadernim_adapter_delivery::{PushRelayConfig, SmtpConfig, WhatsAppConfig};
use kadernim_app::worker::RetryPolicies;
use kadernim_domain::context::AppInfo;
use kadernim_domain::durable::{MAX_RETRIES, RetryPolicy};

const CONFIG_FILE: &str = "kadernim.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Product identity exposed to templates.
    pub app: AppConfig,
    pub smtp: Option<SmtpSection>,
    pub whatsapp: Option<WhatsAppSection>,
    pub push: Option<PushSection>,
    /// Retry budgets of the durable worker.
    pub worker: WorkerConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub url: String,
}

/// SMTP server used for email actions and OTP codes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WhatsAppSection {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushSection {
    pub relay_url: String,
    pub token: Option<String>,
}

/// Retry budgets, in retries after the first attempt.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub event_retries: u32,
    pub otp_retries: u32,
    pub campaign_retries: u32,
    pub retry_backoff_secs: u64,
}

impl Config {
    /// Load configuration from `kadernim.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("KADERNIM_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("KADERNIM_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("KADERNIM_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("KADERNIM_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("KADERNIM_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("KADERNIM_APP_NAME") {
            self.app.name = val;
        }
        if let Some(val) = var("KADERNIM_APP_URL") {
            self.app.url = val;
        }

        if let Some(host) = var("SMTP_HOST") {
            let smtp = self.smtp.get_or_insert_with(SmtpSection::default);
            smtp.host = host;
        }
        if let Some(smtp) = self.smtp.as_mut() {
            if let Some(port) = var("SMTP_PORT").and_then(|v| v.parse().ok()) {
                smtp.port = port;
            }
            if let Some(val) = var("SMTP_FROM") {
                smtp.from = val;
            }
            if let Some(val) = var("SMTP_USER") {
                smtp.user = Some(val);
            }
            if let Some(val) = var("SMTP_PASSWORD") {
                smtp.password = Some(val);
            }
        }

        if let Some(url) = var("WHATSAPP_GATEWAY_URL") {
            self.whatsapp.get_or_insert_with(WhatsAppSection::default).url = url;
        }
        if let (Some(whatsapp), Some(token)) =
            (self.whatsapp.as_mut(), var("WHATSAPP_GATEWAY_TOKEN"))
        {
            whatsapp.token = Some(token);
        }

        if let Some(url) = var("PUSH_RELAY_URL") {
            self.push.get_or_insert_with(PushSection::default).relay_url = url;
        }
        if let (Some(push), Some(token)) = (self.push.as_mut(), var("PUSH_RELAY_TOKEN")) {
            push.token = Some(token);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        for (name, retries) in [
            ("event_retries", self.worker.event_retries),
            ("otp_retries", self.worker.otp_retries),
            ("campaign_retries", self.worker.campaign_retries),
        ] {
            if retries > MAX_RETRIES {
                return Err(ConfigError::Validation(format!(
                    "worker.{name} must be at most {MAX_RETRIES}"
                )));
            }
        }
        if self.smtp.as_ref().is_some_and(|s| s.host.trim().is_empty()) {
            return Err(ConfigError::Validation("smtp.host must not be empty".to_string()));
        }
        if self.whatsapp.as_ref().is_some_and(|w| w.url.trim().is_empty()) {
            return Err(ConfigError::Validation("whatsapp.url must not be empty".to_string()));
        }
        if self.push.as_ref().is_some_and(|p| p.relay_url.trim().is_empty()) {
            return Err(ConfigError::Validation("push.relay_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            name: self.app.name.clone(),
            url: self.app.url.clone(),
        }
    }
}

impl WorkerConfig {
    /// Build the worker's retry policies.
    ///
    /// # Errors
    ///
    /// Returns an error when a budget exceeds the maximum.
    pub fn retry_policies(&self) -> Result<RetryPolicies, ConfigError> {
        let backoff = Duration::from_secs(self.retry_backoff_secs);
        let policy = |retries| {
            RetryPolicy::new(retries, backoff).map_err(|e| ConfigError::Validation(e.to_string()))
        };
        Ok(RetryPolicies {
            otp: policy(self.otp_retries)?,
            campaign: policy(self.campaign_retries)?,
            events: policy(self.event_retries)?,
        })
    }
}

impl From<SmtpSection> for SmtpConfig {
    fn from(section: SmtpSection) -> Self {
        Self {
            host: section.host,
            port: section.port,
            from: section.from,
            user: section.user,
            password: section.password,
            starttls: section.starttls,
        }
    }
}

impl From<WhatsAppSection> for WhatsAppConfig {
    fn from(section: WhatsAppSection) -> Self {
        Self {
            url: section.url,
            token: section.token,
        }
    }
}

impl From<PushSection> for PushRelayConfig {
    fn from(section: PushSection) -> Self {
        Self {
            relay_url: section.relay_url,
            token: section.token,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:kadernim.db".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "kadernimd=info,kadernim=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let app = AppInfo::default();
        Self {
            name: app.name,
            url: app.url,
        }
    }
}

impl Default for SmtpSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: kadernim_adapter_delivery::email::DEFAULT_SMTP_PORT,
            from: "Kadernim <noreply@kadernim.com.br>".to_string(),
            user: None,
            password: None,
            starttls: true,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            event_retries: 3,
            otp_retries: 1,
            campaign_retries: 3,
            retry_backoff_secs: 1,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
