use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::counter::{CounterWindow, ExpiryPolicy};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_THRESHOLD: u64 = 5;
pub const DEFAULT_WINDOW_SECS: u64 = 30;
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub notification: NotificationConfig,
    pub slack: SlackConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub channel: String,
    pub threshold: u64,
    pub window_secs: u64,
    pub window_policy: ExpiryPolicy,
}

impl NotificationConfig {
    pub fn window(&self) -> CounterWindow {
        CounterWindow { ttl: Duration::from_secs(self.window_secs), policy: self.window_policy }
    }
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    pub signing_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub addr: String,
    pub password: Option<SecretString>,
    pub db: i64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen: String,
    pub admin_auth_token: Option<SecretString>,
    pub upstream_timeout_secs: u64,
}

impl ServerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub notification_channel: Option<String>,
    pub notification_threshold: Option<u64>,
    pub notification_window_secs: Option<u64>,
    pub notification_window_policy: Option<ExpiryPolicy>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base: Option<String>,
    pub store_addr: Option<String>,
    pub listen: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notification: NotificationConfig {
                channel: String::new(),
                threshold: DEFAULT_THRESHOLD,
                window_secs: DEFAULT_WINDOW_SECS,
                window_policy: ExpiryPolicy::Sliding,
            },
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base: DEFAULT_SLACK_API_BASE.to_string(),
                signing_secret: None,
            },
            store: StoreConfig { addr: String::new(), password: None, db: 0 },
            server: ServerConfig {
                listen: DEFAULT_LISTEN_ADDR.to_string(),
                admin_auth_token: None,
                upstream_timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fomo.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(notification) = patch.notification {
            if let Some(channel) = notification.channel {
                self.notification.channel = channel;
            }
            if let Some(threshold) = notification.threshold {
                self.notification.threshold = threshold;
            }
            if let Some(window_secs) = notification.window_secs {
                self.notification.window_secs = window_secs;
            }
            if let Some(window_policy) = notification.window_policy {
                self.notification.window_policy = window_policy;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(api_base) = slack.api_base {
                self.slack.api_base = api_base;
            }
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = Some(secret_value(signing_secret));
            }
        }

        if let Some(store) = patch.store {
            if let Some(addr) = store.addr {
                self.store.addr = addr;
            }
            if let Some(password) = store.password {
                self.store.password = Some(secret_value(password));
            }
            if let Some(db) = store.db {
                self.store.db = db;
            }
        }

        if let Some(server) = patch.server {
            if let Some(listen) = server.listen {
                self.server.listen = listen;
            }
            if let Some(admin_auth_token) = server.admin_auth_token {
                self.server.admin_auth_token = Some(secret_value(admin_auth_token));
            }
            if let Some(upstream_timeout_secs) = server.upstream_timeout_secs {
                self.server.upstream_timeout_secs = upstream_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NOTIFICATION_CHANNEL") {
            self.notification.channel = value;
        }
        if let Some(value) = read_env("NOTIFICATION_THRESHOLD") {
            self.notification.threshold = parse_u64("NOTIFICATION_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("NOTIFICATION_WINDOW_SECONDS") {
            self.notification.window_secs = parse_u64("NOTIFICATION_WINDOW_SECONDS", &value)?;
        }
        if let Some(value) = read_env("NOTIFICATION_WINDOW_POLICY") {
            self.notification.window_policy = value.parse()?;
        }

        if let Some(value) = read_env("CHAT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CHAT_API_BASE") {
            self.slack.api_base = value;
        }
        if let Some(value) = read_env("CHAT_SIGNING_SECRET") {
            self.slack.signing_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("STORE_ADDR") {
            self.store.addr = value;
        }
        if let Some(value) = read_env("STORE_PASSWORD") {
            self.store.password = Some(secret_value(value));
        }
        if let Some(value) = read_env("STORE_DB") {
            self.store.db = parse_i64("STORE_DB", &value)?;
        }

        if let Some(value) = read_env("LISTEN") {
            self.server.listen = value;
        }
        if let Some(value) = read_env("ADMIN_AUTH_TOKEN") {
            self.server.admin_auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("UPSTREAM_TIMEOUT_SECONDS") {
            self.server.upstream_timeout_secs = parse_u64("UPSTREAM_TIMEOUT_SECONDS", &value)?;
        }

        if let Some(value) = read_env("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(channel) = overrides.notification_channel {
            self.notification.channel = channel;
        }
        if let Some(threshold) = overrides.notification_threshold {
            self.notification.threshold = threshold;
        }
        if let Some(window_secs) = overrides.notification_window_secs {
            self.notification.window_secs = window_secs;
        }
        if let Some(window_policy) = overrides.notification_window_policy {
            self.notification.window_policy = window_policy;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(api_base) = overrides.slack_api_base {
            self.slack.api_base = api_base;
        }
        if let Some(addr) = overrides.store_addr {
            self.store.addr = addr;
        }
        if let Some(listen) = overrides.listen {
            self.server.listen = listen;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_notification(&self.notification)?;
        validate_slack(&self.slack)?;
        validate_store(&self.store)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fomo.toml"), PathBuf::from("config/fomo.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_notification(notification: &NotificationConfig) -> Result<(), ConfigError> {
    if notification.channel.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notification.channel is required (set NOTIFICATION_CHANNEL to a channel id)"
                .to_string(),
        ));
    }

    if notification.threshold == 0 {
        return Err(ConfigError::Validation(
            "notification.threshold must be greater than zero".to_string(),
        ));
    }

    if notification.window_secs == 0 || notification.window_secs > 86_400 {
        return Err(ConfigError::Validation(
            "notification.window_secs must be in range 1..=86400".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required (set CHAT_TOKEN to the app's `xoxb-` bot token)"
                .to_string(),
        ));
    }
    if bot_token.starts_with("xapp-") {
        return Err(ConfigError::Validation(
            "slack.bot_token looks like an app-level token; the Web API needs a bot token (`xoxb-`)"
                .to_string(),
        ));
    }

    if !slack.api_base.starts_with("http://") && !slack.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base must start with http:// or https://".to_string(),
        ));
    }

    if let Some(secret) = &slack.signing_secret {
        if secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "slack.signing_secret must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.addr.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.addr is required (set STORE_ADDR to `host:port`, a redis:// URL, or memory://)"
                .to_string(),
        ));
    }

    if store.db < 0 {
        return Err(ConfigError::Validation("store.db must not be negative".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "server.listen must be a socket address like `{DEFAULT_LISTEN_ADDR}`, got `{}`",
            server.listen
        )));
    }

    if server.upstream_timeout_secs == 0 || server.upstream_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "server.upstream_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    notification: Option<NotificationPatch>,
    slack: Option<SlackPatch>,
    store: Option<StorePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    channel: Option<String>,
    threshold: Option<u64>,
    window_secs: Option<u64>,
    window_policy: Option<ExpiryPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base: Option<String>,
    signing_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    addr: Option<String>,
    password: Option<String>,
    db: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    listen: Option<String>,
    admin_auth_token: Option<String>,
    upstream_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
