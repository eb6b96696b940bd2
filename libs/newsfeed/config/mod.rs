use hubsockets::core::endpoint::{EndpointDescriptor, SubscriptionDescriptor};
use hubsockets::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Auth token for the feed
pub const ENV_FTOKEN: &str = "FEED_FTOKEN";
/// JSON object of cookies sent with every request
pub const ENV_COOKIES_JSON: &str = "FEED_COOKIES_JSON";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Upper bound for any configured duration (one day)
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Feed client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: EndpointSection,
    pub reconnect: ReconnectSection,
    pub logging: LoggingConfig,

    /// Auth token from .env (not in YAML)
    #[serde(skip)]
    pub auth_token: Option<String>,

    /// Cookies from .env (not in YAML)
    #[serde(skip)]
    pub cookies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    pub http_base: String,
    /// Derived from `http_base` when absent
    pub ws_base: Option<String>,
    /// Raw JSON or percent-encoded hub list
    pub connection_data: String,
    pub callback: String,
    pub origin: String,
    pub user_agent: String,
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            http_base: "https://ws1.financialjuice.com".to_string(),
            ws_base: None,
            connection_data: r#"[{"name":"newshub"}]"#.to_string(),
            callback: "jQuery1124018846644728821516_1759907136799".to_string(),
            origin: "https://www.financialjuice.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            extra_headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSection {
    pub max_retries: u32,
    pub base_backoff_secs: f64,
    pub max_backoff_secs: f64,
    pub jitter_ratio: f64,
    pub open_timeout_secs: f64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub require_start_success: bool,
    pub start_includes_auth: bool,
    pub http_timeout_secs: u64,
    pub http_retries: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        let defaults = SupervisorConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_backoff_secs: defaults.base_backoff.as_secs_f64(),
            max_backoff_secs: defaults.max_backoff.as_secs_f64(),
            jitter_ratio: defaults.jitter_ratio,
            open_timeout_secs: defaults.open_timeout.as_secs_f64(),
            heartbeat_interval_secs: defaults.heartbeat_interval.as_secs(),
            heartbeat_timeout_secs: defaults.heartbeat_timeout.as_secs(),
            require_start_success: defaults.require_start_success,
            start_includes_auth: defaults.start_includes_auth,
            http_timeout_secs: defaults.http_timeout.as_secs(),
            http_retries: defaults.http_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl FeedConfig {
    /// Load configuration from a YAML file and .env
    ///
    /// A missing file falls back to built-in defaults.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = if path.exists() {
            let yaml_content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&yaml_content)?
        } else {
            info!("Config file {} not found, using defaults", path.display());
            FeedConfig::default()
        };

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FeedConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Pull secrets from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var(ENV_FTOKEN) {
            self.auth_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Ok(raw) = std::env::var(ENV_COOKIES_JSON) {
            self.cookies = parse_cookies(&raw)?;
        }
        Ok(())
    }

    /// Auth token or `EnvVarMissing`
    pub fn require_auth_token(&self) -> Result<&str> {
        self.auth_token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing(ENV_FTOKEN.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base = &self.endpoint.http_base;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint.http_base must be an http(s) URL, got {}",
                base
            )));
        }

        SubscriptionDescriptor::parse(&self.endpoint.connection_data)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let r = &self.reconnect;
        for (name, secs) in [
            ("base_backoff_secs", r.base_backoff_secs),
            ("max_backoff_secs", r.max_backoff_secs),
            ("open_timeout_secs", r.open_timeout_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 || secs > MAX_DURATION_SECS {
                return Err(ConfigError::ValidationError(format!(
                    "reconnect.{} must be in (0, {}], got {}",
                    name, MAX_DURATION_SECS, secs
                )));
            }
        }
        for (name, secs) in [
            ("heartbeat_interval_secs", r.heartbeat_interval_secs),
            ("heartbeat_timeout_secs", r.heartbeat_timeout_secs),
            ("http_timeout_secs", r.http_timeout_secs),
        ] {
            if secs as f64 > MAX_DURATION_SECS {
                return Err(ConfigError::ValidationError(format!(
                    "reconnect.{} must be at most {}, got {}",
                    name, MAX_DURATION_SECS, secs
                )));
            }
        }
        if r.max_backoff_secs < r.base_backoff_secs {
            return Err(ConfigError::ValidationError(
                "reconnect.max_backoff_secs must be >= base_backoff_secs".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&r.jitter_ratio) {
            return Err(ConfigError::ValidationError(
                "reconnect.jitter_ratio must be between 0 and 1".to_string(),
            ));
        }
        if r.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if r.heartbeat_timeout_secs >= r.heartbeat_interval_secs {
            warn!(
                "heartbeat_timeout_secs ({}) >= heartbeat_interval_secs ({}); a lost pong is only noticed after the next ping",
                r.heartbeat_timeout_secs, r.heartbeat_interval_secs
            );
        }

        Ok(())
    }

    /// Build the immutable endpoint descriptor
    pub fn endpoint(&self) -> Result<EndpointDescriptor> {
        let e = &self.endpoint;
        let subscription = SubscriptionDescriptor::parse(&e.connection_data)
            .map_err(|err| ConfigError::ValidationError(err.to_string()))?;

        let mut builder = EndpointDescriptor::builder(&e.http_base)
            .subscription(subscription)
            .callback(&e.callback)
            .origin(&e.origin)
            .user_agent(&e.user_agent)
            .cookies(self.cookies.clone())
            .auth_token(self.auth_token.clone());
        if let Some(ws_base) = &e.ws_base {
            builder = builder.ws_base(ws_base);
        }
        for (name, value) in &e.extra_headers {
            builder = builder.header(name, value);
        }

        builder
            .build()
            .map_err(|err| ConfigError::ValidationError(err.to_string()))
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        let r = &self.reconnect;
        SupervisorConfig {
            max_retries: r.max_retries,
            base_backoff: Duration::from_secs_f64(r.base_backoff_secs),
            max_backoff: Duration::from_secs_f64(r.max_backoff_secs),
            jitter_ratio: r.jitter_ratio,
            open_timeout: Duration::from_secs_f64(r.open_timeout_secs),
            heartbeat_interval: Duration::from_secs(r.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(r.heartbeat_timeout_secs),
            require_start_success: r.require_start_success,
            start_includes_auth: r.start_includes_auth,
            http_timeout: Duration::from_secs(r.http_timeout_secs),
            http_retries: r.http_retries,
            ..SupervisorConfig::default()
        }
    }
}

/// Parse a JSON object of cookie names to values
pub fn parse_cookies(raw: &str) -> Result<BTreeMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        ConfigError::ValidationError(format!("{} must be a JSON object: {}", ENV_COOKIES_JSON, e))
    })?;
    let object = value.as_object().ok_or_else(|| {
        ConfigError::ValidationError(format!("{} must be a JSON object", ENV_COOKIES_JSON))
    })?;

    Ok(object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect())
}
