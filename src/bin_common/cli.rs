//! CLI utilities for binaries
//!
//! Handles configuration loading, environment variables and command-line
//! overrides for all binary executables.

use anyhow::{bail, Context};
use newsfeed::config::parse_cookies;
use newsfeed::FeedConfig;
use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Feed client configuration (feed_config.yaml)
    Feed,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Feed => "config/feed_config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Feed => "FEED_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Command-line overrides on top of the YAML file and environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub ftoken: Option<String>,
    pub connection_data: Option<String>,
    pub callback: Option<String>,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    /// JSON object of cookie names to values
    pub cookies: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: bool,
    pub log_file: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub help: bool,
}

impl CliOptions {
    pub const USAGE: &'static str = "\
Options:
  --config <path>            YAML config (default: $FEED_CONFIG_PATH or config/feed_config.yaml)
  --ftoken <token>           Auth token (default: $FEED_FTOKEN)
  --connection-data <json>   Hub list, raw or percent-encoded JSON
  --callback <name>          JSONP callback for negotiate
  --origin <url>             Origin header
  --user-agent <ua>          User-Agent header
  --cookies <json>           JSON object of cookies
  --log-level <filter>       Log filter, e.g. info or hubsockets=debug
  --json-logs                Emit JSON log lines
  --log-file <path>          Also write logs to a file
  --max-retries <n>          Attempts after the first before giving up
  -h, --help                 Show this help";

    pub fn from_env() -> anyhow::Result<Self> {
        Self::parse(&parse_args())
    }

    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut options = CliOptions::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
                _ => (arg.as_str(), None),
            };
            let mut value = |name: &str| -> anyhow::Result<String> {
                match inline.clone() {
                    Some(v) => Ok(v),
                    None => iter
                        .next()
                        .cloned()
                        .with_context(|| format!("{} expects a value", name)),
                }
            };

            match flag {
                "--config" => options.config = Some(value(flag)?.into()),
                "--ftoken" => options.ftoken = Some(value(flag)?),
                "--connection-data" => options.connection_data = Some(value(flag)?),
                "--callback" => options.callback = Some(value(flag)?),
                "--origin" => options.origin = Some(value(flag)?),
                "--user-agent" => options.user_agent = Some(value(flag)?),
                "--cookies" => options.cookies = Some(value(flag)?),
                "--log-level" => options.log_level = Some(value(flag)?),
                "--log-file" => options.log_file = Some(value(flag)?.into()),
                "--max-retries" => {
                    let raw = value(flag)?;
                    options.max_retries = Some(
                        raw.parse()
                            .with_context(|| format!("--max-retries: invalid number {:?}", raw))?,
                    );
                }
                "--json-logs" => options.json_logs = true,
                "-h" | "--help" => options.help = true,
                other => bail!("unknown argument {:?}\n\n{}", other, Self::USAGE),
            }
        }

        Ok(options)
    }

    /// Path of the YAML file to read
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| load_config_from_env(ConfigType::Feed))
    }

    /// Load the YAML file and environment, then apply these overrides
    pub fn load_feed_config(&self) -> anyhow::Result<FeedConfig> {
        let path = self.config_path();
        let mut config = FeedConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut FeedConfig) -> anyhow::Result<()> {
        if let Some(token) = &self.ftoken {
            config.auth_token = Some(token.clone()).filter(|t| !t.trim().is_empty());
        }
        if let Some(cookies) = &self.cookies {
            config.cookies = parse_cookies(cookies)?;
        }
        if let Some(v) = &self.connection_data {
            config.endpoint.connection_data = v.clone();
        }
        if let Some(v) = &self.callback {
            config.endpoint.callback = v.clone();
        }
        if let Some(v) = &self.origin {
            config.endpoint.origin = v.clone();
        }
        if let Some(v) = &self.user_agent {
            config.endpoint.user_agent = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.logging.level = v.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
        if let Some(v) = &self.log_file {
            config.logging.file = Some(v.clone());
        }
        if let Some(v) = self.max_retries {
            config.reconnect.max_retries = v;
        }
        Ok(())
    }
}
