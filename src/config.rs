use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::provider::clouddns::{CLOUDDNS_API_BASE, CLOUDDNS_LOGIN_URL};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub clouddns: CloudDnsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub key: Option<String>,  // 访问密钥，用于鉴权（可选）
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudDnsConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Seconds.
    #[serde(default = "default_propagation_timeout")]
    pub propagation_timeout: u64,
    /// Seconds.
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
    /// Per-request timeout in seconds; unset keeps the HTTP client default.
    #[serde(default)]
    pub http_timeout: Option<u64>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Zone to use for every challenge instead of guessing it from the FQDN.
    #[serde(default)]
    pub zone: Option<String>,
}

fn default_ttl() -> u32 {
    300
}

fn default_propagation_timeout() -> u64 {
    120
}

fn default_polling_interval() -> u64 {
    5
}

fn default_api_base_url() -> String {
    CLOUDDNS_API_BASE.to_string()
}

fn default_login_url() -> String {
    CLOUDDNS_LOGIN_URL.to_string()
}

impl Default for CloudDnsConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            email: String::new(),
            password: String::new(),
            ttl: default_ttl(),
            propagation_timeout: default_propagation_timeout(),
            polling_interval: default_polling_interval(),
            http_timeout: None,
            api_base_url: default_api_base_url(),
            login_url: default_login_url(),
            zone: None,
        }
    }
}

impl Config {
    /// Reads the TOML file, then applies `CLOUDDNS_*` environment overrides
    /// and validates the result. Without an explicit path, `config.toml` is
    /// optional so credentials may come from the environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dns = &mut self.clouddns;

        if let Some(v) = lookup("CLOUDDNS_CLIENT_ID") {
            dns.client_id = v;
        }
        if let Some(v) = lookup("CLOUDDNS_EMAIL") {
            dns.email = v;
        }
        if let Some(v) = lookup("CLOUDDNS_PASSWORD") {
            dns.password = v;
        }
        if let Some(v) = lookup("CLOUDDNS_TTL") {
            dns.ttl = v
                .parse()
                .with_context(|| format!("Invalid CLOUDDNS_TTL: {}", v))?;
        }
        if let Some(v) = lookup("CLOUDDNS_PROPAGATION_TIMEOUT") {
            dns.propagation_timeout = v
                .parse()
                .with_context(|| format!("Invalid CLOUDDNS_PROPAGATION_TIMEOUT: {}", v))?;
        }
        if let Some(v) = lookup("CLOUDDNS_POLLING_INTERVAL") {
            dns.polling_interval = v
                .parse()
                .with_context(|| format!("Invalid CLOUDDNS_POLLING_INTERVAL: {}", v))?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let dns = &self.clouddns;

        if dns.client_id.is_empty() {
            bail!("clouddns: client_id missing");
        }
        if dns.email.is_empty() {
            bail!("clouddns: email missing");
        }
        if dns.password.is_empty() {
            bail!("clouddns: password missing");
        }
        if dns.ttl == 0 {
            bail!("clouddns: ttl must be positive");
        }

        Ok(())
    }
}
