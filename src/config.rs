//! Environment-sourced configuration for both services
//!
//! All settings are read once at startup into plain config structs; nothing
//! here is a process-wide singleton.

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_port(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// cTrader host environment (demo or live accounts live on separate hosts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVariant {
    Demo,
    Live,
}

impl HostVariant {
    pub fn hostname(&self) -> &'static str {
        match self {
            HostVariant::Demo => "demo.ctraderapi.com",
            HostVariant::Live => "live.ctraderapi.com",
        }
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_lowercase().as_str() {
            "demo" => Ok(HostVariant::Demo),
            "live" => Ok(HostVariant::Live),
            _ => Err(ConfigError::Invalid("CTRADER_HOST", raw.to_string())),
        }
    }
}

// JSON-over-WebSocket port of the Open API endpoints
const CTRADER_WS_PORT: u16 = 5036;

/// Credentials and endpoint for the cTrader Open API session
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub account_id: i64,
    pub access_token: String,
    pub host: HostVariant,
    /// Listen port for the webhook HTTP server
    pub listen_port: u16,
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let account_raw = required("CTRADER_ACCOUNT_ID")?;
        let account_id = account_raw
            .parse()
            .map_err(|_| ConfigError::Invalid("CTRADER_ACCOUNT_ID", account_raw.clone()))?;

        let host = match env::var("CTRADER_HOST") {
            Ok(raw) => HostVariant::parse(&raw)?,
            Err(_) => HostVariant::Demo,
        };

        Ok(Self {
            client_id: required("CTRADER_CLIENT_ID")?,
            client_secret: required("CTRADER_CLIENT_SECRET")?,
            account_id,
            access_token: required("CTRADER_ACCESS_TOKEN")?,
            host,
            listen_port: parse_port("PORT", 8000)?,
        })
    }

    /// WebSocket URL of the configured Open API host
    pub fn endpoint(&self) -> String {
        format!("wss://{}:{}", self.host.hostname(), CTRADER_WS_PORT)
    }
}

/// Settings for the news ingestion/query service
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub database_url: String,
    /// Table holding news-sentiment rows
    pub news_table: String,
    pub alpha_vantage_api_key: String,
    pub listen_port: u16,
}

impl NewsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // DATABASE_URL wins; otherwise compose from the POSTGRES_* quintet
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => format!(
                "postgresql://{}:{}@{}:{}/{}",
                required("POSTGRES_USERNAME")?,
                required("POSTGRES_PASSWORD")?,
                required("POSTGRES_HOST")?,
                required("POSTGRES_PORT")?,
                required("POSTGRES_DB")?,
            ),
        };

        Ok(Self {
            database_url,
            news_table: required("NEWS_TABLE")?,
            alpha_vantage_api_key: required("ALPHA_VANTAGE_API_KEY")?,
            listen_port: parse_port("NEWS_PORT", 8001)?,
        })
    }
}
