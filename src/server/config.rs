use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("TELEGRAM_API_TOKEN is required")]
    MissingToken,
    #[error("Failed to read config file at {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub telegram_api_token: String,
    pub telegram_api_url: String,
    pub listen_addr: SocketAddr,
    pub data_file: PathBuf,
    pub log_dir: PathBuf,
    pub send_timeout: Duration,
    pub poll_timeout: Duration,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    telegram_api_token: Option<String>,
    telegram_api_url: Option<String>,
    listen_addr: Option<String>,
    data_file: Option<String>,
    log_dir: Option<String>,
    send_timeout_secs: Option<u64>,
    poll_timeout_secs: Option<u64>,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_data_file() -> String {
    "users.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

impl ServerConfig {
    /// Builds the config from an optional TOML file, with environment
    /// variables taking precedence over file values.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => read_config_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::from_env()?;

        Self::merge(env_config, file_config)
    }

    fn merge(
        env_config: PartialServerConfig,
        file_config: PartialServerConfig,
    ) -> Result<Self, ConfigError> {
        let telegram_api_token = env_config
            .telegram_api_token
            .or(file_config.telegram_api_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let listen_addr = env_config
            .listen_addr
            .or(file_config.listen_addr)
            .unwrap_or_else(default_listen_addr);
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "listen_addr",
                value: listen_addr.clone(),
            })?;

        let telegram_api_url = env_config
            .telegram_api_url
            .or(file_config.telegram_api_url)
            .unwrap_or_else(default_telegram_api_url)
            .trim_end_matches('/')
            .to_string();

        Ok(ServerConfig {
            telegram_api_token,
            telegram_api_url,
            listen_addr,
            data_file: env_config
                .data_file
                .or(file_config.data_file)
                .unwrap_or_else(default_data_file)
                .into(),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir)
                .into(),
            send_timeout: Duration::from_secs(
                env_config
                    .send_timeout_secs
                    .or(file_config.send_timeout_secs)
                    .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            ),
            poll_timeout: Duration::from_secs(
                env_config
                    .poll_timeout_secs
                    .or(file_config.poll_timeout_secs)
                    .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            ),
        })
    }
}

fn read_config_file(path: &Path) -> Result<PartialServerConfig, ConfigError> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}
