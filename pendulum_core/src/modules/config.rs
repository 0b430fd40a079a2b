use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PLUGIN_NAME: &str = "VTS Pendulum";
pub const DEFAULT_PLUGIN_DEVELOPER: &str = "Octorizotto";
pub const DEFAULT_TOKEN_PATH: &str = "./token.txt";
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct PendulumConfig {
    pub ws_url: String,
    pub plugin_name: String,
    pub plugin_developer: String,
    pub token_path: PathBuf,
    pub tick_rate_hz: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid websocket url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("tick rate must be between 1 and 1000 Hz, got {0}")]
    InvalidTickRate(u32),
    #[error("{name} is not a number: {value:?}")]
    NotANumber { name: &'static str, value: String },
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            ws_url: vts_protocol::DEFAULT_WS_URL.to_string(),
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            plugin_developer: DEFAULT_PLUGIN_DEVELOPER.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }
}

impl PendulumConfig {
    /// Defaults overridden by `VTS_WS_URL`, `VTS_TOKEN_PATH` and
    /// `PENDULUM_TICK_HZ`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("VTS_WS_URL") {
            let url = url.trim();
            if !url.is_empty() {
                cfg.ws_url = url.to_string();
            }
        }
        if let Ok(path) = std::env::var("VTS_TOKEN_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                cfg.token_path = PathBuf::from(path);
            }
        }
        if let Ok(hz) = std::env::var("PENDULUM_TICK_HZ") {
            cfg.tick_rate_hz = hz.trim().parse().map_err(|_| ConfigError::NotANumber {
                name: "PENDULUM_TICK_HZ",
                value: hz.clone(),
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.ws_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.ws_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: self.ws_url.clone(),
                reason: "scheme must be ws or wss".to_string(),
            });
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate_hz));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}
