//! # bb-configs
//!
//! Runtime settings for the bulletin board binary.
//!
//! Sources, later ones winning:
//! 1. built-in defaults,
//! 2. an optional `bulletin-board.toml` in the working directory,
//! 3. environment variables such as `BB__STORE__BACKEND=redis`
//!    (a `.env` file is loaded into the environment first).

use bb_core::AppendMode;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Base name of the optional settings file.
pub const CONFIG_FILE: &str = "bulletin-board";
pub const ENV_PREFIX: &str = "BB";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub board: BoardSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// May carry credentials, hence secret.
    pub redis_url: SecretString,
    pub pool_size: usize,
    /// How long a request waits for a pooled connection.
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct BoardSettings {
    pub append_mode: AppendMode,
    pub max_append_attempts: usize,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Settings {
    /// Loads `.env`, the optional settings file and `BB__*` variables.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let builder = defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Defaults overlaid with an inline TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        Self::build(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.server.port == 0 {
            return Err(SettingsError::Invalid("server.port", "must be non-zero".into()));
        }
        if self.store.pool_size == 0 {
            return Err(SettingsError::Invalid("store.pool_size", "must be at least 1".into()));
        }
        if self.board.max_append_attempts == 0 {
            return Err(SettingsError::Invalid(
                "board.max_append_attempts",
                "must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5000_i64)?
        .set_default("server.static_dir", "crates/bb-ui/static")?
        .set_default("store.backend", "memory")?
        .set_default("store.redis_url", "redis://127.0.0.1:6379")?
        .set_default("store.pool_size", 16_i64)?
        .set_default("store.wait_timeout_ms", 2000_i64)?
        .set_default("board.append_mode", "optimistic")?
        .set_default("board.max_append_attempts", 16_i64)?
        .set_default("log.filter", "info")?
        .set_default("log.json", false)
}
