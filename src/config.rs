use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const CONFIG_FILE: &str = "calreport.toml";
const ENV_PREFIX: &str = "CALREPORT_";

/// Application settings
///
/// Resolved from built-in defaults, then `calreport.toml` in the working
/// directory, then `CALREPORT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,

    /// Directory holding `users.json` and saved form sessions
    pub database_dir: PathBuf,

    /// Lifetime of an issued login token, in seconds
    pub token_ttl_secs: u64,

    /// Account created at start-up when missing from the user store
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    /// Size of rendered charts in pixels
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            database_dir: PathBuf::from("database"),
            token_ttl_secs: 24 * 60 * 60, // 24 hours
            admin_username: None,
            admin_password: None,
            chart_width: 800,
            chart_height: 600,
        }
    }
}

impl AppConfig {
    /// Layered configuration sources, lowest priority first
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::figment().extract()?)
    }

    pub fn users_file(&self) -> PathBuf {
        self.database_dir.join("users.json")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.database_dir.join("sessions")
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}
