use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use geodash_dataviews::DataviewSettings;
use geodash_db_postgres::PostgresConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Dataview engine settings
    #[serde(default)]
    pub dataviews: DataviewSettings,
    #[serde(default)]
    pub mapconfigs: MapConfigsConfig,
}

impl AppConfig {
    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::from((ip, self.server.port))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.storage.postgres.pool_size == 0 {
            return Err("storage.postgres.pool_size must be > 0".into());
        }
        if self.storage.postgres.url.trim().is_empty() {
            return Err("storage.postgres.url must not be empty".into());
        }
        // Dataview validations
        let dataviews = &self.dataviews;
        if dataviews.max_bins == 0 {
            return Err("dataviews.max_bins must be > 0".into());
        }
        if dataviews.default_categories == 0 {
            return Err("dataviews.default_categories must be > 0".into());
        }
        if dataviews.search_limit == 0 {
            return Err("dataviews.search_limit must be > 0".into());
        }
        if dataviews.tile_size == 0 {
            return Err("dataviews.tile_size must be > 0".into());
        }
        if dataviews.zoom_level_expr.trim().is_empty() {
            return Err("dataviews.zoom_level_expr must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8181
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where compiled map configurations are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfigsConfig {
    #[serde(default = "default_mapconfigs_dir")]
    pub dir: PathBuf,
}
fn default_mapconfigs_dir() -> PathBuf {
    PathBuf::from("mapconfigs")
}
impl Default for MapConfigsConfig {
    fn default() -> Self {
        Self {
            dir: default_mapconfigs_dir(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "geodash.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., GEODASH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("GEODASH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
