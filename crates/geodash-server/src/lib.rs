pub mod config;
pub mod handlers;
pub mod mapconfig_store;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, MapConfigsConfig, ServerConfig, StorageConfig};
pub use mapconfig_store::{MapConfigStore, MapConfigStoreError, TokenProvider};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, GeodashServer, build_app};
