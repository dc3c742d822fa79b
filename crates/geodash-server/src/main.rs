use std::env;

use geodash_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use geodash_server::{GeodashServer, observability};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    CliArgument,
    EnvironmentVariable,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (GEODASH_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(path) = arg.strip_prefix("--config=") {
            return (path.to_string(), ConfigSource::CliArgument);
        }
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }
    match env::var("GEODASH_CONFIG") {
        Ok(path) if !path.is_empty() => (path, ConfigSource::EnvironmentVariable),
        _ => (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = load_config(Some(&config_path)).map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(path = %config_path, source = %source, "Configuration loaded");

    observability::apply_logging_level(&cfg.logging.level);

    GeodashServer::from_config(&cfg).await?.run().await
}
