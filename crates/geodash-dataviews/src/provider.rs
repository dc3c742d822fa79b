use async_trait::async_trait;
use std::sync::Arc;

use geodash_core::{MapConfig, Result};

/// Supplies the compiled map configuration a request runs against.
///
/// Map configurations are immutable once compiled, so providers hand out
/// shared references rather than copies.
#[async_trait]
pub trait MapConfigProvider: Send + Sync {
    async fn get_map_config(&self) -> Result<Arc<MapConfig>>;
}

/// Provider over an already loaded configuration.
#[derive(Debug, Clone)]
pub struct StaticMapConfigProvider {
    config: Arc<MapConfig>,
}

impl StaticMapConfigProvider {
    pub fn new(config: impl Into<Arc<MapConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }
}

#[async_trait]
impl MapConfigProvider for StaticMapConfigProvider {
    async fn get_map_config(&self) -> Result<Arc<MapConfig>> {
        Ok(Arc::clone(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_shares_the_config() {
        let provider = StaticMapConfigProvider::new(MapConfig::default());
        let first = tokio_test::block_on(provider.get_map_config()).unwrap();
        let second = tokio_test::block_on(provider.get_map_config()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
