use crate::cache::CacheConfig;
use crate::{Error, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the event stream carrying workshop item updates.
pub const WORKSHOP_ITEM_EVENT: &str = "WorkshopItem";

/// Prefix of environment variables that override the configuration,
/// e.g. `ADDON_STORE_CACHE__CACHE_FAILURES=false`.
pub const ENV_PREFIX: &str = "ADDON_STORE_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Applied to all four resource caches
    pub cache: CacheConfig,
    /// Event name the reconciler listens for
    pub workshop_event: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            workshop_event: WORKSHOP_ITEM_EVENT.to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults, then the YAML file at `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(StoreConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }

        let config: StoreConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        if config.workshop_event.trim().is_empty() {
            return Err(Error::Config("workshop_event must not be empty".to_string()));
        }

        log::debug!("Loaded store configuration: {:?}", config);
        Ok(config)
    }
}
