//! TTL cache for `GET /config/public`.

use smm_types::settings::PublicConfig;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::store::{Store, StoreError};

#[derive(Clone, Debug)]
struct CachedConfig {
    config: PublicConfig,
    expires_at: Instant,
}

/// Cached value plus a counter bumped by every clear. A load only fills the slot if no
/// clear happened while it was reading.
#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    cached: Option<CachedConfig>,
}

/// Holds the last public config read from the store for `ttl`.
///
/// Admin writes to settings call [`PublicConfigCache::clear`], so a stale value only lives
/// until the TTL when settings are changed outside the server.
#[derive(Debug)]
pub struct PublicConfigCache {
    ttl: Duration,
    crypto_enabled: bool,
    state: RwLock<Slot>,
}

impl PublicConfigCache {
    pub fn new(ttl: Duration, crypto_enabled: bool) -> Self {
        Self {
            ttl,
            crypto_enabled,
            state: RwLock::new(Slot::default()),
        }
    }

    pub async fn get(&self) -> Option<PublicConfig> {
        let guard = self.state.read().await;
        let cached = guard.cached.as_ref()?;
        if Instant::now() < cached.expires_at {
            Some(cached.config.clone())
        } else {
            None
        }
    }

    /// Cached value, or a fresh one read from `store` on a miss.
    pub async fn get_or_load(&self, store: &dyn Store) -> Result<PublicConfig, StoreError> {
        if let Some(config) = self.get().await {
            return Ok(config);
        }
        let generation = self.state.read().await.generation;
        let config = PublicConfig {
            settings: store.get_settings().await?,
            crypto_enabled: self.crypto_enabled,
        };
        self.fill(generation, config.clone()).await;
        Ok(config)
    }

    async fn fill(&self, generation: u64, config: PublicConfig) {
        let mut slot = self.state.write().await;
        if slot.generation != generation {
            tracing::debug!("Settings changed during load, not caching");
            return;
        }
        slot.cached = Some(CachedConfig {
            config,
            expires_at: Instant::now() + self.ttl,
        });
        tracing::debug!(ttl = ?self.ttl, "Public config refreshed");
    }

    pub async fn clear(&self) {
        let mut slot = self.state.write().await;
        slot.generation = slot.generation.wrapping_add(1);
        slot.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use smm_types::settings::Settings;

    fn named(site_name: &str) -> Settings {
        Settings {
            site_name: site_name.to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn serves_cached_value_until_cleared() {
        let store = MemoryStore::new();
        store.put_settings(named("First")).await.unwrap();
        let cache = PublicConfigCache::new(Duration::from_secs(60), true);

        let config = cache.get_or_load(&store).await.unwrap();
        assert_eq!(config.settings.site_name, "First");
        assert!(config.crypto_enabled);

        store.put_settings(named("Second")).await.unwrap();
        assert_eq!(
            cache.get_or_load(&store).await.unwrap().settings.site_name,
            "First"
        );

        cache.clear().await;
        assert_eq!(
            cache.get_or_load(&store).await.unwrap().settings.site_name,
            "Second"
        );
    }

    #[tokio::test]
    async fn clear_during_load_discards_the_loaded_value() {
        let store = MemoryStore::new();
        store.put_settings(named("Old")).await.unwrap();
        let cache = PublicConfigCache::new(Duration::from_secs(60), false);

        let generation = cache.state.read().await.generation;
        let loaded = PublicConfig {
            settings: store.get_settings().await.unwrap(),
            crypto_enabled: false,
        };
        store.put_settings(named("New")).await.unwrap();
        cache.clear().await;
        cache.fill(generation, loaded).await;

        assert!(cache.get().await.is_none());
        assert_eq!(
            cache.get_or_load(&store).await.unwrap().settings.site_name,
            "New"
        );
        assert_eq!(cache.get().await.unwrap().settings.site_name, "New");
    }

    #[tokio::test]
    async fn zero_ttl_always_reloads() {
        let store = MemoryStore::new();
        let cache = PublicConfigCache::new(Duration::ZERO, false);
        cache.get_or_load(&store).await.unwrap();
        assert!(cache.get().await.is_none());
    }
}
