//! Application context handed to every component that needs shared services.
//!
//! There is no global application instance: the [`Portal`](crate::Portal)
//! owns one `AppContext` and passes it explicitly to the router and to each
//! controller invocation.

use crate::config::PortalConfig;
use crate::error::Environment;
use dashmap::DashMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key/value store contract (get/set/exists/delete with TTL).
pub trait Cache: Send + Sync {
    /// Fetch a live entry
    fn get(&self, key: &str) -> Option<String>;

    /// Store an entry; `ttl` of `None` never expires
    fn set(&self, key: &str, value: String, ttl: Option<Duration>);

    /// Check for a live entry
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove an entry, returning whether it was present
    fn delete(&self, key: &str) -> bool;
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

/// In-process [`Cache`] backed by a concurrent map.
///
/// Expired entries are dropped lazily when touched.
#[derive(Clone, Default)]
pub struct MemoryCache {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.store.get(key) {
            if entry.is_live() {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        self.store.remove(key);
        None
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.store.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }
}

/// Shared, immutable-after-startup application services.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<PortalConfig>,
    environment: Environment,
    cache: Arc<dyn Cache>,
    services: Arc<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl AppContext {
    /// Create a context with an in-memory cache and no services
    pub fn new(config: PortalConfig) -> Self {
        Self {
            config: Arc::new(config),
            environment: Environment::current(),
            cache: Arc::new(MemoryCache::new()),
            services: Arc::new(HashMap::new()),
        }
    }

    /// Replace the deployment environment
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Replace the cache backend
    pub fn with_cache<C: Cache + 'static>(mut self, cache: C) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// Register a named service. A later registration under the same name
    /// replaces the earlier one.
    pub fn register<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, service: T) {
        Arc::make_mut(&mut self.services).insert(name.into(), Arc::new(service));
    }

    /// Look up a named service of type `T`
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.services.get(name)?.clone().downcast::<T>().ok()
    }

    /// Check whether a service is registered under `name`
    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Portal configuration
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Deployment environment
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Cache backend
    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(PortalConfig::default())
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("services", &names)
            .finish()
    }
}
