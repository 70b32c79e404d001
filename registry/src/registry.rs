use crate::metrics_defs::{REGISTRY_ENDPOINTS, REGISTRY_LOAD_FALLBACK, REGISTRY_UPDATE};
use crate::store::{EndpointStore, StoreError};
use crate::types::{Endpoint, default_endpoints, sort_by_priority};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use shared::{counter, gauge};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("could not read endpoint list: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse endpoint list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not store endpoint list: {0}")]
    Store(#[from] StoreError),
}

/// Holds the current endpoint list.
///
/// The list is loaded from the store on first use and cached for the lifetime
/// of the registry. Reads share the cache; replacements are serialized and
/// only become visible once the store has accepted them.
pub struct EndpointRegistry {
    store: Arc<dyn EndpointStore>,
    cache: RwLock<Option<Arc<Vec<Endpoint>>>>,
    // Serializes store writes and the initial load.
    update_lock: Mutex<()>,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn EndpointStore>) -> Self {
        EndpointRegistry {
            store,
            cache: RwLock::new(None),
            update_lock: Mutex::new(()),
        }
    }

    /// Returns the endpoints in ascending priority order.
    ///
    /// Never fails. If the persisted list is missing, unreadable, or does not
    /// authenticate, the built-in default list is returned (and cached) instead.
    pub fn load(&self) -> Arc<Vec<Endpoint>> {
        if let Some(cached) = self.cache.read().as_ref() {
            return cached.clone();
        }

        let _guard = self.update_lock.lock();

        // Another caller may have filled the cache while we waited
        if let Some(cached) = self.cache.read().as_ref() {
            return cached.clone();
        }

        let endpoints = Arc::new(self.load_from_store());
        gauge!(REGISTRY_ENDPOINTS).set(endpoints.len() as f64);
        *self.cache.write() = Some(endpoints.clone());
        endpoints
    }

    fn load_from_store(&self) -> Vec<Endpoint> {
        let mut endpoints = match self.store.load() {
            Ok(Some(endpoints)) => {
                tracing::info!(count = endpoints.len(), "Loaded persisted endpoint list");
                endpoints
            }
            Ok(None) => {
                tracing::info!("No persisted endpoint list, using the default list");
                counter!(REGISTRY_LOAD_FALLBACK).increment(1);
                default_endpoints()
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "Could not load persisted endpoint list, using the default list"
                );
                counter!(REGISTRY_LOAD_FALLBACK).increment(1);
                default_endpoints()
            }
        };

        sort_by_priority(&mut endpoints);
        endpoints
    }

    /// Persists `endpoints` and makes them the current list.
    ///
    /// Returns false if the store rejected the write; the previous list stays
    /// in effect both on disk and in memory.
    pub fn save(&self, endpoints: &[Endpoint]) -> bool {
        match self.replace(endpoints) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = %err, "Could not store endpoint list");
                false
            }
        }
    }

    /// Replaces the endpoint list with `candidate`, which must be a JSON array
    /// of endpoint records. Anything else is rejected without touching state.
    pub fn update(&self, candidate: &serde_json::Value) -> bool {
        let endpoints = match Vec::<Endpoint>::deserialize(candidate) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected malformed endpoint list");
                counter!(REGISTRY_UPDATE, "result" => "rejected").increment(1);
                return false;
            }
        };

        tracing::info!(count = endpoints.len(), "Updating endpoint list");

        let saved = self.save(&endpoints);
        let result = if saved { "applied" } else { "failed" };
        counter!(REGISTRY_UPDATE, "result" => result).increment(1);
        saved
    }

    /// Reads a plaintext JSON endpoint list from `path` and stores it sealed,
    /// replacing the current list. Returns the number of endpoints imported.
    pub fn import_plaintext(&self, path: &Path) -> Result<usize, ImportError> {
        let contents = fs::read(path)?;
        let endpoints: Vec<Endpoint> = serde_json::from_slice(&contents)?;
        self.replace(&endpoints)?;

        tracing::info!(path = ?path, count = endpoints.len(), "Imported endpoint list");
        Ok(endpoints.len())
    }

    fn replace(&self, endpoints: &[Endpoint]) -> Result<(), StoreError> {
        let _guard = self.update_lock.lock();

        self.store.store(endpoints)?;

        let mut sorted = endpoints.to_vec();
        sort_by_priority(&mut sorted);
        gauge!(REGISTRY_ENDPOINTS).set(sorted.len() as f64);
        *self.cache.write() = Some(Arc::new(sorted));
        Ok(())
    }
}
