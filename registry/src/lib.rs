//! Persisted, encrypted registry of the endpoints a client may fail over between.

pub mod config;
pub mod key;
pub mod metrics_defs;
pub mod registry;
pub mod store;
pub mod types;

pub use registry::EndpointRegistry;
pub use types::Endpoint;

use config::EndpointStoreType;
use std::sync::Arc;
use store::{EndpointStore, FilesystemEndpointStore, MemoryEndpointStore};

pub fn get_store(store_type: &EndpointStoreType) -> Arc<dyn EndpointStore> {
    match store_type {
        EndpointStoreType::Filesystem {
            base_dir,
            blob_filename,
            key_filename,
        } => Arc::new(FilesystemEndpointStore::new(
            base_dir,
            blob_filename,
            key_filename,
        )),
        EndpointStoreType::Memory => Arc::new(MemoryEndpointStore::new()),
    }
}

/// Builds a registry from configuration. Nothing is read from the store until
/// the first [`EndpointRegistry::load`].
pub fn from_config(config: &config::Config) -> EndpointRegistry {
    EndpointRegistry::new(get_store(&config.store))
}
