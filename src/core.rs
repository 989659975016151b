//! Core markethaus coordination.
//!
//! The coordinator owns the storage strategy selected at construction time
//! and the service container, and hands out record stores bound to the
//! active backend.

use std::sync::Arc;

use active_record::{RecordStore, Schema, StorageBackend};
use config::{AppConfig, StorageDriver};
use document_store::DocumentDatabase;
use service_container::Container;
use sql_store::SqlDatabase;

use crate::errors::MarkethausError;

/// Main coordinator wiring configuration, storage, and services together.
///
/// The backend is chosen once from `storage.driver`; every store handed out
/// afterwards talks to that backend. Connections are owned values and cheap
/// to clone, never ambient statics.
pub struct Markethaus {
    backend: StorageBackend,
    container: Arc<Container>,
}

impl Markethaus {
    /// Build the coordinator from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self, MarkethausError> {
        config.validate()?;
        let backend = match config.storage.driver {
            StorageDriver::Postgres => {
                StorageBackend::Sql(SqlDatabase::connect(&config.database)?)
            }
            StorageDriver::Mongodb => {
                StorageBackend::Document(DocumentDatabase::connect(&config.document).await?)
            }
        };
        tracing::info!(driver = ?config.storage.driver, "storage backend ready");
        Ok(Self {
            backend,
            container: Arc::new(Container::new()),
        })
    }

    /// Wrap an already-connected backend, for callers that manage their own
    /// connections
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            container: Arc::new(Container::new()),
        }
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Shared service container for application-level bindings
    pub fn container(&self) -> Arc<Container> {
        self.container.clone()
    }

    /// Hand out a record store for the schema, bound to the active backend
    pub fn store<S: Schema>(&self) -> RecordStore<S> {
        RecordStore::new(self.backend.clone())
    }

    /// Round-trip to the active backend to confirm it answers
    pub async fn health_check(&self) -> Result<(), MarkethausError> {
        self.backend.health_check().await?;
        Ok(())
    }
}
