//! Entity CRUD service.
//!
//! One service instance per entity kind (persons, organizations, events,
//! sources, websites), all sharing the same generic implementation over a
//! [`DocumentStore`]. Construction ensures the kind's vertex partition
//! exists.

use std::sync::Arc;

use crate::error::{EntigraphError, Result};
use crate::store::{Document, DocumentStore, JsonObject};

/// The entity kinds served out of the box.
pub const ENTITY_COLLECTIONS: [&str; 5] =
    ["persons", "organizations", "events", "sources", "websites"];

/// Generic per-collection CRUD over entity vertex documents. Document bodies
/// are opaque JSON objects; only the collection name and store-assigned key
/// participate in addressing.
pub struct EntityService<S> {
    store: Arc<S>,
    collection: String,
}

impl<S: DocumentStore> EntityService<S> {
    /// Create a service for one entity kind, ensuring its vertex partition.
    pub async fn new(store: Arc<S>, collection: &str) -> Result<Self> {
        store.ensure_vertex_partition(collection).await?;
        log::info!("Initialized collection {}", collection);
        Ok(Self {
            store,
            collection: collection.to_string(),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Document> {
        log::info!("Getting {} with key: {}", self.collection, key);
        self.store
            .read(&self.collection, key)
            .await
            .map_err(|e| self.translate(e, key, "read"))
    }

    /// Create an entity document. Caller-supplied identity fields are
    /// discarded; the store assigns `key` and `rev`.
    pub async fn create(&self, body: JsonObject) -> Result<Document> {
        log::info!("Creating {} document", self.collection);
        self.store.insert(&self.collection, body).await.map_err(|e| {
            log::error!("failed to create {} document: {}", self.collection, e);
            e
        })
    }

    /// Merge-patch the document at `key`; only supplied fields overwrite.
    pub async fn update(&self, key: &str, patch: JsonObject) -> Result<Document> {
        log::info!("Updating {} with key: {}", self.collection, key);
        self.store
            .merge_patch(&self.collection, key, patch)
            .await
            .map_err(|e| self.translate(e, key, "update"))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        log::info!("Deleting {} with key: {}", self.collection, key);
        self.store
            .remove(&self.collection, key)
            .await
            .map_err(|e| self.translate(e, key, "delete"))
    }

    fn translate(&self, e: EntigraphError, key: &str, operation: &str) -> EntigraphError {
        match e {
            EntigraphError::NotFound(_) => {
                log::info!("{} not found for {}: {}", self.collection, operation, key);
                EntigraphError::NotFound("Entity not found".to_string())
            }
            other => {
                log::error!(
                    "failed to {} {} document {}: {}",
                    operation,
                    self.collection,
                    key,
                    other
                );
                other
            }
        }
    }
}
