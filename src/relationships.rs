//! Relationship CRUD engine.
//!
//! Create/update/delete for directed, named edges between entity documents.
//! Update and delete address the edge purely through its opaque global id;
//! the caller never supplies a collection. Whether the entity documents named
//! by `from`/`to` actually exist is deliberately not verified.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EntigraphError, Result};
use crate::id;
use crate::resolver::{normalize_name, PartitionResolver};
use crate::store::{strip_identity_fields, Document, DocumentStore, JsonObject};

/// A directed, named relationship between two entity documents.
///
/// `id`, `key` and `rev` are store-assigned; any caller-supplied values are
/// discarded on create and stripped from update patches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub id: String,
    pub key: String,
    pub rev: String,
    pub from: String,
    pub to: String,
    pub name: String,
}

impl Relationship {
    fn from_document(doc: Document) -> Result<Self> {
        let mut relationship: Relationship =
            serde_json::from_value(Value::Object(doc.body))?;
        relationship.id = doc.id;
        relationship.key = doc.key;
        relationship.rev = doc.rev;
        Ok(relationship)
    }
}

/// Stateless relationship operations over a [`DocumentStore`], plus the
/// lazily populated partition cache inside the resolver.
pub struct RelationshipEngine<S> {
    store: Arc<S>,
    resolver: PartitionResolver<S>,
}

impl<S: DocumentStore> RelationshipEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        let resolver = PartitionResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// Create a relationship, provisioning its relation-type partition on
    /// first use. Not idempotent: repeated identical calls create distinct
    /// records.
    pub async fn create(&self, relationship: Relationship) -> Result<Relationship> {
        log::info!("Creating relationship");

        let (from_coll, _) = id::parse(&relationship.from).map_err(|e| {
            log::error!(
                "failed to parse from entity id {}: {}",
                relationship.from,
                e
            );
            EntigraphError::InvalidArgument("Bad parameter".to_string())
        })?;

        let (to_coll, _) = id::parse(&relationship.to).map_err(|e| {
            log::error!("failed to parse to entity id {}: {}", relationship.to, e);
            EntigraphError::InvalidArgument("Bad parameter".to_string())
        })?;

        let name = normalize_name(&relationship.name).map_err(|e| {
            log::error!("invalid relation name {:?}: {}", relationship.name, e);
            EntigraphError::InvalidArgument("invalid relation name".to_string())
        })?;

        let partition = self
            .resolver
            .ensure_edge_partition(from_coll, &name, to_coll)
            .await
            .map_err(|e| {
                log::error!("failed to get or create relation partition: {}", e);
                e
            })?;

        let mut body = JsonObject::new();
        body.insert("from".to_string(), Value::String(relationship.from));
        body.insert("to".to_string(), Value::String(relationship.to));
        body.insert("name".to_string(), Value::String(name));

        let doc = self.store.insert(&partition, body).await.map_err(|e| {
            log::error!("failed to create relationship document in {}: {}", partition, e);
            e
        })?;

        Relationship::from_document(doc)
    }

    /// Merge-patch the relationship addressed by `id`. Fields present in the
    /// patch overwrite stored values; identity fields are always stripped.
    pub async fn update(&self, id: &str, mut patch: JsonObject) -> Result<Relationship> {
        log::info!("Updating relationship with ID: {}", id);

        let (collection, key) = id::parse(id).map_err(|e| {
            log::error!("failed to parse relation id {}: {}", id, e);
            EntigraphError::InvalidArgument("Invalid parameter".to_string())
        })?;

        strip_identity_fields(&mut patch);

        let doc = self
            .store
            .merge_patch(collection, key, patch)
            .await
            .map_err(|e| match e {
                EntigraphError::NotFound(_) => {
                    log::info!("relationship not found for update: {}", id);
                    EntigraphError::NotFound("Relation not found".to_string())
                }
                other => {
                    log::error!("failed to update relationship {}: {}", id, other);
                    other
                }
            })?;

        Relationship::from_document(doc)
    }

    /// Remove the relationship addressed by `id`. No further operation may
    /// observe the record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        log::info!("Deleting relationship with ID: {}", id);

        let (collection, key) = id::parse(id).map_err(|e| {
            log::error!("failed to parse relation id {}: {}", id, e);
            EntigraphError::InvalidArgument("Invalid parameter".to_string())
        })?;

        self.store
            .remove(collection, key)
            .await
            .map_err(|e| match e {
                EntigraphError::NotFound(_) => {
                    log::info!("relationship not found for deletion: {}", id);
                    EntigraphError::NotFound("Relation not found".to_string())
                }
                other => {
                    log::error!("failed to delete relationship {}: {}", id, other);
                    other
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::store::SqliteStore;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_engine() -> (RelationshipEngine<SqliteStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        let store = Arc::new(SqliteStore::new(db));
        store.init().await.unwrap();
        (RelationshipEngine::new(store), temp_dir)
    }

    fn new_relationship(from: &str, to: &str, name: &str) -> Relationship {
        Relationship {
            from: from.to_string(),
            to: to.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn patch(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected JSON object"),
        }
    }

    #[tokio::test]
    async fn test_create_provisions_partition_and_normalizes_name() {
        let (engine, _temp) = setup_engine().await;

        let created = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();

        assert!(!created.id.is_empty());
        assert!(!created.key.is_empty());
        assert!(!created.rev.is_empty());
        assert_eq!(created.name, "hosted_by");
        assert_eq!(created.from, "events/e1");
        assert_eq!(created.to, "organizations/o1");
        assert!(created.id.starts_with("events_hosted_by_organizations/"));
    }

    #[tokio::test]
    async fn test_create_discards_caller_identity_fields() {
        let (engine, _temp) = setup_engine().await;

        let mut relationship =
            new_relationship("events/e1", "organizations/o1", "hosted by");
        relationship.id = "events_hosted_by_organizations/fake".to_string();
        relationship.key = "fake".to_string();
        relationship.rev = "fake".to_string();

        let created = engine.create(relationship).await.unwrap();
        assert_ne!(created.key, "fake");
        assert_ne!(created.rev, "fake");
    }

    #[tokio::test]
    async fn test_create_not_idempotent() {
        let (engine, _temp) = setup_engine().await;

        let a = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();
        let b = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();
        assert_ne!(a.key, b.key);
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (engine, _temp) = setup_engine().await;

        for relationship in [
            new_relationship("", "organizations/o1", "employment"),
            new_relationship("persons/p1", "", "employment"),
            new_relationship("persons/p1", "organizations/o1", ""),
            new_relationship("not-an-id", "organizations/o1", "employment"),
            new_relationship("persons/p1", "organizations/", "employment"),
        ] {
            let err = engine.create(relationship).await.unwrap_err();
            assert!(matches!(err, EntigraphError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_update_merges_only_supplied_fields() {
        let (engine, _temp) = setup_engine().await;

        let created = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();
        let updated = engine
            .update(&created.id, patch(json!({"name": "related"})))
            .await
            .unwrap();

        assert_eq!(updated.name, "related");
        assert_eq!(updated.from, "events/e1");
        assert_eq!(updated.to, "organizations/o1");
        assert_ne!(updated.rev, created.rev);
        assert_eq!(updated.key, created.key);
    }

    #[tokio::test]
    async fn test_update_strips_identity_fields_from_patch() {
        let (engine, _temp) = setup_engine().await;

        let created = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();
        let updated = engine
            .update(
                &created.id,
                patch(json!({"key": "hijack", "rev": "hijack", "name": "related"})),
            )
            .await
            .unwrap();

        assert_eq!(updated.key, created.key);
        assert_ne!(updated.rev, "hijack");
        assert_eq!(updated.name, "related");
    }

    #[tokio::test]
    async fn test_update_malformed_id() {
        let (engine, _temp) = setup_engine().await;
        let err = engine.update("not-an-id", JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, EntigraphError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_delete_then_update_and_delete_fail_not_found() {
        let (engine, _temp) = setup_engine().await;

        let created = engine
            .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
            .await
            .unwrap();

        engine.delete(&created.id).await.unwrap();

        let err = engine
            .update(&created.id, patch(json!({"name": "related"})))
            .await
            .unwrap_err();
        assert!(matches!(err, EntigraphError::NotFound(_)));

        let err = engine.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, EntigraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_malformed_id() {
        let (engine, _temp) = setup_engine().await;
        let err = engine.delete("not-an-id").await.unwrap_err();
        assert!(matches!(err, EntigraphError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_concurrent_create_unseen_triple() {
        let (engine, _temp) = setup_engine().await;
        let engine = Arc::new(engine);

        let first = Arc::clone(&engine);
        let second = Arc::clone(&engine);
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                first
                    .create(new_relationship("events/e1", "organizations/o1", "hosted by"))
                    .await
            }),
            tokio::spawn(async move {
                second
                    .create(new_relationship("events/e2", "organizations/o1", "hosted by"))
                    .await
            }),
        );

        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        // Both records land in the same single partition, no duplicate-partition
        // failure, no lost record.
        assert!(a.id.starts_with("events_hosted_by_organizations/"));
        assert!(b.id.starts_with("events_hosted_by_organizations/"));
        assert_ne!(a.key, b.key);
    }
}
