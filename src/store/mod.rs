//! Document store abstraction.
//!
//! The graph engine talks to storage exclusively through [`DocumentStore`]:
//! get-or-create partitions by name, and per-document read/insert/
//! merge-patch/remove scoped to a named partition. Keeping the backend
//! behind this capability interface means the engine never depends on a
//! query dialect and tests can run fully independent store instances.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::id;

mod sqlite;

pub use sqlite::SqliteStore;

/// A JSON document body, without identity fields.
pub type JsonObject = Map<String, Value>;

/// Document identity fields; always store-assigned, stripped from any
/// caller-supplied body or patch before it touches storage.
pub const IDENTITY_FIELDS: [&str; 3] = ["id", "key", "rev"];

/// A stored document together with its store-assigned identity.
#[derive(Debug, Clone)]
pub struct Document {
    /// Global id, `"<partition>/<key>"`.
    pub id: String,
    /// Store-assigned key, unique within the partition.
    pub key: String,
    /// Opaque change token; refreshed on every write.
    pub rev: String,
    pub body: JsonObject,
}

impl Document {
    pub fn new(partition: &str, key: String, rev: String, body: JsonObject) -> Self {
        Self {
            id: id::format(partition, &key),
            key,
            rev,
            body,
        }
    }

    /// Flatten into a single JSON object with the identity fields included.
    pub fn into_json(mut self) -> JsonObject {
        self.body.insert("id".to_string(), Value::String(self.id));
        self.body.insert("key".to_string(), Value::String(self.key));
        self.body.insert("rev".to_string(), Value::String(self.rev));
        self.body
    }
}

/// Remove identity fields from a caller-supplied body or patch.
pub fn strip_identity_fields(body: &mut JsonObject) {
    for field in IDENTITY_FIELDS {
        body.remove(field);
    }
}

/// Per-collection document operations over a document-oriented graph backend.
///
/// All partition-provisioning operations are idempotent: a race-induced
/// "already exists" is success, not error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get-or-create a partition holding documents of one entity kind.
    async fn ensure_vertex_partition(&self, name: &str) -> Result<()>;

    /// Get-or-create a partition holding directed relationship documents,
    /// constrained so that edges in it may only originate from `from_coll`
    /// and terminate in `to_coll`.
    async fn ensure_edge_partition(&self, name: &str, from_coll: &str, to_coll: &str)
        -> Result<()>;

    /// Read the document at `key`, or `NotFound`.
    async fn read(&self, partition: &str, key: &str) -> Result<Document>;

    /// Insert a document, assigning `key` and `rev`.
    async fn insert(&self, partition: &str, body: JsonObject) -> Result<Document>;

    /// Merge-patch the document at `key`: every field present in `patch`
    /// overwrites the stored value, all other fields are untouched. Returns
    /// the post-merge document with a fresh `rev`, or `NotFound`.
    async fn merge_patch(&self, partition: &str, key: &str, patch: JsonObject)
        -> Result<Document>;

    /// Remove the document at `key`, or `NotFound`.
    async fn remove(&self, partition: &str, key: &str) -> Result<()>;
}
