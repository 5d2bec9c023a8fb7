//! SQLite-backed document store.
//!
//! Each partition is one SQL table `(key, rev, body)` with the document body
//! stored as a JSON object. A `partitions` registry table records every
//! partition's kind and, for edge partitions, its endpoint-kind constraints.
//! Partition names are validated against a restricted alphabet before they
//! are ever interpolated into SQL.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{EntigraphError, Result};
use crate::id;
use crate::store::{strip_identity_fields, Document, DocumentStore, JsonObject};

use async_trait::async_trait;

/// SQLite implementation of [`DocumentStore`].
pub struct SqliteStore {
    db: Db,
}

/// Validate a partition name against the restricted alphabet: an ASCII
/// letter first, then ASCII letters, digits, underscores or hyphens.
fn validate_partition_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());
    if valid_first && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(EntigraphError::InvalidArgument(format!(
            "invalid partition name: {}",
            name
        )))
    }
}

/// Registry row for a partition.
struct RegistryEntry {
    kind: String,
    from_coll: Option<String>,
    to_coll: Option<String>,
}

fn registry_entry(conn: &Connection, name: &str) -> Result<Option<RegistryEntry>> {
    conn.query_row(
        "SELECT kind, from_coll, to_coll FROM partitions WHERE name = ?1",
        [name],
        |row| {
            Ok(RegistryEntry {
                kind: row.get(0)?,
                from_coll: row.get(1)?,
                to_coll: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(EntigraphError::Database)
}

fn create_partition_table(conn: &Connection, name: &str) -> Result<()> {
    // Name is validated before this point; quoting keeps SQLite keywords usable.
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\
                 key TEXT PRIMARY KEY, \
                 rev TEXT NOT NULL, \
                 body TEXT NOT NULL\
             )",
            name
        ),
        [],
    )?;
    Ok(())
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create the partition registry. Idempotent; run once at startup.
    pub async fn init(&self) -> Result<()> {
        self.db
            .with_connection(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS partitions (\
                         name TEXT PRIMARY KEY, \
                         kind TEXT NOT NULL CHECK (kind IN ('vertex', 'edge')), \
                         from_coll TEXT, \
                         to_coll TEXT\
                     )",
                    [],
                )?;
                Ok(())
            })
            .await
    }

    /// Check that a document destined for an edge partition satisfies the
    /// partition's endpoint-kind constraints. Only the collection names of
    /// the endpoints are checked; whether the endpoint documents exist is
    /// deliberately not verified.
    fn check_edge_constraints(entry: &RegistryEntry, body: &JsonObject) -> Result<()> {
        for (field, constraint) in [("from", &entry.from_coll), ("to", &entry.to_coll)] {
            let Some(expected) = constraint else { continue };
            let endpoint = body
                .get(field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    EntigraphError::InvalidArgument(format!("edge document missing '{}'", field))
                })?;
            let (collection, _) = id::parse(endpoint)?;
            if collection != expected.as_str() {
                return Err(EntigraphError::InvalidArgument(format!(
                    "edge endpoint '{}' must be in collection '{}', got '{}'",
                    field, expected, collection
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn ensure_vertex_partition(&self, name: &str) -> Result<()> {
        validate_partition_name(name)?;
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                create_partition_table(conn, &name)?;
                // INSERT OR IGNORE makes a racing "already exists" a success.
                conn.execute(
                    "INSERT INTO partitions (name, kind) VALUES (?1, 'vertex') \
                     ON CONFLICT (name) DO NOTHING",
                    [&name],
                )?;
                match registry_entry(conn, &name)? {
                    Some(entry) if entry.kind == "vertex" => Ok(()),
                    Some(entry) => Err(EntigraphError::Internal(format!(
                        "partition {} already registered as {}",
                        name, entry.kind
                    ))),
                    None => Err(EntigraphError::Internal(format!(
                        "partition {} missing from registry after creation",
                        name
                    ))),
                }
            })
            .await
    }

    async fn ensure_edge_partition(
        &self,
        name: &str,
        from_coll: &str,
        to_coll: &str,
    ) -> Result<()> {
        validate_partition_name(name)?;
        validate_partition_name(from_coll)?;
        validate_partition_name(to_coll)?;
        let name = name.to_string();
        let from_coll = from_coll.to_string();
        let to_coll = to_coll.to_string();
        self.db
            .with_connection(move |conn| {
                create_partition_table(conn, &name)?;
                conn.execute(
                    "INSERT INTO partitions (name, kind, from_coll, to_coll) \
                     VALUES (?1, 'edge', ?2, ?3) \
                     ON CONFLICT (name) DO NOTHING",
                    params![name, from_coll, to_coll],
                )?;
                match registry_entry(conn, &name)? {
                    Some(entry)
                        if entry.kind == "edge"
                            && entry.from_coll.as_deref() == Some(from_coll.as_str())
                            && entry.to_coll.as_deref() == Some(to_coll.as_str()) =>
                    {
                        Ok(())
                    }
                    Some(_) => Err(EntigraphError::Internal(format!(
                        "partition {} already registered with different constraints",
                        name
                    ))),
                    None => Err(EntigraphError::Internal(format!(
                        "partition {} missing from registry after creation",
                        name
                    ))),
                }
            })
            .await
    }

    async fn read(&self, partition: &str, key: &str) -> Result<Document> {
        validate_partition_name(partition)?;
        let partition = partition.to_string();
        let key = key.to_string();
        self.db
            .with_connection(move |conn| {
                let (rev, body): (String, String) = conn
                    .query_row(
                        &format!("SELECT rev, body FROM \"{}\" WHERE key = ?1", partition),
                        [&key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => EntigraphError::NotFound(
                            format!("document {} not found", id::format(&partition, &key)),
                        ),
                        other => EntigraphError::Database(other),
                    })?;
                let body: JsonObject = serde_json::from_str(&body)?;
                Ok(Document::new(&partition, key, rev, body))
            })
            .await
    }

    async fn insert(&self, partition: &str, mut body: JsonObject) -> Result<Document> {
        validate_partition_name(partition)?;
        strip_identity_fields(&mut body);
        let partition = partition.to_string();
        self.db
            .with_connection(move |conn| {
                if let Some(entry) = registry_entry(conn, &partition)? {
                    if entry.kind == "edge" {
                        Self::check_edge_constraints(&entry, &body)?;
                    }
                }
                let key = new_token();
                let rev = new_token();
                let serialized = serde_json::to_string(&body)?;
                conn.execute(
                    &format!(
                        "INSERT INTO \"{}\" (key, rev, body) VALUES (?1, ?2, ?3)",
                        partition
                    ),
                    params![key, rev, serialized],
                )?;
                Ok(Document::new(&partition, key, rev, body))
            })
            .await
    }

    async fn merge_patch(
        &self,
        partition: &str,
        key: &str,
        mut patch: JsonObject,
    ) -> Result<Document> {
        validate_partition_name(partition)?;
        strip_identity_fields(&mut patch);
        let partition = partition.to_string();
        let key = key.to_string();
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let stored: String = tx
                    .query_row(
                        &format!("SELECT body FROM \"{}\" WHERE key = ?1", partition),
                        [&key],
                        |row| row.get(0),
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => EntigraphError::NotFound(
                            format!("document {} not found", id::format(&partition, &key)),
                        ),
                        other => EntigraphError::Database(other),
                    })?;
                let mut body: JsonObject = serde_json::from_str(&stored)?;
                for (field, value) in patch {
                    body.insert(field, value);
                }
                let rev = new_token();
                let serialized = serde_json::to_string(&body)?;
                tx.execute(
                    &format!("UPDATE \"{}\" SET rev = ?1, body = ?2 WHERE key = ?3", partition),
                    params![rev, serialized, key],
                )?;
                tx.commit()?;
                Ok(Document::new(&partition, key, rev, body))
            })
            .await
    }

    async fn remove(&self, partition: &str, key: &str) -> Result<()> {
        validate_partition_name(partition)?;
        let partition = partition.to_string();
        let key = key.to_string();
        self.db
            .with_connection(move |conn| {
                let removed = conn.execute(
                    &format!("DELETE FROM \"{}\" WHERE key = ?1", partition),
                    [&key],
                )?;
                if removed == 0 {
                    return Err(EntigraphError::NotFound(format!(
                        "document {} not found",
                        id::format(&partition, &key)
                    )));
                }
                Ok(())
            })
            .await
    }
}
