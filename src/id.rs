//! Global document id addressing.
//!
//! Every document in the graph is reachable by a global id of the form
//! `"<collection>/<key>"`. The collection part names a storage partition;
//! the key part is an opaque store-assigned token.

use crate::error::{EntigraphError, Result};

/// Split a global id into its `(collection, key)` parts.
///
/// Splits on the first `/` so store-assigned keys may themselves contain
/// separators. Fails if the separator is missing or either part is empty.
pub fn parse(id: &str) -> Result<(&str, &str)> {
    let (collection, key) = id
        .split_once('/')
        .ok_or_else(|| EntigraphError::InvalidArgument(format!("malformed document id: {}", id)))?;

    if collection.is_empty() || key.is_empty() {
        return Err(EntigraphError::InvalidArgument(format!(
            "malformed document id: {}",
            id
        )));
    }

    Ok((collection, key))
}

/// Build a global id from a collection name and a store-assigned key.
///
/// Only the store boundary fabricates ids; service code never invents them.
pub fn format(collection: &str, key: &str) -> String {
    format!("{}/{}", collection, key)
}
