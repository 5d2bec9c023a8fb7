pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod http;
pub mod id;
pub mod relationships;
pub mod resolver;
pub mod store;

pub use config::Config;
pub use error::{EntigraphError, Result};
pub use relationships::{Relationship, RelationshipEngine};
