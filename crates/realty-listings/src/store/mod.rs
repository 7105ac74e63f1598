//! Store gateway: the four listing collections and the operations the HTTP layer needs from
//! the document store.
//!
//! Every operation is a single store call. Filters, sorts and aggregation pipelines are plain
//! BSON documents so the MongoDB driver can execute them natively; [`MemoryStore`] evaluates
//! the same documents in-process for tests and local demos.

mod memory;
mod mongo;
mod pipeline;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::Document;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Handle shared by every request handler.
pub type SharedStore = Arc<dyn DocumentStore>;

/// The persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Properties,
    Agents,
    Users,
    Inquiries,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Properties,
        Collection::Agents,
        Collection::Users,
        Collection::Inquiries,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Properties => "properties",
            Collection::Agents => "agents",
            Collection::Users => "users",
            Collection::Inquiries => "inquiries",
        }
    }
}

/// Secondary index definition applied during bootstrap.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub collection: Collection,
    pub keys: Document,
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(collection: Collection, fields: &[&str]) -> Self {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(*field, 1_i32);
        }
        Self {
            collection,
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Storage abstraction over the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return every document matching `filter`, ordered by `sort` when given.
    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError>;

    /// Persist a document; the store assigns the identifier.
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<ObjectId, StoreError>;

    /// Persist documents in order, returning their identifiers in the same order.
    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<Vec<ObjectId>, StoreError>;

    /// Merge `changes` onto the document. Returns `false` when nothing matched `id`.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        changes: Document,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when nothing matched `id`.
    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> Result<bool, StoreError>;

    async fn count(&self, collection: Collection) -> Result<u64, StoreError>;

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn create_index(&self, index: &IndexSpec) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("'{0}' is not a valid ObjectId, it must be a 12-byte input or a 24-character hex string")]
    InvalidId(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("{0}")]
    Backend(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<bson::ser::Error> for StoreError {
    fn from(value: bson::ser::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(value: bson::de::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Parse the textual form of a record identifier.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| StoreError::InvalidId(raw.to_string()))
}

/// Build the store selected by configuration. Called once at startup.
pub async fn connect(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    match config.backend {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(&config.uri, &config.database).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::default())),
    }
}
