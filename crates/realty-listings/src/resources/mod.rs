//! List/get/create/update/delete over one collection per entity.
//!
//! Each entity supplies a [`Resource`] description: its collection, the typed create and
//! patch payloads, and how list query parameters become a store filter. The handlers in
//! [`handlers`] are written once against that description.

pub mod handlers;
pub mod router;

use bson::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::Collection;

pub use router::resource_router;

pub trait Resource: Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Singular display name used in not-found and deletion messages.
    const LABEL: &'static str;
    /// Route prefix, e.g. `/api/properties`.
    const PATH: &'static str;

    /// Body accepted on create; entity defaults are applied while deserializing.
    type Create: DeserializeOwned + Serialize + Send + 'static;
    /// Body accepted on update; absent fields serialize to nothing and so stay untouched.
    type Patch: DeserializeOwned + Serialize + Send + 'static;
    type Query: DeserializeOwned + Send + 'static;

    fn filter(query: &Self::Query) -> Document;

    fn sort(_query: &Self::Query) -> Option<Document> {
        None
    }
}
