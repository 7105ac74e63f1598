use std::collections::HashMap;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use tokio::sync::RwLock;

use super::query::{self, values_equal};
use super::{pipeline, Collection, DocumentStore, IndexSpec, StoreError};

#[derive(Default)]
struct CollectionData {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl CollectionData {
    fn position(&self, id: ObjectId) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| doc.get_object_id("_id").ok() == Some(id))
    }

    /// Reject `candidate` if it collides on a unique field with any document other than `skip`.
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        for field in &self.unique_fields {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, existing)| existing.get(field).is_some_and(|v| values_equal(v, value)));
            if clash {
                return Err(StoreError::Duplicate(format!("{field}: {value}")));
            }
        }
        Ok(())
    }
}

/// Process-local document store. Collections live for the lifetime of the value.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, CollectionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn with_identifier(document: Document) -> (ObjectId, Document) {
    let id = match document.get("_id") {
        Some(Bson::ObjectId(id)) => *id,
        _ => ObjectId::new(),
    };
    let mut stored = Document::new();
    stored.insert("_id", id);
    for (key, value) in document {
        if key != "_id" {
            stored.insert(key, value);
        }
    }
    (id, stored)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let mut found = Vec::new();
        if let Some(data) = guard.get(&collection) {
            for document in &data.documents {
                if query::matches(document, &filter)? {
                    found.push(document.clone());
                }
            }
        }
        if let Some(sort) = sort {
            query::sort_documents(&mut found, &sort)?;
        }
        Ok(found)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .and_then(|data| data.position(id).map(|index| data.documents[index].clone())))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<ObjectId, StoreError> {
        let mut ids = self.insert_many(collection, vec![document]).await?;
        ids.pop()
            .ok_or_else(|| StoreError::Backend("insert produced no identifier".to_string()))
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<Vec<ObjectId>, StoreError> {
        let mut guard = self.collections.write().await;
        let data = guard.entry(collection).or_default();
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            let (id, stored) = with_identifier(document);
            if data.position(id).is_some() {
                return Err(StoreError::Duplicate(format!("_id: {id}")));
            }
            data.check_unique(&stored, None)?;
            data.documents.push(stored);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        changes: Document,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(data) = guard.get_mut(&collection) else {
            return Ok(false);
        };
        let Some(index) = data.position(id) else {
            return Ok(false);
        };

        let mut merged = data.documents[index].clone();
        for (key, value) in changes {
            if key == "_id" {
                return Err(StoreError::Backend(
                    "the _id field cannot be modified".to_string(),
                ));
            }
            merged.insert(key, value);
        }
        data.check_unique(&merged, Some(index))?;
        data.documents[index] = merged;
        Ok(true)
    }

    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(data) = guard.get_mut(&collection) else {
            return Ok(false);
        };
        match data.position(id) {
            Some(index) => {
                data.documents.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .map_or(0, |data| data.documents.len() as u64))
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = {
            let guard = self.collections.read().await;
            guard
                .get(&collection)
                .map(|data| data.documents.clone())
                .unwrap_or_default()
        };
        pipeline::run(documents, &pipeline)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<(), StoreError> {
        if !index.unique {
            return Ok(());
        }
        if index.keys.len() != 1 {
            return Err(StoreError::Backend(
                "compound unique indexes are not supported in memory".to_string(),
            ));
        }
        let mut guard = self.collections.write().await;
        let data = guard.entry(index.collection).or_default();
        for field in index.keys.keys() {
            if data.unique_fields.contains(field) {
                continue;
            }
            let mut seen: Vec<&Bson> = Vec::new();
            for document in &data.documents {
                if let Some(value) = document.get(field) {
                    if seen.iter().any(|existing| values_equal(existing, value)) {
                        return Err(StoreError::Duplicate(format!("{field}: {value}")));
                    }
                    seen.push(value);
                }
            }
            data.unique_fields.push(field.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn insert_assigns_identifier_first() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Users, doc! { "name": "Alice Cooper" })
            .await
            .unwrap();
        let stored = store
            .find_by_id(Collection::Users, id)
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored.get_object_id("_id").unwrap(), id);
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates_on_insert_and_update() {
        let store = MemoryStore::new();
        store
            .create_index(&IndexSpec::ascending(Collection::Agents, &["email"]).unique())
            .await
            .unwrap();
        store
            .insert_one(Collection::Agents, doc! { "email": "a@realty.com" })
            .await
            .unwrap();
        let second = store
            .insert_one(Collection::Agents, doc! { "email": "b@realty.com" })
            .await
            .unwrap();

        let err = store
            .insert_one(Collection::Agents, doc! { "email": "a@realty.com" })
            .await
            .expect_err("duplicate insert");
        assert!(matches!(err, StoreError::Duplicate(_)));

        let err = store
            .update_by_id(Collection::Agents, second, doc! { "email": "a@realty.com" })
            .await
            .expect_err("duplicate update");
        assert!(matches!(err, StoreError::Duplicate(_)));

        assert!(store
            .update_by_id(Collection::Agents, second, doc! { "email": "b@realty.com" })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_records() {
        let store = MemoryStore::new();
        let missing = ObjectId::new();
        assert!(!store
            .update_by_id(Collection::Properties, missing, doc! { "price": 1 })
            .await
            .unwrap());
        assert!(!store
            .delete_by_id(Collection::Properties, missing)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn insert_many_preserves_order() {
        let store = MemoryStore::new();
        let ids = store
            .insert_many(
                Collection::Properties,
                vec![doc! { "title": "first" }, doc! { "title": "second" }],
            )
            .await
            .unwrap();
        let all = store
            .find(Collection::Properties, Document::new(), None)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(all[0].get_object_id("_id").unwrap(), ids[0]);
        assert_eq!(all[1].get_str("title").unwrap(), "second");
        assert_eq!(store.count(Collection::Properties).await.unwrap(), 2);
    }
}
