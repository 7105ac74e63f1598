use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, InsertManyError, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use tracing::debug;

use super::{Collection, DocumentStore, IndexSpec, StoreError};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed store. The driver pools connections internally, so one instance is
/// constructed at startup and shared by every request.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        debug!(database, "mongodb client constructed");
        Ok(Self {
            database: client.database(database),
        })
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection(collection.name())
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(value: mongodb::error::Error) -> Self {
        let duplicate = match value.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(failure))
                if failure.code == DUPLICATE_KEY_CODE =>
            {
                Some(failure.message.clone())
            }
            ErrorKind::InsertMany(InsertManyError {
                write_errors: Some(failures),
                ..
            }) => failures
                .iter()
                .find(|failure| failure.code == DUPLICATE_KEY_CODE)
                .map(|failure| failure.message.clone()),
            _ => None,
        };
        match duplicate {
            Some(message) => Self::Duplicate(message),
            None => Self::Backend(value.to_string()),
        }
    }
}

fn object_id(value: &Bson) -> Result<ObjectId, StoreError> {
    value
        .as_object_id()
        .ok_or_else(|| StoreError::Backend(format!("store returned a non-ObjectId key: {value}")))
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let handle = self.collection(collection);
        let mut action = handle.find(filter);
        if let Some(sort) = sort {
            action = action.sort(sort);
        }
        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collection(collection)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<ObjectId, StoreError> {
        let result = self.collection(collection).insert_one(document).await?;
        object_id(&result.inserted_id)
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<Vec<ObjectId>, StoreError> {
        let result = self.collection(collection).insert_many(documents).await?;
        let mut inserted: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        inserted.sort_by_key(|(index, _)| *index);
        inserted.iter().map(|(_, id)| object_id(id)).collect()
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        changes: Document,
    ) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": changes })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        Ok(self
            .collection(collection)
            .count_documents(doc! {})
            .await?)
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self.collection(collection).aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<(), StoreError> {
        let model = if index.unique {
            IndexModel::builder()
                .keys(index.keys.clone())
                .options(IndexOptions::builder().unique(true).build())
                .build()
        } else {
            IndexModel::builder().keys(index.keys.clone()).build()
        };
        let created = self
            .collection(index.collection)
            .create_index(model)
            .await?;
        debug!(
            collection = index.collection.name(),
            index = %created.index_name,
            "index ensured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    /// Needs a reachable server: `MONGODB_URI=mongodb://localhost:27017/ cargo test -- --ignored`.
    async fn scratch_store() -> MongoStore {
        let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must point at a test server");
        let database = format!("realty_listings_test_{}", ObjectId::new().to_hex());
        MongoStore::connect(&uri, &database)
            .await
            .expect("client constructs")
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB server"]
    async fn round_trips_against_a_live_server() {
        let store = scratch_store().await;

        let ids = store
            .insert_many(
                Collection::Properties,
                vec![
                    doc! { "title": "Loft", "city": "Chicago", "price": 450000_i64 },
                    doc! { "title": "Villa", "city": "Chicago", "price": 1200000_i64 },
                    doc! { "title": "Cabin", "city": "Denver", "price": 280000_i64 },
                ],
            )
            .await
            .expect("insert");
        assert_eq!(ids.len(), 3);

        let chicago = store
            .find(
                Collection::Properties,
                doc! { "city": "Chicago" },
                Some(doc! { "price": -1 }),
            )
            .await
            .expect("find");
        let titles: Vec<&str> = chicago.iter().map(|d| d.get_str("title").unwrap()).collect();
        assert_eq!(titles, ["Villa", "Loft"]);

        assert!(store
            .update_by_id(Collection::Properties, ids[0], doc! { "price": 475000_i64 })
            .await
            .expect("update"));
        let loft = store
            .find_by_id(Collection::Properties, ids[0])
            .await
            .expect("find_by_id")
            .expect("loft exists");
        assert_eq!(loft.get_i64("price").unwrap(), 475000);

        let rows = store
            .aggregate(
                Collection::Properties,
                vec![
                    doc! { "$group": { "_id": "$city", "count": { "$sum": 1 } } },
                    doc! { "$sort": { "count": -1 } },
                ],
            )
            .await
            .expect("aggregate");
        assert_eq!(rows[0].get_str("_id").unwrap(), "Chicago");

        assert!(store
            .delete_by_id(Collection::Properties, ids[2])
            .await
            .expect("delete"));
        assert_eq!(store.count(Collection::Properties).await.unwrap(), 2);

        store.database.drop().await.expect("drop scratch database");
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB server"]
    async fn duplicate_emails_surface_as_duplicate_errors() {
        let store = scratch_store().await;
        seed::initialize(&store).await.expect("bootstrap");

        let err = store
            .insert_one(
                Collection::Agents,
                doc! { "name": "Copy", "email": "john.smith@realty.com" },
            )
            .await
            .expect_err("unique index rejects");
        assert!(matches!(err, StoreError::Duplicate(_)));

        store.database.drop().await.expect("drop scratch database");
    }
}
