//! MongoDB client and collection wrapper
//!
//! Typed collections with schema-declared indexes, soft deletion, and an
//! optimistic-concurrency `modify_one` keyed on `metadata.revision`.

use bson::{doc, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use crate::db::schemas::Metadata;
use crate::types::ViviError;

/// Attempts made by [`MongoCollection::modify_one`] before giving up
pub const MAX_MODIFY_ATTEMPTS: usize = 5;

/// Server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Whether a driver error is a unique index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, ViviError> {
        info!("Connecting to MongoDB");

        // Fail fast on an unreachable server instead of hanging start-up
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ViviError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let mongo = Self {
            client,
            db_name: db_name.to_string(),
        };
        mongo.ping().await?;

        info!(db = db_name, "Connected to MongoDB");
        Ok(mongo)
    }

    pub async fn ping(&self) -> Result<(), ViviError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ViviError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, ViviError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Sort, skip and limit for [`MongoCollection::find_page`]
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, ViviError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };
        mongo_collection.apply_indexes().await?;
        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), ViviError> {
        let schema_indices = T::into_indices();
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| ViviError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping fresh metadata
    pub async fn insert_one(&self, mut item: T) -> Result<T, ViviError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.deleted_at = None;
        metadata.revision = 0;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        self.inner.insert_one(&item).await?;
        Ok(item)
    }

    /// Find one live (not soft-deleted) document
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, ViviError> {
        let filter = live(filter);
        Ok(self.inner.find_one(filter).await?)
    }

    /// Find live documents
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, ViviError> {
        self.find_page(filter, Page::default()).await
    }

    /// Find live documents with sort and pagination
    pub async fn find_page(&self, filter: Document, page: Page) -> Result<Vec<T>, ViviError> {
        use futures_util::StreamExt;

        let mut find = self.inner.find(live(filter));
        if let Some(sort) = page.sort {
            find = find.sort(sort);
        }
        if let Some(skip) = page.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = page.limit {
            find = find.limit(limit);
        }

        let cursor = find.await?;
        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Count live documents
    pub async fn count(&self, filter: Document) -> Result<u64, ViviError> {
        Ok(self.inner.count_documents(live(filter)).await?)
    }

    /// Atomic read-modify-write of one live document.
    ///
    /// The replacement only lands if `metadata.revision` is unchanged since
    /// the read; otherwise the document is re-read and `mutate` runs again.
    /// Returns `None` when no document matches.
    pub async fn modify_one<F>(&self, filter: Document, mutate: F) -> Result<Option<T>, ViviError>
    where
        F: Fn(&mut T) -> Result<(), ViviError>,
    {
        for attempt in 1..=MAX_MODIFY_ATTEMPTS {
            let Some(mut item) = self.find_one(filter.clone()).await? else {
                return Ok(None);
            };

            let revision = item.mut_metadata().revision;
            mutate(&mut item)?;
            let metadata = item.mut_metadata();
            metadata.revision = revision + 1;
            metadata.updated_at = Some(DateTime::now());

            let mut guarded = filter.clone();
            guarded.insert("metadata.revision", revision);
            let result = self.inner.replace_one(guarded, &item).await?;
            if result.matched_count == 1 {
                return Ok(Some(item));
            }

            debug!(attempt, revision, "Revision moved underneath modify, retrying");
        }

        Err(ViviError::Conflict(
            "Document is being modified concurrently, try again".to_string(),
        ))
    }

    /// Soft delete matching live documents
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, ViviError> {
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            },
            "$inc": { "metadata.revision": 1 },
        };

        Ok(self.inner.update_one(live(filter), update).await?)
    }
}

fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}
