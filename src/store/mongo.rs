//! MongoDB mirror store
//!
//! Collections `posts`, `comments` and `users`. Atomic mutation uses the
//! revision-guarded `modify_one` of the collection wrapper.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use tracing::info;

use crate::db::{
    schemas::{COMMENT_COLLECTION, POST_COLLECTION, USER_COLLECTION},
    CommentDoc, MongoClient, MongoCollection, Page, PostDoc, UserDoc,
};
use crate::ledger::{Address, CommentId, PostId};
use crate::types::{Result, ViviError};

use super::{
    CommentMutator, CommentQuery, MirrorStore, PostMutator, PostQuery, PostSort, UserMutator,
};

/// Mirror store persisted in MongoDB
pub struct MongoStore {
    client: MongoClient,
    posts: MongoCollection<PostDoc>,
    comments: MongoCollection<CommentDoc>,
    users: MongoCollection<UserDoc>,
}

impl MongoStore {
    /// Open the collections and apply their indexes
    pub async fn new(client: MongoClient) -> Result<Self> {
        let posts = client.collection::<PostDoc>(POST_COLLECTION).await?;
        let comments = client.collection::<CommentDoc>(COMMENT_COLLECTION).await?;
        let users = client.collection::<UserDoc>(USER_COLLECTION).await?;

        info!(db = client.db_name(), "MongoDB mirror store ready");

        Ok(Self {
            client,
            posts,
            comments,
            users,
        })
    }
}

fn id_filter(field: &str, id: u64) -> Result<Document> {
    let id = i64::try_from(id)
        .map_err(|_| ViviError::BadRequest(format!("{} out of range", field)))?;
    let mut filter = Document::new();
    filter.insert(field, id);
    Ok(filter)
}

fn post_filter(query: &PostQuery) -> Document {
    let mut filter = Document::new();
    if let Some(creator) = &query.creator {
        filter.insert("creator_address", creator.as_str());
    }
    if let Some(status) = query.bounty_status {
        filter.insert("bounty_status", status.as_str());
    }
    if let Some(status) = query.exclude_status {
        filter.insert("status", doc! { "$ne": status.as_str() });
    }
    filter
}

fn comment_filter(query: &CommentQuery) -> Result<Document> {
    let mut filter = Document::new();
    if let Some(post_id) = query.post_id {
        let post_id = i64::try_from(post_id)
            .map_err(|_| ViviError::BadRequest("contract_post_id out of range".to_string()))?;
        filter.insert("contract_post_id", post_id);
    }
    if let Some(hash) = &query.content_hash {
        filter.insert("content_hash", hash.as_str());
    }
    if query.unlinked_only {
        filter.insert("chain_comment_id", doc! { "$exists": false });
    }
    if query.active_only {
        filter.insert("is_active", true);
    }
    Ok(filter)
}

fn page(skip: usize, limit: Option<usize>, sort: Document) -> Page {
    Page {
        sort: Some(sort),
        skip: (skip > 0).then_some(skip as u64),
        limit: limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)),
    }
}

#[async_trait]
impl MirrorStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    async fn get_post(&self, post_id: PostId) -> Result<Option<PostDoc>> {
        self.posts.find_one(id_filter("post_id", post_id)?).await
    }

    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDoc>> {
        let filter = post_filter(query);
        match query.sort {
            PostSort::Newest => {
                self.posts
                    .find_page(
                        filter,
                        page(query.skip, query.limit, doc! { "timestamp": -1, "post_id": -1 }),
                    )
                    .await
            }
            // Amounts are decimal strings and cannot be ordered by the server
            PostSort::BountyDesc => {
                let docs = self.posts.find_many(filter).await?;
                Ok(query.arrange(docs))
            }
        }
    }

    async fn insert_post(&self, doc: PostDoc) -> Result<PostDoc> {
        self.posts.insert_one(doc).await
    }

    async fn modify_post(&self, post_id: PostId, mutate: PostMutator<'_>) -> Result<Option<PostDoc>> {
        self.posts
            .modify_one(id_filter("post_id", post_id)?, |doc| mutate(doc))
            .await
    }

    async fn delete_post(&self, post_id: PostId) -> Result<bool> {
        let result = self.posts.soft_delete(id_filter("post_id", post_id)?).await?;
        Ok(result.modified_count > 0)
    }

    async fn get_comment(&self, comment_key: &str) -> Result<Option<CommentDoc>> {
        self.comments
            .find_one(doc! { "comment_key": comment_key })
            .await
    }

    async fn get_comment_by_chain_id(&self, comment_id: CommentId) -> Result<Option<CommentDoc>> {
        self.comments
            .find_one(id_filter("chain_comment_id", comment_id)?)
            .await
    }

    async fn find_comments(&self, query: &CommentQuery) -> Result<Vec<CommentDoc>> {
        self.comments
            .find_page(
                comment_filter(query)?,
                page(
                    query.skip,
                    query.limit,
                    doc! { "timestamp": -1, "chain_comment_id": -1 },
                ),
            )
            .await
    }

    async fn count_comments(&self, query: &CommentQuery) -> Result<u64> {
        self.comments.count(comment_filter(query)?).await
    }

    async fn insert_comment(&self, doc: CommentDoc) -> Result<CommentDoc> {
        self.comments.insert_one(doc).await
    }

    async fn modify_comment(
        &self,
        comment_key: &str,
        mutate: CommentMutator<'_>,
    ) -> Result<Option<CommentDoc>> {
        self.comments
            .modify_one(doc! { "comment_key": comment_key }, |doc| mutate(doc))
            .await
    }

    async fn get_user(&self, wallet: &Address) -> Result<Option<UserDoc>> {
        self.users
            .find_one(doc! { "wallet_address": wallet.as_str() })
            .await
    }

    async fn upsert_user(&self, wallet: &Address, mutate: UserMutator<'_>) -> Result<UserDoc> {
        let filter = doc! { "wallet_address": Bson::String(wallet.to_string()) };

        for _ in 0..2 {
            if let Some(user) = self
                .users
                .modify_one(filter.clone(), |doc| mutate(doc))
                .await
                .map_err(name_conflict)?
            {
                return Ok(user);
            }

            let mut user = UserDoc::new(wallet.clone());
            mutate(&mut user)?;
            let err = match self.users.insert_one(user).await {
                Ok(user) => return Ok(user),
                Err(e) => e,
            };
            // Lost an insert race on wallet_address: modify on the next pass
            let raced = matches!(err, ViviError::Conflict(_)) && self.get_user(wallet).await?.is_some();
            if !raced {
                return Err(name_conflict(err));
            }
        }

        Err(ViviError::Conflict(
            "Profile is being modified concurrently, try again".to_string(),
        ))
    }
}

fn name_conflict(err: ViviError) -> ViviError {
    match err {
        ViviError::Conflict(m) if m == "Duplicate key" => {
            ViviError::Conflict("Name or ENS name is already taken".to_string())
        }
        other => other,
    }
}
