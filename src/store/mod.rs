//! Mirror store
//!
//! The off-chain mirror of posts, comments and profiles behind one trait,
//! with an in-memory backend (development, tests) and a MongoDB backend.
//!
//! Every mutation goes through a `modify_*` call that applies a closure to
//! the current document atomically: concurrent reaction toggles and chain
//! updates on the same document never lose each other's writes.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::db::{BountyStatus, CommentDoc, PostDoc, PostStatus, UserDoc};
use crate::ledger::{Address, CommentId, PostId};
use crate::types::{Result, ViviError};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Mutation applied to a post inside `modify_post`. May run more than once.
pub type PostMutator<'a> = &'a (dyn Fn(&mut PostDoc) -> Result<()> + Send + Sync);

/// Mutation applied to a comment inside `modify_comment`. May run more than once.
pub type CommentMutator<'a> = &'a (dyn Fn(&mut CommentDoc) -> Result<()> + Send + Sync);

/// Mutation applied to a profile inside `upsert_user`
pub type UserMutator<'a> = &'a (dyn Fn(&mut UserDoc) -> Result<()> + Send + Sync);

/// Post ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostSort {
    /// Newest first by `timestamp`, then by id
    #[default]
    Newest,
    /// Largest bounty first
    BountyDesc,
}

/// Post listing filter
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub creator: Option<Address>,
    pub bounty_status: Option<BountyStatus>,
    pub exclude_status: Option<PostStatus>,
    pub sort: PostSort,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl PostQuery {
    pub fn matches(&self, doc: &PostDoc) -> bool {
        self.creator
            .as_ref()
            .map_or(true, |c| &doc.creator_address == c)
            && self.bounty_status.map_or(true, |s| doc.bounty_status == s)
            && self.exclude_status.map_or(true, |s| doc.status != s)
    }

    /// Sort and paginate an already filtered set
    pub fn arrange(&self, mut docs: Vec<PostDoc>) -> Vec<PostDoc> {
        match self.sort {
            PostSort::Newest => docs.sort_by(|a, b| {
                b.timestamp
                    .cmp(&a.timestamp)
                    .then(b.post_id.cmp(&a.post_id))
            }),
            PostSort::BountyDesc => docs.sort_by(|a, b| {
                b.bounty_amount
                    .cmp(&a.bounty_amount)
                    .then(b.post_id.cmp(&a.post_id))
            }),
        }
        paginate(docs, self.skip, self.limit)
    }
}

/// Comment listing filter. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
    pub post_id: Option<PostId>,
    pub content_hash: Option<String>,
    /// Only comments the ledger has not issued an id for yet
    pub unlinked_only: bool,
    pub active_only: bool,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl CommentQuery {
    pub fn for_post(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, doc: &CommentDoc) -> bool {
        self.post_id.map_or(true, |p| doc.contract_post_id == p)
            && self
                .content_hash
                .as_ref()
                .map_or(true, |h| &doc.content_hash == h)
            && (!self.unlinked_only || doc.chain_comment_id.is_none())
            && (!self.active_only || doc.is_active)
    }

    pub fn arrange(&self, mut docs: Vec<CommentDoc>) -> Vec<CommentDoc> {
        docs.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.chain_comment_id.cmp(&a.chain_comment_id))
        });
        paginate(docs, self.skip, self.limit)
    }
}

fn paginate<T>(docs: Vec<T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    docs.into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Storage backend for the off-chain mirror
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Verify the backend is reachable
    async fn ping(&self) -> Result<()>;

    // Posts

    async fn get_post(&self, post_id: PostId) -> Result<Option<PostDoc>>;

    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDoc>>;

    /// Insert a new post. A live or deleted post with the same id is a `Conflict`.
    async fn insert_post(&self, doc: PostDoc) -> Result<PostDoc>;

    /// Atomically apply `mutate`. `None` when the post does not exist.
    async fn modify_post(&self, post_id: PostId, mutate: PostMutator<'_>) -> Result<Option<PostDoc>>;

    /// Soft delete. Returns whether a live post was deleted.
    async fn delete_post(&self, post_id: PostId) -> Result<bool>;

    /// Apply `mutate` to the post, creating a pending document first if needed
    async fn upsert_post(&self, post_id: PostId, mutate: PostMutator<'_>) -> Result<PostDoc> {
        // A concurrent insert between our miss and our insert shows up as a
        // Conflict; the second pass then finds the document.
        for _ in 0..2 {
            if let Some(doc) = self.modify_post(post_id, mutate).await? {
                return Ok(doc);
            }
            let mut doc = PostDoc::pending(post_id);
            mutate(&mut doc)?;
            match self.insert_post(doc).await {
                Ok(doc) => return Ok(doc),
                Err(ViviError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ViviError::Conflict(format!(
            "Post {} exists but is not visible (deleted?)",
            post_id
        )))
    }

    // Comments

    async fn get_comment(&self, comment_key: &str) -> Result<Option<CommentDoc>>;

    async fn get_comment_by_chain_id(&self, comment_id: CommentId) -> Result<Option<CommentDoc>>;

    async fn find_comments(&self, query: &CommentQuery) -> Result<Vec<CommentDoc>>;

    async fn count_comments(&self, query: &CommentQuery) -> Result<u64>;

    async fn insert_comment(&self, doc: CommentDoc) -> Result<CommentDoc>;

    async fn modify_comment(
        &self,
        comment_key: &str,
        mutate: CommentMutator<'_>,
    ) -> Result<Option<CommentDoc>>;

    // Users

    async fn get_user(&self, wallet: &Address) -> Result<Option<UserDoc>>;

    /// Apply `mutate` to the profile, creating it first if needed.
    /// A name or ENS name held by another wallet is a `Conflict`.
    async fn upsert_user(&self, wallet: &Address, mutate: UserMutator<'_>) -> Result<UserDoc>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Wei;

    fn post(id: PostId, ts: i64, bounty: u128) -> PostDoc {
        PostDoc {
            post_id: id,
            timestamp: ts,
            bounty_amount: Wei(bounty),
            ..Default::default()
        }
    }

    #[test]
    fn test_newest_first_with_pagination() {
        let query = PostQuery {
            skip: 1,
            limit: Some(2),
            ..Default::default()
        };
        let docs = query.arrange(vec![post(1, 10, 0), post(2, 30, 0), post(3, 20, 0), post(4, 5, 0)]);
        let ids: Vec<_> = docs.iter().map(|d| d.post_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_bounty_sort_uses_full_precision() {
        let query = PostQuery {
            sort: PostSort::BountyDesc,
            ..Default::default()
        };
        let big = u128::from(u64::MAX) * 10;
        let docs = query.arrange(vec![post(1, 0, 9), post(2, 0, big), post(3, 0, 10)]);
        let ids: Vec<_> = docs.iter().map(|d| d.post_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
