//! In-memory mirror store
//!
//! DashMap-backed; used when no MongoDB URI is configured and in tests.
//! `modify_*` holds the entry's shard lock for the whole read-modify-write
//! and applies the closure to a copy, so a failing closure changes nothing.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::db::{CommentDoc, Metadata, PostDoc, UserDoc};
use crate::ledger::{Address, CommentId, PostId};
use crate::types::{Result, ViviError};

use super::{
    CommentMutator, CommentQuery, MirrorStore, PostMutator, PostQuery, UserMutator,
};

/// Mirror store held entirely in memory
pub struct MemoryStore {
    posts: DashMap<PostId, PostDoc>,
    comments: DashMap<String, CommentDoc>,
    users: DashMap<Address, UserDoc>,
    /// Serialises profile writes so unique-name checks see a stable set
    user_writes: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        warn!("Mirror store running in memory-only mode (no MongoDB)");
        Self {
            posts: DashMap::new(),
            comments: DashMap::new(),
            users: DashMap::new(),
            user_writes: Mutex::new(()),
        }
    }

    fn name_taken(&self, wallet: &Address, user: &UserDoc) -> Option<&'static str> {
        for other in self.users.iter() {
            if other.key() == wallet || other.metadata.is_deleted {
                continue;
            }
            if user.name.is_some() && other.name == user.name {
                return Some("Name is already taken");
            }
            if user.ens_name.is_some() && other.ens_name == user.ens_name {
                return Some("ENS name is already registered to another wallet");
            }
        }
        None
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stamp_new(metadata: &mut Metadata) {
    *metadata = Metadata::new();
}

#[async_trait]
impl MirrorStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_post(&self, post_id: PostId) -> Result<Option<PostDoc>> {
        Ok(self
            .posts
            .get(&post_id)
            .filter(|doc| !doc.metadata.is_deleted)
            .map(|doc| doc.clone()))
    }

    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDoc>> {
        let docs = self
            .posts
            .iter()
            .filter(|doc| !doc.metadata.is_deleted && query.matches(doc))
            .map(|doc| doc.clone())
            .collect();
        Ok(query.arrange(docs))
    }

    async fn insert_post(&self, mut doc: PostDoc) -> Result<PostDoc> {
        match self.posts.entry(doc.post_id) {
            Entry::Occupied(_) => Err(ViviError::Conflict(format!(
                "Post {} already exists",
                doc.post_id
            ))),
            Entry::Vacant(slot) => {
                stamp_new(&mut doc.metadata);
                slot.insert(doc.clone());
                Ok(doc)
            }
        }
    }

    async fn modify_post(&self, post_id: PostId, mutate: PostMutator<'_>) -> Result<Option<PostDoc>> {
        let Some(mut entry) = self.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        if entry.metadata.is_deleted {
            return Ok(None);
        }
        let mut draft = entry.clone();
        mutate(&mut draft)?;
        draft.metadata.touch();
        *entry = draft.clone();
        Ok(Some(draft))
    }

    async fn delete_post(&self, post_id: PostId) -> Result<bool> {
        match self.posts.get_mut(&post_id) {
            Some(mut doc) if !doc.metadata.is_deleted => {
                doc.metadata.mark_deleted();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_comment(&self, comment_key: &str) -> Result<Option<CommentDoc>> {
        Ok(self
            .comments
            .get(comment_key)
            .filter(|doc| !doc.metadata.is_deleted)
            .map(|doc| doc.clone()))
    }

    async fn get_comment_by_chain_id(&self, comment_id: CommentId) -> Result<Option<CommentDoc>> {
        Ok(self
            .comments
            .iter()
            .find(|doc| !doc.metadata.is_deleted && doc.chain_comment_id == Some(comment_id))
            .map(|doc| doc.clone()))
    }

    async fn find_comments(&self, query: &CommentQuery) -> Result<Vec<CommentDoc>> {
        let docs = self
            .comments
            .iter()
            .filter(|doc| !doc.metadata.is_deleted && query.matches(doc))
            .map(|doc| doc.clone())
            .collect();
        Ok(query.arrange(docs))
    }

    async fn count_comments(&self, query: &CommentQuery) -> Result<u64> {
        Ok(self
            .comments
            .iter()
            .filter(|doc| !doc.metadata.is_deleted && query.matches(doc))
            .count() as u64)
    }

    async fn insert_comment(&self, mut doc: CommentDoc) -> Result<CommentDoc> {
        if let Some(chain_id) = doc.chain_comment_id {
            if self
                .comments
                .iter()
                .any(|other| other.chain_comment_id == Some(chain_id))
            {
                return Err(ViviError::Conflict(format!(
                    "Comment {} is already mirrored",
                    chain_id
                )));
            }
        }
        match self.comments.entry(doc.comment_key.clone()) {
            Entry::Occupied(_) => Err(ViviError::Conflict(format!(
                "Comment {} already exists",
                doc.comment_key
            ))),
            Entry::Vacant(slot) => {
                stamp_new(&mut doc.metadata);
                slot.insert(doc.clone());
                Ok(doc)
            }
        }
    }

    async fn modify_comment(
        &self,
        comment_key: &str,
        mutate: CommentMutator<'_>,
    ) -> Result<Option<CommentDoc>> {
        let Some(mut entry) = self.comments.get_mut(comment_key) else {
            return Ok(None);
        };
        if entry.metadata.is_deleted {
            return Ok(None);
        }
        let mut draft = entry.clone();
        mutate(&mut draft)?;
        draft.metadata.touch();
        *entry = draft.clone();
        Ok(Some(draft))
    }

    async fn get_user(&self, wallet: &Address) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .get(wallet)
            .filter(|doc| !doc.metadata.is_deleted)
            .map(|doc| doc.clone()))
    }

    async fn upsert_user(&self, wallet: &Address, mutate: UserMutator<'_>) -> Result<UserDoc> {
        let _guard = self.user_writes.lock().await;

        let existing = self.get_user(wallet).await?;
        let is_new = existing.is_none();
        let mut draft = existing.unwrap_or_else(|| UserDoc::new(wallet.clone()));
        mutate(&mut draft)?;

        if let Some(reason) = self.name_taken(wallet, &draft) {
            return Err(ViviError::Conflict(reason.to_string()));
        }

        if is_new {
            stamp_new(&mut draft.metadata);
        } else {
            draft.metadata.touch();
        }
        self.users.insert(wallet.clone(), draft.clone());
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::Reaction;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_duplicate_id() {
        let store = MemoryStore::new();
        store.insert_post(PostDoc::pending(1)).await.unwrap();
        let err = store.insert_post(PostDoc::pending(1)).await.unwrap_err();
        assert!(matches!(err, ViviError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_unchanged() {
        let store = MemoryStore::new();
        store.insert_post(PostDoc::pending(1)).await.unwrap();

        let result = store
            .modify_post(1, &|doc| {
                doc.comment_count = 99;
                Err(ViviError::BadRequest("nope".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get_post(1).await.unwrap().unwrap().comment_count, 0);
    }

    #[tokio::test]
    async fn test_deleted_posts_are_invisible() {
        let store = MemoryStore::new();
        store.insert_post(PostDoc::pending(1)).await.unwrap();
        assert!(store.delete_post(1).await.unwrap());
        assert!(store.get_post(1).await.unwrap().is_none());
        assert!(!store.delete_post(1).await.unwrap());
        assert!(store.modify_post(1, &|_| Ok(())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_reactions_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.insert_post(PostDoc::pending(1)).await.unwrap();

        let mut handles = Vec::new();
        for n in 1..=50u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let who = addr(n);
                store
                    .modify_post(1, &move |doc| {
                        doc.set_reaction(&who, Some(Reaction::Like));
                        Ok(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let doc = store.get_post(1).await.unwrap().unwrap();
        assert_eq!(doc.likes.len(), 50);
        assert_eq!(doc.metadata.revision, 50);
    }

    #[tokio::test]
    async fn test_upsert_post_creates_then_modifies() {
        let store = MemoryStore::new();
        let doc = store
            .upsert_post(5, &|doc| {
                doc.comment_count += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(doc.comment_count, 1);

        let doc = store
            .upsert_post(5, &|doc| {
                doc.comment_count += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(doc.comment_count, 2);
    }

    #[tokio::test]
    async fn test_user_names_are_unique() {
        let store = MemoryStore::new();
        store
            .upsert_user(&addr(1), &|u| {
                u.name = Some("alice".into());
                Ok(())
            })
            .await
            .unwrap();

        let err = store
            .upsert_user(&addr(2), &|u| {
                u.name = Some("alice".into());
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ViviError::Conflict(_)));

        // Re-saving your own name is fine
        store
            .upsert_user(&addr(1), &|u| {
                u.bio = Some("hi".into());
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(
            store.get_user(&addr(1)).await.unwrap().unwrap().bio.as_deref(),
            Some("hi")
        );
    }

    #[tokio::test]
    async fn test_comment_chain_id_unique() {
        let store = MemoryStore::new();
        let mut first = CommentDoc::new(1);
        first.chain_comment_id = Some(3);
        store.insert_comment(first).await.unwrap();

        let mut second = CommentDoc::new(1);
        second.chain_comment_id = Some(3);
        assert!(store.insert_comment(second).await.is_err());
        assert!(store.get_comment_by_chain_id(3).await.unwrap().is_some());
    }
}
