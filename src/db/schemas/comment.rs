//! Comment document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::post::{set_reaction, Reaction};
use crate::db::schemas::{DocContent, Metadata};
use crate::ledger::{Address, CommentId, CommentRecord, ContentType, PostId};

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// Comment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommentDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Off-chain identifier (uuid v4), used in REST paths
    pub comment_key: String,

    /// On-chain comment id once the ledger has issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_comment_id: Option<CommentId>,

    pub contract_post_id: PostId,

    #[serde(default)]
    pub content_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<DocContent>,

    #[serde(default)]
    pub comment_type: ContentType,

    /// Zero address for anonymous comments
    #[serde(default)]
    pub creator_address: Address,

    #[serde(default)]
    pub likes: Vec<Address>,

    #[serde(default)]
    pub dislikes: Vec<Address>,

    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Creation time in milliseconds since epoch
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub chain_synced: bool,

    #[serde(default)]
    pub chain_seq: u64,

    /// Ledger deployment that issued `chain_comment_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_deployment: Option<String>,

    #[serde(default)]
    pub orphaned: bool,
}

fn default_true() -> bool {
    true
}

impl CommentDoc {
    /// New comment document under `post_id` with a fresh key
    pub fn new(post_id: PostId) -> Self {
        Self {
            comment_key: uuid::Uuid::new_v4().to_string(),
            contract_post_id: post_id,
            metadata: Metadata::new(),
            is_active: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn is_from_other_deployment(&self, deployment: &str) -> bool {
        self.ledger_deployment
            .as_deref()
            .is_some_and(|d| d != deployment)
    }

    /// Reset a comment left by another deployment (whose chain ids are being
    /// issued again) to an empty document under the same key
    pub fn forget_deployment(&mut self, deployment: &str) -> bool {
        if !self.is_from_other_deployment(deployment) {
            return false;
        }
        *self = Self {
            _id: self._id.take(),
            metadata: std::mem::take(&mut self.metadata),
            comment_key: std::mem::take(&mut self.comment_key),
            timestamp: self.timestamp,
            ..Self::new(self.contract_post_id)
        };
        true
    }

    /// Overwrite the fields the ledger is authoritative for
    pub fn apply_chain_record(&mut self, record: &CommentRecord) {
        self.chain_comment_id = Some(record.id);
        self.contract_post_id = record.post_id;
        self.content_hash = record.content_hash.clone();
        self.comment_type = record.comment_type;
        self.is_anonymous = record.is_anonymous;
        self.creator_address = record.commenter.clone();
        self.is_active = record.is_active;
        self.chain_synced = true;
        self.orphaned = false;
    }

    pub fn set_reaction(&mut self, account: &Address, reaction: Option<Reaction>) {
        set_reaction(&mut self.likes, &mut self.dislikes, account, reaction);
    }
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "comment_key": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("comment_key_unique".to_string())
                        .build(),
                ),
            ),
            // Absent until the ledger issues an id
            (
                doc! { "chain_comment_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("chain_comment_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "contract_post_id": 1, "timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("post_timestamp_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CommentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forget_deployment_keeps_key_and_drops_chain_state() {
        let mut doc = CommentDoc::new(3);
        let key = doc.comment_key.clone();
        doc.chain_comment_id = Some(1);
        doc.content_hash = "QmOld".into();
        doc.chain_synced = true;
        doc.chain_seq = 8;
        doc.is_active = false;
        doc.ledger_deployment = Some("old".into());

        assert!(doc.forget_deployment("new"));
        assert_eq!(doc.comment_key, key);
        assert_eq!(doc.contract_post_id, 3);
        assert_eq!(doc.chain_comment_id, None);
        assert!(doc.content_hash.is_empty());
        assert!(doc.is_active);
        assert_eq!(doc.chain_seq, 0);
        assert!(!doc.chain_synced);
    }
}
