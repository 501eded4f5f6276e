//! Post document schema
//!
//! Mirror of an on-chain post plus its off-chain content. Chain-derived
//! fields are written by the mirror listener and the reconciler; content is
//! pushed over REST by the author.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{DocContent, Metadata};
use crate::ledger::{Address, ContentType, PostId, PostRecord, Wei};

/// Collection name for posts
pub const POST_COLLECTION: &str = "posts";

/// Lifecycle of a post as shown to users
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Active => "ACTIVE",
            PostStatus::Completed => "COMPLETED",
            PostStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PostStatus::Active),
            "COMPLETED" => Ok(PostStatus::Completed),
            "CANCELLED" => Ok(PostStatus::Cancelled),
            other => Err(format!("Invalid post status: {}", other)),
        }
    }
}

/// Bounty lifecycle on the mirror
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BountyStatus {
    #[default]
    None,
    Open,
    Closed,
}

impl BountyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BountyStatus::None => "NONE",
            BountyStatus::Open => "OPEN",
            BountyStatus::Closed => "CLOSED",
        }
    }
}

/// Post document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PostDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// On-chain post id (unique)
    pub post_id: PostId,

    /// Content hash as registered on chain (empty until known)
    #[serde(default)]
    pub content_hash: String,

    #[serde(default)]
    pub post_type: ContentType,

    /// Off-chain body; `None` until the author pushes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<DocContent>,

    #[serde(default)]
    pub creator_address: Address,

    #[serde(default)]
    pub status: PostStatus,

    #[serde(default)]
    pub bounty_amount: Wei,

    #[serde(default)]
    pub has_bounty: bool,

    #[serde(default)]
    pub bounty_status: BountyStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty_paid_to: Option<Address>,

    /// Milliseconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty_paid_at: Option<i64>,

    #[serde(default)]
    pub likes: Vec<Address>,

    #[serde(default)]
    pub dislikes: Vec<Address>,

    #[serde(default)]
    pub comment_count: u64,

    #[serde(default)]
    pub is_anonymous: bool,

    /// Creation time in milliseconds since epoch
    #[serde(default)]
    pub timestamp: i64,

    /// Chain-derived fields have been written from a ledger event
    #[serde(default)]
    pub chain_synced: bool,

    /// Sequence of the last ledger log entry applied to this document
    #[serde(default)]
    pub chain_seq: u64,

    /// Ledger deployment that wrote the chain-derived fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_deployment: Option<String>,

    /// No on-chain counterpart was found during reconciliation
    #[serde(default)]
    pub orphaned: bool,
}

impl PostDoc {
    /// Empty mirror slot for an on-chain post whose content is not yet known
    pub fn pending(post_id: PostId) -> Self {
        Self {
            post_id,
            metadata: Metadata::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// True when the chain-derived fields came from a different ledger
    /// deployment, whose post ids say nothing about the current one
    pub fn is_from_other_deployment(&self, deployment: &str) -> bool {
        self.ledger_deployment
            .as_deref()
            .is_some_and(|d| d != deployment)
    }

    /// Reset a document left by another deployment to an empty slot, keeping
    /// only its storage identity. Returns whether anything was reset.
    pub fn forget_deployment(&mut self, deployment: &str) -> bool {
        if !self.is_from_other_deployment(deployment) {
            return false;
        }
        *self = Self {
            _id: self._id.take(),
            metadata: std::mem::take(&mut self.metadata),
            ..Self::pending(self.post_id)
        };
        true
    }

    /// Overwrite the fields the ledger is authoritative for.
    ///
    /// Award is not derivable from the record (the escrow reads zero both
    /// before a bounty and after its payout); see `record_award`. A zero
    /// escrow on an active post leaves an off-chain bounty as it is.
    pub fn apply_chain_record(&mut self, record: &PostRecord) {
        self.creator_address = record.creator.clone();
        self.content_hash = record.content_hash.clone();
        self.post_type = record.post_type;

        let escrowed = !record.bounty_amount.is_zero();
        if escrowed || !record.is_active || !self.has_bounty {
            self.bounty_amount = record.bounty_amount;
        }
        if escrowed {
            self.has_bounty = true;
        }

        if record.is_active {
            if escrowed {
                self.bounty_status = BountyStatus::Open;
            }
            if self.status == PostStatus::Cancelled {
                self.status = PostStatus::Active;
            }
        } else {
            self.status = PostStatus::Cancelled;
            if self.has_bounty {
                self.bounty_status = BountyStatus::Closed;
            }
        }

        self.chain_synced = true;
        self.orphaned = false;
    }

    /// Record an on-chain `awardBounty`. `paid_at` is kept from an earlier
    /// record of the same winner.
    pub fn record_award(&mut self, winner: &Address, paid_at: i64) {
        self.bounty_amount = Wei::ZERO;
        self.has_bounty = true;
        self.bounty_status = BountyStatus::Closed;
        self.status = PostStatus::Completed;
        if self.bounty_paid_to.as_ref() != Some(winner) || self.bounty_paid_at.is_none() {
            self.bounty_paid_to = Some(winner.clone());
            self.bounty_paid_at = Some(paid_at);
        }
    }

    /// Move `account` into likes (or dislikes), never both
    pub fn set_reaction(&mut self, account: &Address, reaction: Option<Reaction>) {
        set_reaction(&mut self.likes, &mut self.dislikes, account, reaction);
    }
}

/// A like or dislike
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

/// Remove `account` from both sets, then add it to the chosen one
pub(crate) fn set_reaction(
    likes: &mut Vec<Address>,
    dislikes: &mut Vec<Address>,
    account: &Address,
    reaction: Option<Reaction>,
) {
    likes.retain(|a| a != account);
    dislikes.retain(|a| a != account);
    match reaction {
        Some(Reaction::Like) => likes.push(account.clone()),
        Some(Reaction::Dislike) => dislikes.push(account.clone()),
        None => {}
    }
}

impl IntoIndexes for PostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "post_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("post_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "creator_address": 1, "timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("creator_timestamp_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "bounty_status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("bounty_status_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("timestamp_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
