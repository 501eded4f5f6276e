//! Ledger events
//!
//! One variant per event in the contract ABI. Committed events are wrapped in
//! a [`LogEntry`] carrying the global log sequence, which downstream
//! consumers use as their idempotency key.

use serde::{Deserialize, Serialize};

use super::types::{Address, CommentId, ContentType, PostId, Wei};

/// Event emitted by a successful ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    PostCreated {
        post_id: PostId,
        creator: Address,
        content_hash: String,
        post_type: ContentType,
        bounty_amount: Wei,
    },
    BountyAdded {
        post_id: PostId,
        sender: Address,
        bounty_amount: Wei,
    },
    BountyAwarded {
        post_id: PostId,
        winner: Address,
    },
    PostCancelled {
        post_id: PostId,
        creator: Address,
    },
    CommentAdded {
        post_id: PostId,
        comment_id: CommentId,
        commenter: Address,
        is_anonymous: bool,
        content_hash: String,
        comment_type: ContentType,
    },
    CommentEdited {
        comment_id: CommentId,
        new_content_hash: String,
    },
    CommentDeleted {
        comment_id: CommentId,
    },
    PostLiked {
        post_id: PostId,
        liker: Address,
    },
    PostDisliked {
        post_id: PostId,
        disliker: Address,
    },
    CommentLiked {
        comment_id: CommentId,
        liker: Address,
    },
    CommentDisliked {
        comment_id: CommentId,
        disliker: Address,
    },
    EmergencyEthRecovered {
        amount: Wei,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl LedgerEvent {
    /// ABI event name
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::PostCreated { .. } => "PostCreated",
            LedgerEvent::BountyAdded { .. } => "BountyAdded",
            LedgerEvent::BountyAwarded { .. } => "BountyAwarded",
            LedgerEvent::PostCancelled { .. } => "PostCancelled",
            LedgerEvent::CommentAdded { .. } => "CommentAdded",
            LedgerEvent::CommentEdited { .. } => "CommentEdited",
            LedgerEvent::CommentDeleted { .. } => "CommentDeleted",
            LedgerEvent::PostLiked { .. } => "PostLiked",
            LedgerEvent::PostDisliked { .. } => "PostDisliked",
            LedgerEvent::CommentLiked { .. } => "CommentLiked",
            LedgerEvent::CommentDisliked { .. } => "CommentDisliked",
            LedgerEvent::EmergencyEthRecovered { .. } => "EmergencyEthRecovered",
            LedgerEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}

/// Committed event with its position in the ledger log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Global log sequence, strictly increasing from 1
    pub sequence: u64,
    /// Index of the transaction that emitted this event
    pub tx_index: u64,
    pub event: LedgerEvent,
}
