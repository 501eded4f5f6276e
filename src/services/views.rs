//! JSON views of mirror documents
//!
//! Documents are stored snake_case with base64 voice payloads inline; API
//! clients get camelCase and a link to the voice bytes instead.

use serde::Serialize;

use crate::db::{BountyStatus, CommentDoc, DocContent, PostDoc, PostStatus, UserDoc};
use crate::ledger::{Address, CommentId, ContentType, PostId, Wei};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceView {
    pub content_type: String,
    pub file_name: String,
    pub file_size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceView>,
}

impl ContentView {
    fn from_doc(content: &DocContent, voice_url: String) -> Self {
        Self {
            text: content.text.clone(),
            voice: content.voice.as_ref().map(|v| VoiceView {
                content_type: v.content_type.clone(),
                file_name: v.file_name.clone(),
                file_size: v.file_size,
                url: voice_url,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post_id: PostId,
    pub content_hash: String,
    pub post_type: ContentType,
    pub content: Option<ContentView>,
    pub content_pending: bool,
    pub creator_address: Address,
    pub status: PostStatus,
    pub bounty_amount: Wei,
    pub has_bounty: bool,
    pub bounty_status: BountyStatus,
    pub bounty_paid_to: Option<Address>,
    pub bounty_paid_at: Option<i64>,
    pub likes: Vec<Address>,
    pub dislikes: Vec<Address>,
    pub comment_count: u64,
    pub is_anonymous: bool,
    pub timestamp: i64,
    pub chain_synced: bool,
    pub orphaned: bool,
}

impl From<&PostDoc> for PostView {
    fn from(doc: &PostDoc) -> Self {
        Self {
            post_id: doc.post_id,
            content_hash: doc.content_hash.clone(),
            post_type: doc.post_type,
            content: doc.content.as_ref().map(|c| {
                ContentView::from_doc(c, format!("/api/posts/{}/voice", doc.post_id))
            }),
            content_pending: !doc.has_content(),
            creator_address: doc.creator_address.clone(),
            status: doc.status,
            bounty_amount: doc.bounty_amount,
            has_bounty: doc.has_bounty,
            bounty_status: doc.bounty_status,
            bounty_paid_to: doc.bounty_paid_to.clone(),
            bounty_paid_at: doc.bounty_paid_at,
            likes: doc.likes.clone(),
            dislikes: doc.dislikes.clone(),
            comment_count: doc.comment_count,
            is_anonymous: doc.is_anonymous,
            timestamp: doc.timestamp,
            chain_synced: doc.chain_synced,
            orphaned: doc.orphaned,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub comment_key: String,
    pub chain_comment_id: Option<CommentId>,
    pub contract_post_id: PostId,
    pub content_hash: String,
    pub content: Option<ContentView>,
    pub content_pending: bool,
    pub comment_type: ContentType,
    pub creator_address: Address,
    pub likes: Vec<Address>,
    pub dislikes: Vec<Address>,
    pub is_anonymous: bool,
    pub is_active: bool,
    pub timestamp: i64,
    pub chain_synced: bool,
    pub orphaned: bool,
}

impl From<&CommentDoc> for CommentView {
    fn from(doc: &CommentDoc) -> Self {
        Self {
            comment_key: doc.comment_key.clone(),
            chain_comment_id: doc.chain_comment_id,
            contract_post_id: doc.contract_post_id,
            content_hash: doc.content_hash.clone(),
            content: doc.content.as_ref().map(|c| {
                ContentView::from_doc(
                    c,
                    format!("/api/comments/comments/{}/voice", doc.comment_key),
                )
            }),
            content_pending: !doc.has_content(),
            comment_type: doc.comment_type,
            creator_address: doc.creator_address.clone(),
            likes: doc.likes.clone(),
            dislikes: doc.dislikes.clone(),
            is_anonymous: doc.is_anonymous,
            is_active: doc.is_active,
            timestamp: doc.timestamp,
            chain_synced: doc.chain_synced,
            orphaned: doc.orphaned,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub wallet_address: Address,
    pub name: Option<String>,
    pub ens_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub created_at: i64,
    pub last_active: i64,
}

impl From<&UserDoc> for UserView {
    fn from(doc: &UserDoc) -> Self {
        Self {
            wallet_address: doc.wallet_address.clone(),
            name: doc.name.clone(),
            ens_name: doc.ens_name.clone(),
            profile_picture: doc.profile_picture.clone(),
            bio: doc.bio.clone(),
            created_at: doc.created_at,
            last_active: doc.last_active,
        }
    }
}

/// Like / dislike counts
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub likes: usize,
    pub dislikes: usize,
}

/// Counts plus the addresses behind them
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub likes: usize,
    pub dislikes: usize,
    pub liked_by: Vec<Address>,
    pub disliked_by: Vec<Address>,
}

impl ReactionSummary {
    pub fn new(likes: &[Address], dislikes: &[Address]) -> Self {
        Self {
            likes: likes.len(),
            dislikes: dislikes.len(),
            liked_by: likes.to_vec(),
            disliked_by: dislikes.to_vec(),
        }
    }
}
