//! Reaction service
//!
//! Optimistic like/dislike bookkeeping on the mirror. Each toggle is one
//! atomic document mutation: remove the address from both sets, then add
//! it to the chosen one. The ledger's reaction sets win on the next event or
//! reconcile pass.

use std::sync::Arc;

use serde::Deserialize;

use crate::db::Reaction;
use crate::ledger::PostId;
use crate::store::MirrorStore;
use crate::types::{Result, ViviError};

use super::comments::resolve_comment;
use super::posts::{parse_address, post_not_found};
use super::views::{ReactionCounts, ReactionSummary};

/// Body of `POST /api/comments/:id/reaction`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    /// `like`, `dislike`, anything else clears
    #[serde(rename = "type", default)]
    pub reaction: String,
    #[serde(default)]
    pub is_post: bool,
    pub creator_address: String,
}

impl ReactionRequest {
    fn reaction(&self) -> Option<Reaction> {
        match self.reaction.as_str() {
            "like" => Some(Reaction::Like),
            "dislike" => Some(Reaction::Dislike),
            _ => None,
        }
    }
}

pub struct ReactionService {
    store: Arc<dyn MirrorStore>,
}

impl ReactionService {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        Self { store }
    }

    /// Toggle a reaction on a post (by post id) or a comment (by key or
    /// on-chain id)
    pub async fn toggle(&self, target: &str, req: ReactionRequest) -> Result<ReactionCounts> {
        let account = parse_address(&req.creator_address, "creatorAddress")?;
        let reaction = req.reaction();

        if req.is_post {
            let post_id = parse_post_id(target)?;
            let doc = self
                .store
                .modify_post(post_id, &|doc| {
                    doc.set_reaction(&account, reaction);
                    Ok(())
                })
                .await?
                .ok_or_else(post_not_found)?;
            return Ok(ReactionCounts {
                likes: doc.likes.len(),
                dislikes: doc.dislikes.len(),
            });
        }

        let comment = resolve_comment(self.store.as_ref(), target).await?;
        let doc = self
            .store
            .modify_comment(&comment.comment_key, &|doc| {
                doc.set_reaction(&account, reaction);
                Ok(())
            })
            .await?
            .ok_or_else(|| ViviError::NotFound("Comment not found".to_string()))?;
        Ok(ReactionCounts {
            likes: doc.likes.len(),
            dislikes: doc.dislikes.len(),
        })
    }

    pub async fn summary(&self, target: &str, is_post: bool) -> Result<ReactionSummary> {
        if is_post {
            let post_id = parse_post_id(target)?;
            let doc = self
                .store
                .get_post(post_id)
                .await?
                .ok_or_else(post_not_found)?;
            return Ok(ReactionSummary::new(&doc.likes, &doc.dislikes));
        }

        let doc = resolve_comment(self.store.as_ref(), target).await?;
        Ok(ReactionSummary::new(&doc.likes, &doc.dislikes))
    }
}

fn parse_post_id(raw: &str) -> Result<PostId> {
    raw.parse::<PostId>()
        .map_err(|_| ViviError::BadRequest(format!("Invalid post id: {}", raw)))
}
