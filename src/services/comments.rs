//! Comment service
//!
//! Comments are pushed over REST with their content and linked to the
//! on-chain comment either directly (`commentId` in the body) or later by
//! the mirror listener matching `(post, content hash)`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::{StoredVoice, VoiceUpload};
use crate::db::CommentDoc;
use crate::ledger::{Address, CommentId, ContentType, Ledger, PostId};
use crate::store::{CommentQuery, MirrorStore};
use crate::types::{Result, ViviError};

use super::posts::{parse_address, post_not_found, prepare_content, PreparedContent};
use super::views::CommentView;

/// Body of `POST /api/comments/:postId/comments`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(rename = "type", default)]
    pub comment_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub voice: Option<VoiceUpload>,
    #[serde(default)]
    pub creator_address: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub metadata_hash: Option<String>,
    /// On-chain comment id, when the client already has the receipt
    #[serde(default)]
    pub comment_id: Option<CommentId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentResponse {
    pub content_hash: String,
    pub comment_id: String,
    pub status: &'static str,
    pub comment: CommentView,
}

/// Recount live comments on a post and store the count on the post mirror
pub async fn refresh_comment_count(store: &dyn MirrorStore, post_id: PostId) -> Result<()> {
    let count = store
        .count_comments(&CommentQuery {
            post_id: Some(post_id),
            active_only: true,
            ..Default::default()
        })
        .await?;

    let updated = store
        .modify_post(post_id, &|doc| {
            doc.comment_count = count;
            Ok(())
        })
        .await?;
    if updated.is_none() {
        debug!(post_id, "No post mirror to record comment count on");
    }
    Ok(())
}

/// Comment business rules
pub struct CommentService {
    store: Arc<dyn MirrorStore>,
    ledger: Arc<Ledger>,
    max_voice_bytes: usize,
}

impl CommentService {
    pub fn new(store: Arc<dyn MirrorStore>, ledger: Arc<Ledger>, max_voice_bytes: usize) -> Self {
        Self {
            store,
            ledger,
            max_voice_bytes,
        }
    }

    pub async fn create(
        &self,
        post_id: PostId,
        req: CreateCommentRequest,
    ) -> Result<CreateCommentResponse> {
        if self.store.get_post(post_id).await?.is_none() {
            return Err(post_not_found());
        }

        let comment_type = match req.comment_type.as_str() {
            "TEXT" => ContentType::Text,
            "VOICE" => ContentType::Voice,
            _ => return Err(ViviError::BadRequest("Invalid comment type".to_string())),
        };
        let prepared = prepare_content(
            comment_type,
            req.content,
            req.voice,
            req.metadata_hash,
            self.max_voice_bytes,
            "comments",
        )?;

        let creator = if req.is_anonymous {
            Address::zero()
        } else {
            let raw = req.creator_address.as_deref().ok_or_else(|| {
                ViviError::BadRequest("creatorAddress is required".to_string())
            })?;
            parse_address(raw, "creatorAddress")?
        };

        if let Some(comment_id) = req.comment_id {
            if let Some(record) = self.ledger.view(|c| c.comment(comment_id).cloned()).await {
                if record.post_id != post_id || record.content_hash != prepared.hash {
                    return Err(ViviError::Conflict(
                        "Comment does not match the on-chain comment".to_string(),
                    ));
                }
            }
        }

        let draft = Draft {
            post_id,
            comment_type,
            creator,
            is_anonymous: req.is_anonymous,
            chain_comment_id: req.comment_id,
            prepared,
        };

        let doc = self.merge_or_insert(&draft).await?;
        refresh_comment_count(self.store.as_ref(), post_id).await?;

        info!(
            post_id,
            comment_key = %doc.comment_key,
            chain_comment_id = ?doc.chain_comment_id,
            "Comment content stored"
        );

        Ok(CreateCommentResponse {
            content_hash: doc.content_hash.clone(),
            comment_id: doc.comment_key.clone(),
            status: "success",
            comment: CommentView::from(&doc),
        })
    }

    /// Comments on a post, newest first. Deleted comments are left out.
    pub async fn list(&self, post_id: PostId) -> Result<Vec<CommentView>> {
        let docs = self
            .store
            .find_comments(&CommentQuery {
                post_id: Some(post_id),
                active_only: true,
                ..Default::default()
            })
            .await?;
        Ok(docs.iter().map(CommentView::from).collect())
    }

    pub async fn voice(&self, comment_ref: &str) -> Result<StoredVoice> {
        let doc = resolve_comment(self.store.as_ref(), comment_ref).await?;
        match (doc.comment_type, doc.content.and_then(|c| c.voice)) {
            (ContentType::Voice, Some(voice)) => Ok(voice),
            _ => Err(ViviError::NotFound("Voice content not found".to_string())),
        }
    }

    async fn merge_or_insert(&self, draft: &Draft) -> Result<CommentDoc> {
        // One retry covers the listener inserting the same chain comment
        // between our lookup and our insert.
        for _ in 0..2 {
            if let Some(existing) = self.find_target(draft).await? {
                return self.merge_into(&existing.comment_key, draft).await;
            }

            let mut doc = CommentDoc::new(draft.post_id);
            draft.fill(&mut doc);
            match self.store.insert_comment(doc).await {
                Ok(doc) => return Ok(doc),
                Err(ViviError::Conflict(_)) if draft.chain_comment_id.is_some() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ViviError::Conflict(
            "Comment is being created concurrently, try again".to_string(),
        ))
    }

    /// Existing document this push should land in, if any
    async fn find_target(&self, draft: &Draft) -> Result<Option<CommentDoc>> {
        if let Some(chain_id) = draft.chain_comment_id {
            if let Some(doc) = self.store.get_comment_by_chain_id(chain_id).await? {
                return Ok(Some(doc));
            }
        }

        // A listener-created placeholder for the same content
        let candidates = self
            .store
            .find_comments(&CommentQuery {
                post_id: Some(draft.post_id),
                content_hash: Some(draft.prepared.hash.clone()),
                ..Default::default()
            })
            .await?;
        Ok(candidates.into_iter().find(|doc| {
            !doc.has_content()
                && (draft.chain_comment_id.is_none()
                    || doc.chain_comment_id.is_none()
                    || doc.chain_comment_id == draft.chain_comment_id)
        }))
    }

    async fn merge_into(&self, comment_key: &str, draft: &Draft) -> Result<CommentDoc> {
        let deployment = self.ledger.deployment_id();
        self.store
            .modify_comment(comment_key, &|doc| {
                if doc.forget_deployment(deployment) {
                    doc.contract_post_id = draft.post_id;
                }
                if let Some(existing) = &doc.content {
                    if doc.content_hash == draft.prepared.hash && existing == &draft.prepared.content {
                        return Ok(());
                    }
                    return Err(ViviError::Conflict(
                        "Comment already has different content".to_string(),
                    ));
                }
                if doc.chain_synced && doc.content_hash != draft.prepared.hash {
                    return Err(ViviError::Conflict(
                        "Comment does not match the on-chain comment".to_string(),
                    ));
                }
                draft.fill(doc);
                Ok(())
            })
            .await?
            .ok_or_else(|| ViviError::NotFound("Comment not found".to_string()))
    }
}

/// Validated comment push
struct Draft {
    post_id: PostId,
    comment_type: ContentType,
    creator: Address,
    is_anonymous: bool,
    chain_comment_id: Option<CommentId>,
    prepared: PreparedContent,
}

impl Draft {
    /// Write content, and chain fields only where the chain has not yet spoken
    fn fill(&self, doc: &mut CommentDoc) {
        doc.content = Some(self.prepared.content.clone());
        if !doc.chain_synced {
            doc.content_hash = self.prepared.hash.clone();
            doc.comment_type = self.comment_type;
            doc.creator_address = self.creator.clone();
            doc.is_anonymous = self.is_anonymous;
            if doc.chain_comment_id.is_none() {
                doc.chain_comment_id = self.chain_comment_id;
            }
        }
    }
}

/// Find a comment by key, falling back to the on-chain id for numeric refs
pub(crate) async fn resolve_comment(store: &dyn MirrorStore, comment_ref: &str) -> Result<CommentDoc> {
    if let Some(doc) = store.get_comment(comment_ref).await? {
        return Ok(doc);
    }
    if let Ok(chain_id) = comment_ref.parse::<CommentId>() {
        if let Some(doc) = store.get_comment_by_chain_id(chain_id).await? {
            return Ok(doc);
        }
    }
    Err(ViviError::NotFound("Comment not found".to_string()))
}
