//! Post service
//!
//! REST-side rules for posts and their bounties. The ledger owns ids, the
//! content hash, escrow and reactions; this service attaches content to an
//! on-chain post and keeps the optimistic bounty bookkeeping clients expect.
//! Anything chain-derived written here is overwritten by the next ledger
//! event or reconcile pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::{content_address, StoredVoice, VoiceUpload};
use crate::db::{BountyStatus, DocContent, PostDoc, PostStatus};
use crate::ledger::{Address, ContentType, Ledger, PostId, Wei};
use crate::store::{MirrorStore, PostQuery, PostSort};
use crate::types::{Result, ViviError};

use super::views::PostView;

/// Body of `POST /api/posts`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(rename = "type", default)]
    pub post_type: ContentType,
    pub author: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub voice: Option<VoiceUpload>,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub metadata_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostResponse {
    pub content_hash: String,
    pub post_id: PostId,
    pub status: &'static str,
    pub post: PostView,
}

/// Body of `PUT /api/posts/:postId`. Only `status` is mutable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of paying or awarding a bounty
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BountyPayment {
    pub post_id: PostId,
    pub recipient_address: Address,
    pub bounty_amount: Wei,
    pub paid_at: i64,
}

/// Listing options for `GET /api/posts`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsParams {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

/// Content validated from a create request, with its content hash
pub(crate) struct PreparedContent {
    pub content: DocContent,
    pub hash: String,
}

/// Validate a text/voice body and derive its hash when the client did not
/// supply one
pub(crate) fn prepare_content(
    kind: ContentType,
    text: Option<String>,
    voice: Option<VoiceUpload>,
    metadata_hash: Option<String>,
    max_voice_bytes: usize,
    noun: &str,
) -> Result<PreparedContent> {
    let (content, raw) = match kind {
        ContentType::Text => {
            let text = text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                ViviError::BadRequest(format!("Content is required for text {}", noun))
            })?;
            let raw = text.as_bytes().to_vec();
            (DocContent::text(text), raw)
        }
        ContentType::Voice => {
            let upload = voice.ok_or_else(|| {
                ViviError::BadRequest(format!("Voice file is required for voice {}", noun))
            })?;
            let blob = upload.into_blob(max_voice_bytes)?;
            let stored = blob.to_stored();
            (DocContent::voice(stored), blob.bytes)
        }
    };

    let hash = metadata_hash
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| content_address(&raw));

    Ok(PreparedContent { content, hash })
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn parse_address(raw: &str, field: &str) -> Result<Address> {
    Address::parse(raw).map_err(|e| ViviError::BadRequest(format!("{}: {}", field, e)))
}

/// Post business rules over the mirror store and the ledger
pub struct PostService {
    store: Arc<dyn MirrorStore>,
    ledger: Arc<Ledger>,
    max_voice_bytes: usize,
}

impl PostService {
    pub fn new(store: Arc<dyn MirrorStore>, ledger: Arc<Ledger>, max_voice_bytes: usize) -> Self {
        Self {
            store,
            ledger,
            max_voice_bytes,
        }
    }

    /// Attach content to an on-chain post, creating the mirror document if
    /// the listener has not yet done so
    pub async fn create(&self, req: CreatePostRequest) -> Result<CreatePostResponse> {
        let post_id = req
            .post_id
            .ok_or_else(|| ViviError::BadRequest("postId is required".to_string()))?;
        let author = parse_address(&req.author, "author")?;
        let prepared = prepare_content(
            req.post_type,
            req.content,
            req.voice,
            req.metadata_hash,
            self.max_voice_bytes,
            "posts",
        )?;

        if let Some(record) = self.ledger.view(|c| c.post(post_id).cloned()).await {
            if record.content_hash != prepared.hash {
                return Err(ViviError::Conflict(
                    "Content hash does not match the on-chain post".to_string(),
                ));
            }
            if record.creator != author {
                return Err(ViviError::Forbidden(
                    "Author is not the on-chain creator of this post".to_string(),
                ));
            }
        }

        let post_type = req.post_type;
        let is_anonymous = req.is_anonymous;
        let timestamp = req.timestamp;
        let PreparedContent { content, hash } = prepared;
        let deployment = self.ledger.deployment_id();

        let doc = self
            .store
            .upsert_post(post_id, &|doc| {
                // Content pushed under an earlier deployment's post of this id
                doc.forget_deployment(deployment);
                if let Some(existing) = &doc.content {
                    if doc.content_hash == hash && existing == &content {
                        return Ok(());
                    }
                    return Err(ViviError::Conflict(
                        "Post already has different content".to_string(),
                    ));
                }
                if !doc.chain_synced {
                    doc.creator_address = author.clone();
                    doc.content_hash = hash.clone();
                    doc.post_type = post_type;
                }
                doc.content = Some(content.clone());
                doc.is_anonymous = is_anonymous;
                if let Some(ts) = timestamp {
                    doc.timestamp = ts;
                }
                Ok(())
            })
            .await?;

        info!(post_id, hash = %doc.content_hash, "Post content stored");

        Ok(CreatePostResponse {
            content_hash: doc.content_hash.clone(),
            post_id,
            status: "success",
            post: PostView::from(&doc),
        })
    }

    pub async fn get(&self, post_id: PostId) -> Result<PostView> {
        Ok(PostView::from(&self.require(post_id).await?))
    }

    /// Newest first
    pub async fn list(&self, params: ListPostsParams) -> Result<Vec<PostView>> {
        let creator = params
            .creator
            .as_deref()
            .map(|c| parse_address(c, "creator"))
            .transpose()?;
        let query = PostQuery {
            creator,
            skip: params.skip.unwrap_or(0),
            limit: params.limit,
            ..Default::default()
        };
        self.query(&query).await
    }

    pub async fn list_by_user(&self, wallet: &str) -> Result<Vec<PostView>> {
        let creator = parse_address(wallet, "walletAddress")?;
        self.query(&PostQuery {
            creator: Some(creator),
            ..Default::default()
        })
        .await
    }

    /// Open bounties on live posts, largest first
    pub async fn active_bounties(&self) -> Result<Vec<PostView>> {
        self.query(&PostQuery {
            bounty_status: Some(BountyStatus::Open),
            exclude_status: Some(PostStatus::Cancelled),
            sort: PostSort::BountyDesc,
            ..Default::default()
        })
        .await
    }

    pub async fn update(
        &self,
        post_id: PostId,
        wallet: &Address,
        req: UpdatePostRequest,
    ) -> Result<PostView> {
        let status = req
            .status
            .as_deref()
            .map(str::parse::<PostStatus>)
            .transpose()
            .map_err(ViviError::BadRequest)?;

        let doc = self
            .store
            .modify_post(post_id, &|doc| {
                require_creator(doc, wallet)?;
                if let Some(status) = status {
                    doc.status = status;
                }
                Ok(())
            })
            .await?
            .ok_or_else(post_not_found)?;

        Ok(PostView::from(&doc))
    }

    pub async fn delete(&self, post_id: PostId, wallet: &Address) -> Result<()> {
        let doc = self.require(post_id).await?;
        require_creator(&doc, wallet)?;
        if doc.has_bounty && doc.bounty_status == BountyStatus::Open {
            return Err(ViviError::BadRequest(
                "Cannot delete post with active bounty".to_string(),
            ));
        }

        if !self.store.delete_post(post_id).await? {
            return Err(post_not_found());
        }
        info!(post_id, "Post deleted");
        Ok(())
    }

    pub async fn add_bounty(&self, post_id: PostId, amount: Wei) -> Result<PostView> {
        if amount.is_zero() {
            return Err(ViviError::BadRequest("Invalid bounty amount".to_string()));
        }

        let doc = self
            .store
            .modify_post(post_id, &|doc| {
                doc.bounty_amount = amount;
                doc.has_bounty = true;
                doc.bounty_status = BountyStatus::Open;
                Ok(())
            })
            .await?
            .ok_or_else(post_not_found)?;

        debug!(post_id, amount = %amount, "Bounty recorded");
        Ok(PostView::from(&doc))
    }

    pub async fn set_bounty_status(
        &self,
        post_id: PostId,
        wallet: &Address,
        status: &str,
    ) -> Result<PostView> {
        let status = match status {
            "OPEN" => BountyStatus::Open,
            "CLOSED" => BountyStatus::Closed,
            _ => {
                return Err(ViviError::BadRequest(
                    "Invalid bounty status. Must be either OPEN or CLOSED".to_string(),
                ))
            }
        };

        let doc = self
            .store
            .modify_post(post_id, &|doc| {
                if !doc.has_bounty {
                    return Err(ViviError::BadRequest(
                        "Post does not have a bounty".to_string(),
                    ));
                }
                require_creator(doc, wallet)?;
                doc.bounty_status = status;
                Ok(())
            })
            .await?
            .ok_or_else(post_not_found)?;

        Ok(PostView::from(&doc))
    }

    /// Close an open bounty and record who was paid
    pub async fn pay_bounty(&self, post_id: PostId, recipient: &str) -> Result<BountyPayment> {
        let recipient = parse_address(recipient, "recipientAddress")?;
        let paid_at = now_ms();

        let doc = self
            .store
            .modify_post(post_id, &|doc| {
                if !doc.has_bounty || doc.bounty_status != BountyStatus::Open {
                    return Err(ViviError::BadRequest(
                        "Post does not have an active bounty".to_string(),
                    ));
                }
                doc.bounty_status = BountyStatus::Closed;
                doc.bounty_paid_to = Some(recipient.clone());
                doc.bounty_paid_at = Some(paid_at);
                Ok(())
            })
            .await?
            .ok_or_else(post_not_found)?;

        Ok(payment(&doc, recipient, paid_at))
    }

    /// Creator-only award bookkeeping; the transfer itself is a ledger call
    pub async fn award_bounty(
        &self,
        post_id: PostId,
        wallet: &Address,
        recipient: &str,
    ) -> Result<BountyPayment> {
        let recipient = parse_address(recipient, "recipientAddress")?;
        let paid_at = now_ms();

        let doc = self
            .store
            .modify_post(post_id, &|doc| {
                require_creator(doc, wallet)?;
                if doc.status == PostStatus::Completed || doc.bounty_paid_to.is_some() {
                    return Err(ViviError::BadRequest("Bounty already awarded".to_string()));
                }
                doc.status = PostStatus::Completed;
                if doc.has_bounty {
                    doc.bounty_status = BountyStatus::Closed;
                }
                doc.bounty_paid_to = Some(recipient.clone());
                doc.bounty_paid_at = Some(paid_at);
                Ok(())
            })
            .await?
            .ok_or_else(post_not_found)?;

        info!(post_id, recipient = %recipient, "Bounty award recorded");
        Ok(payment(&doc, recipient, paid_at))
    }

    /// Stored voice payload of a voice post
    pub async fn voice(&self, post_id: PostId) -> Result<StoredVoice> {
        let doc = self.require(post_id).await?;
        match (doc.post_type, doc.content.and_then(|c| c.voice)) {
            (ContentType::Voice, Some(voice)) => Ok(voice),
            _ => Err(ViviError::NotFound("Voice content not found".to_string())),
        }
    }

    async fn require(&self, post_id: PostId) -> Result<PostDoc> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(post_not_found)
    }

    async fn query(&self, query: &PostQuery) -> Result<Vec<PostView>> {
        let docs = self.store.find_posts(query).await?;
        Ok(docs.iter().map(PostView::from).collect())
    }
}

fn payment(doc: &PostDoc, recipient: Address, paid_at: i64) -> BountyPayment {
    BountyPayment {
        post_id: doc.post_id,
        recipient_address: recipient,
        bounty_amount: doc.bounty_amount,
        paid_at,
    }
}

fn require_creator(doc: &PostDoc, wallet: &Address) -> Result<()> {
    if &doc.creator_address != wallet {
        return Err(ViviError::Forbidden("Not authorized".to_string()));
    }
    Ok(())
}

pub(crate) fn post_not_found() -> ViviError {
    ViviError::NotFound("Post not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ContractCall, Transaction};
    use crate::store::MemoryStore;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn service() -> (PostService, Arc<Ledger>, Arc<MemoryStore>) {
        let ledger = Arc::new(Ledger::new(addr(9), 64));
        let store = Arc::new(MemoryStore::new());
        let svc = PostService::new(store.clone(), ledger.clone(), 1024);
        (svc, ledger, store)
    }

    fn text_post(post_id: PostId, author: &Address, text: &str) -> CreatePostRequest {
        CreatePostRequest {
            post_type: ContentType::Text,
            author: author.to_string(),
            content: Some(text.to_string()),
            voice: None,
            post_id: Some(post_id),
            is_anonymous: false,
            timestamp: None,
            metadata_hash: None,
        }
    }

    #[tokio::test]
    async fn test_text_post_requires_content() {
        let (svc, _, _) = service();
        let mut req = text_post(1, &addr(1), "");
        req.content = None;
        let err = svc.create(req).await.unwrap_err();
        assert_eq!(err.message(), "Content is required for text posts");
    }

    #[tokio::test]
    async fn test_voice_post_requires_file() {
        let (svc, _, _) = service();
        let mut req = text_post(1, &addr(1), "x");
        req.post_type = ContentType::Voice;
        let err = svc.create(req).await.unwrap_err();
        assert_eq!(err.message(), "Voice file is required for voice posts");
    }

    #[tokio::test]
    async fn test_create_derives_hash_and_is_idempotent() {
        let (svc, _, _) = service();
        let first = svc.create(text_post(1, &addr(1), "hello")).await.unwrap();
        assert_eq!(first.content_hash, content_address(b"hello"));

        let again = svc.create(text_post(1, &addr(1), "hello")).await.unwrap();
        assert_eq!(again.content_hash, first.content_hash);

        let err = svc.create(text_post(1, &addr(1), "changed")).await.unwrap_err();
        assert!(matches!(err, ViviError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_hash_mismatch_with_chain() {
        let (svc, ledger, _) = service();
        ledger
            .submit(Transaction::new(
                addr(1),
                ContractCall::CreatePost {
                    content_hash: "QmOnChain".into(),
                    post_type: ContentType::Text,
                },
            ))
            .await
            .unwrap();

        let err = svc.create(text_post(1, &addr(1), "other")).await.unwrap_err();
        assert!(matches!(err, ViviError::Conflict(_)));

        let mut req = text_post(1, &addr(1), "other");
        req.metadata_hash = Some("QmOnChain".into());
        svc.create(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_creator_updates_and_deletes() {
        let (svc, _, _) = service();
        svc.create(text_post(1, &addr(1), "hello")).await.unwrap();

        let err = svc
            .update(
                1,
                &addr(2),
                UpdatePostRequest {
                    status: Some("COMPLETED".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ViviError::Forbidden(_)));

        let view = svc
            .update(
                1,
                &addr(1),
                UpdatePostRequest {
                    status: Some("COMPLETED".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.status, PostStatus::Completed);

        assert!(matches!(
            svc.delete(1, &addr(2)).await.unwrap_err(),
            ViviError::Forbidden(_)
        ));
        svc.delete(1, &addr(1)).await.unwrap();
        assert!(matches!(svc.get(1).await.unwrap_err(), ViviError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_bounty_blocks_delete_until_paid() {
        let (svc, _, _) = service();
        svc.create(text_post(1, &addr(1), "hello")).await.unwrap();
        svc.add_bounty(1, Wei(100)).await.unwrap();

        let err = svc.delete(1, &addr(1)).await.unwrap_err();
        assert_eq!(err.message(), "Cannot delete post with active bounty");

        let paid = svc.pay_bounty(1, &addr(3).to_string()).await.unwrap();
        assert_eq!(paid.recipient_address, addr(3));
        assert_eq!(paid.bounty_amount, Wei(100));

        let err = svc.pay_bounty(1, &addr(3).to_string()).await.unwrap_err();
        assert_eq!(err.message(), "Post does not have an active bounty");

        svc.delete(1, &addr(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_bounty_status_rules() {
        let (svc, _, _) = service();
        svc.create(text_post(1, &addr(1), "hello")).await.unwrap();

        let err = svc.set_bounty_status(1, &addr(1), "PAID").await.unwrap_err();
        assert!(err.message().starts_with("Invalid bounty status"));

        let err = svc.set_bounty_status(1, &addr(1), "OPEN").await.unwrap_err();
        assert_eq!(err.message(), "Post does not have a bounty");

        svc.add_bounty(1, Wei(5)).await.unwrap();
        let err = svc.set_bounty_status(1, &addr(2), "CLOSED").await.unwrap_err();
        assert!(matches!(err, ViviError::Forbidden(_)));
        let view = svc.set_bounty_status(1, &addr(1), "CLOSED").await.unwrap();
        assert_eq!(view.bounty_status, BountyStatus::Closed);
    }

    #[tokio::test]
    async fn test_award_once_and_active_listing() {
        let (svc, _, _) = service();
        svc.create(text_post(1, &addr(1), "small")).await.unwrap();
        svc.create(text_post(2, &addr(1), "big")).await.unwrap();
        svc.add_bounty(1, Wei(10)).await.unwrap();
        svc.add_bounty(2, Wei(1_000)).await.unwrap();

        let active = svc.active_bounties().await.unwrap();
        let ids: Vec<_> = active.iter().map(|p| p.post_id).collect();
        assert_eq!(ids, vec![2, 1]);

        svc.award_bounty(2, &addr(1), &addr(4).to_string()).await.unwrap();
        let err = svc
            .award_bounty(2, &addr(1), &addr(4).to_string())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Bounty already awarded");

        let active = svc.active_bounties().await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_bounty_rejected() {
        let (svc, _, _) = service();
        svc.create(text_post(1, &addr(1), "hello")).await.unwrap();
        let err = svc.add_bounty(1, Wei::ZERO).await.unwrap_err();
        assert_eq!(err.message(), "Invalid bounty amount");
    }
}
