//! Mirror listener
//!
//! Follows the ledger's committed log and applies each entry to the mirror
//! store. Every update is an idempotent upsert keyed by on-chain id, and
//! each document remembers the sequence of the last entry applied to it, so
//! replaying the log (after a lag, or on restart) never double-applies.
//!
//! ```text
//!   Ledger ──broadcast──▶ MirrorListener::spawn ──▶ apply(entry) ──▶ MirrorStore
//!      └── logs_since(cursor) ◀── on lag / start-up
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::db::{BountyStatus, CommentDoc, PostDoc, PostStatus, Reaction};
use crate::ledger::{
    Address, CommentId, CommentRecord, ContentType, Ledger, LedgerEvent, LogEntry, PostId, Wei,
};
use crate::services::refresh_comment_count;
use crate::store::{CommentQuery, MirrorStore};
use crate::types::{Result, ViviError};

type PostChange<'a> = &'a (dyn Fn(&mut PostDoc) + Send + Sync);
type CommentChange<'a> = &'a (dyn Fn(&mut CommentDoc) + Send + Sync);

/// Listener progress, exposed on `/api/sync/status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    /// Sequence of the last log entry processed
    pub cursor: u64,
    pub applied: u64,
    pub failed: u64,
}

/// Applies ledger log entries to the mirror store
pub struct MirrorListener {
    store: Arc<dyn MirrorStore>,
    ledger: Arc<Ledger>,
    cursor: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
}

impl MirrorListener {
    pub fn new(store: Arc<dyn MirrorStore>, ledger: Arc<Ledger>) -> Self {
        Self {
            store,
            ledger,
            cursor: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ListenerStatus {
        ListenerStatus {
            cursor: self.cursor(),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Apply every entry after the cursor. Returns how many were processed.
    pub async fn catch_up(&self) -> usize {
        let entries = self.ledger.logs_since(self.cursor()).await;
        let count = entries.len();
        for entry in &entries {
            self.process(entry).await;
        }
        if count > 0 {
            info!(count, cursor = self.cursor(), "Mirror caught up with ledger log");
        }
        count
    }

    /// Apply one entry and advance the cursor. Failures are logged and
    /// counted; the reconciler repairs whatever they left behind.
    pub async fn process(&self, entry: &LogEntry) {
        match self.apply(entry).await {
            Ok(()) => {
                self.applied.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    sequence = entry.sequence,
                    event = entry.event.name(),
                    error = %e,
                    "Failed to apply ledger event to mirror"
                );
            }
        }
        self.cursor.fetch_max(entry.sequence, Ordering::AcqRel);
    }

    /// Apply one log entry to the mirror
    pub async fn apply(&self, entry: &LogEntry) -> Result<()> {
        let seq = entry.sequence;
        debug!(sequence = seq, event = entry.event.name(), "Applying ledger event");

        match &entry.event {
            LedgerEvent::PostCreated {
                post_id,
                creator,
                content_hash,
                post_type,
                bounty_amount,
            } => {
                self.change_post(seq, *post_id, &|doc| {
                    if doc.has_content() && doc.content_hash != *content_hash {
                        warn!(
                            post_id = doc.post_id,
                            mirror_hash = %doc.content_hash,
                            chain_hash = %content_hash,
                            "Mirror content does not match the on-chain hash"
                        );
                    }
                    doc.creator_address = creator.clone();
                    doc.content_hash = content_hash.clone();
                    doc.post_type = *post_type;
                    doc.bounty_amount = *bounty_amount;
                    if !bounty_amount.is_zero() {
                        doc.has_bounty = true;
                        doc.bounty_status = BountyStatus::Open;
                    }
                })
                .await?;
            }

            LedgerEvent::BountyAdded {
                post_id,
                bounty_amount,
                ..
            } => {
                self.change_post(seq, *post_id, &|doc| {
                    doc.bounty_amount = doc
                        .bounty_amount
                        .checked_add(*bounty_amount)
                        .unwrap_or(doc.bounty_amount);
                    doc.has_bounty = true;
                    doc.bounty_status = BountyStatus::Open;
                })
                .await?;
            }

            LedgerEvent::BountyAwarded { post_id, winner } => {
                let paid_at = chrono::Utc::now().timestamp_millis();
                self.change_post(seq, *post_id, &|doc| doc.record_award(winner, paid_at))
                    .await?;
            }

            LedgerEvent::PostCancelled { post_id, .. } => {
                self.change_post(seq, *post_id, &|doc| {
                    // Escrow is refunded on cancel
                    doc.bounty_amount = Wei::ZERO;
                    doc.status = PostStatus::Cancelled;
                    if doc.has_bounty {
                        doc.bounty_status = BountyStatus::Closed;
                    }
                })
                .await?;
            }

            LedgerEvent::CommentAdded {
                post_id,
                comment_id,
                commenter,
                is_anonymous,
                content_hash,
                comment_type,
            } => {
                let added = AddedComment {
                    post_id: *post_id,
                    comment_id: *comment_id,
                    commenter,
                    is_anonymous: *is_anonymous,
                    content_hash,
                    comment_type: *comment_type,
                };
                self.add_comment(seq, &added).await?;
                refresh_comment_count(self.store.as_ref(), *post_id).await?;
            }

            LedgerEvent::CommentEdited {
                comment_id,
                new_content_hash,
            } => {
                self.change_comment(seq, *comment_id, &|doc| {
                    if doc.content_hash != *new_content_hash {
                        // Pushed content belongs to the old hash
                        doc.content = None;
                        doc.content_hash = new_content_hash.clone();
                    }
                })
                .await?;
            }

            LedgerEvent::CommentDeleted { comment_id } => {
                if let Some(doc) = self
                    .change_comment(seq, *comment_id, &|doc| doc.is_active = false)
                    .await?
                {
                    refresh_comment_count(self.store.as_ref(), doc.contract_post_id).await?;
                }
            }

            LedgerEvent::PostLiked { post_id, liker } => {
                self.react_post(seq, *post_id, liker, Reaction::Like).await?;
            }
            LedgerEvent::PostDisliked { post_id, disliker } => {
                self.react_post(seq, *post_id, disliker, Reaction::Dislike)
                    .await?;
            }
            LedgerEvent::CommentLiked { comment_id, liker } => {
                self.change_comment(seq, *comment_id, &|doc| {
                    doc.set_reaction(liker, Some(Reaction::Like))
                })
                .await?;
            }
            LedgerEvent::CommentDisliked {
                comment_id,
                disliker,
            } => {
                self.change_comment(seq, *comment_id, &|doc| {
                    doc.set_reaction(disliker, Some(Reaction::Dislike))
                })
                .await?;
            }

            LedgerEvent::EmergencyEthRecovered { amount } => {
                info!(sequence = seq, amount = %amount, "Contract balance recovered by owner");
            }
            LedgerEvent::OwnershipTransferred {
                previous_owner,
                new_owner,
            } => {
                info!(
                    sequence = seq,
                    previous_owner = %previous_owner,
                    new_owner = %new_owner,
                    "Contract ownership transferred"
                );
            }
        }

        Ok(())
    }

    /// Spawn the follow loop. It catches up from the log first, then applies
    /// broadcast entries until shutdown.
    pub fn spawn(
        self: Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        // Subscribe before catching up so nothing committed in between is lost
        let mut events_rx = self.ledger.subscribe();

        tokio::spawn(async move {
            info!("Mirror listener started");
            self.catch_up().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Mirror listener shutting down");
                        break;
                    }
                    entry = events_rx.recv() => {
                        match entry {
                            Ok(entry) => {
                                // Already applied during catch-up
                                if entry.sequence <= self.cursor() {
                                    continue;
                                }
                                if entry.sequence > self.cursor() + 1 {
                                    self.catch_up().await;
                                } else {
                                    self.process(&entry).await;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Mirror listener lagged, replaying from log");
                                self.catch_up().await;
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Ledger event channel closed, listener stopping");
                                break;
                            }
                        }
                    }
                }
            }

            info!(cursor = self.cursor(), "Mirror listener stopped");
        })
    }

    // -------------------------------------------------------------------------
    // Posts
    // -------------------------------------------------------------------------

    /// Upsert the post mirror and apply `change` unless the document has
    /// already seen this sequence. A post first seen here is seeded from the
    /// ledger record. A document written by another ledger deployment is
    /// reset first, and the comments that deployment left under the id are
    /// retired.
    async fn change_post(&self, seq: u64, post_id: PostId, change: PostChange<'_>) -> Result<PostDoc> {
        let deployment = self.ledger.deployment_id();
        let existing = self.store.get_post(post_id).await?;
        let stale = existing
            .as_ref()
            .is_some_and(|doc| doc.is_from_other_deployment(deployment));
        // Also true for content pushed (and possibly reset) before this event
        let first_write = existing
            .as_ref()
            .is_some_and(|doc| doc.ledger_deployment.as_deref() != Some(deployment));
        let seed = match existing {
            Some(doc) if doc.chain_synced && !stale => None,
            _ => self.ledger.view(|c| c.post(post_id).cloned()).await,
        };

        let doc = self
            .store
            .upsert_post(post_id, &|doc| {
                doc.forget_deployment(deployment);
                if doc.chain_seq >= seq {
                    return Ok(());
                }
                if let Some(record) = &seed {
                    if !doc.chain_synced {
                        doc.apply_chain_record(record);
                    }
                }
                change(doc);
                doc.chain_synced = true;
                doc.orphaned = false;
                doc.chain_seq = seq;
                doc.ledger_deployment = Some(deployment.to_string());
                Ok(())
            })
            .await?;

        if stale {
            warn!(post_id, "Mirror held a post from an earlier ledger deployment, reset");
        }
        if first_write {
            self.retire_stale_comments(post_id).await?;
        }
        Ok(doc)
    }

    /// Deactivate comments an earlier deployment left under `post_id`. Their
    /// chain ids are reused once the current ledger issues them again.
    async fn retire_stale_comments(&self, post_id: PostId) -> Result<()> {
        let deployment = self.ledger.deployment_id();
        let comments = self
            .store
            .find_comments(&CommentQuery::for_post(post_id))
            .await?;

        let mut retired = 0usize;
        for comment in comments {
            if !comment.is_from_other_deployment(deployment) {
                continue;
            }
            self.store
                .modify_comment(&comment.comment_key, &|doc| {
                    if doc.is_from_other_deployment(deployment) {
                        doc.is_active = false;
                        doc.orphaned = true;
                    }
                    Ok(())
                })
                .await?;
            retired += 1;
        }

        if retired == 0 {
            return Ok(());
        }
        debug!(post_id, retired, "Retired comments from an earlier deployment");
        refresh_comment_count(self.store.as_ref(), post_id).await
    }

    async fn react_post(
        &self,
        seq: u64,
        post_id: PostId,
        account: &Address,
        reaction: Reaction,
    ) -> Result<()> {
        self.change_post(seq, post_id, &|doc| {
            doc.set_reaction(account, Some(reaction))
        })
        .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Link a new on-chain comment to its mirror document: the one already
    /// carrying this chain id, else a pushed comment with the same post and
    /// hash that has no chain id yet, else a fresh content-pending document.
    async fn add_comment(&self, seq: u64, added: &AddedComment<'_>) -> Result<CommentDoc> {
        let change = |doc: &mut CommentDoc| added.write_to(doc);

        for _ in 0..2 {
            let existing = match self.store.get_comment_by_chain_id(added.comment_id).await? {
                Some(doc) => Some(doc),
                None => self
                    .store
                    .find_comments(&CommentQuery {
                        post_id: Some(added.post_id),
                        content_hash: Some(added.content_hash.to_string()),
                        unlinked_only: true,
                        ..Default::default()
                    })
                    .await?
                    .into_iter()
                    // Oldest pushed comment first
                    .last(),
            };

            if let Some(doc) = existing {
                if let Some(doc) = self
                    .modify_comment_at(seq, &doc.comment_key, None, &change)
                    .await?
                {
                    return Ok(doc);
                }
                continue;
            }

            let mut doc = CommentDoc::new(added.post_id);
            change(&mut doc);
            doc.chain_synced = true;
            doc.chain_seq = seq;
            doc.ledger_deployment = Some(self.ledger.deployment_id().to_string());
            match self.store.insert_comment(doc).await {
                Ok(doc) => {
                    debug!(
                        comment_id = added.comment_id,
                        post_id = added.post_id,
                        "Created content-pending comment mirror"
                    );
                    return Ok(doc);
                }
                // Someone linked the chain id first; take their document
                Err(ViviError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ViviError::Conflict(format!(
            "Could not link comment {}",
            added.comment_id
        )))
    }

    /// Apply `change` to the comment with this chain id, creating its mirror
    /// from the ledger record if it has none. `None` when the ledger does not
    /// know the comment either.
    async fn change_comment(
        &self,
        seq: u64,
        comment_id: CommentId,
        change: CommentChange<'_>,
    ) -> Result<Option<CommentDoc>> {
        let Some(record) = self.ledger.view(|c| c.comment(comment_id).cloned()).await else {
            warn!(comment_id, "Event for a comment the ledger does not know");
            return Ok(None);
        };

        let key = match self.store.get_comment_by_chain_id(comment_id).await? {
            Some(doc) => doc.comment_key,
            None => {
                let mut doc = CommentDoc::new(record.post_id);
                doc.apply_chain_record(&record);
                match self.store.insert_comment(doc).await {
                    Ok(doc) => doc.comment_key,
                    Err(ViviError::Conflict(_)) => {
                        match self.store.get_comment_by_chain_id(comment_id).await? {
                            Some(doc) => doc.comment_key,
                            None => return Ok(None),
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.modify_comment_at(seq, &key, Some(&record), change).await
    }

    /// Apply `change` unless the comment has already seen `seq`. A comment
    /// left by another deployment is reset and, given `seed`, rebuilt from
    /// the current ledger record first.
    async fn modify_comment_at(
        &self,
        seq: u64,
        comment_key: &str,
        seed: Option<&CommentRecord>,
        change: CommentChange<'_>,
    ) -> Result<Option<CommentDoc>> {
        let deployment = self.ledger.deployment_id();
        self.store
            .modify_comment(comment_key, &|doc| {
                if doc.forget_deployment(deployment) {
                    if let Some(record) = seed {
                        doc.apply_chain_record(record);
                    }
                }
                if doc.chain_seq >= seq {
                    return Ok(());
                }
                change(doc);
                doc.chain_synced = true;
                doc.orphaned = false;
                doc.chain_seq = seq;
                doc.ledger_deployment = Some(deployment.to_string());
                Ok(())
            })
            .await
    }
}

/// Fields of a `CommentAdded` event
struct AddedComment<'a> {
    post_id: PostId,
    comment_id: CommentId,
    commenter: &'a Address,
    is_anonymous: bool,
    content_hash: &'a str,
    comment_type: ContentType,
}

impl AddedComment<'_> {
    fn write_to(&self, doc: &mut CommentDoc) {
        doc.chain_comment_id = Some(self.comment_id);
        doc.contract_post_id = self.post_id;
        doc.creator_address = self.commenter.clone();
        doc.is_anonymous = self.is_anonymous;
        doc.content_hash = self.content_hash.to_string();
        doc.comment_type = self.comment_type;
        doc.is_active = true;
    }
}
