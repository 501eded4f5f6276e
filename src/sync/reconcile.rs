//! Mirror reconciliation
//!
//! Compares a ledger snapshot with the mirror and repairs divergence. The
//! chain is authoritative for creator, hash, type, bounty amount and flags,
//! active/cancelled state and reaction sets; mirror documents with no chain
//! counterpart are flagged orphaned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::db::{BountyStatus, CommentDoc, PostDoc, PostStatus};
use crate::ledger::{
    Address, CommentId, CommentSnapshot, ContentType, Ledger, LedgerSnapshot, PostSnapshot,
    Wei,
};
use crate::services::refresh_comment_count;
use crate::store::{CommentQuery, MirrorStore, PostQuery};
use crate::types::{Result, ViviError};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Ledger log sequence the snapshot was taken at
    pub sequence: u64,
    pub posts_checked: usize,
    pub posts_created: usize,
    pub posts_updated: usize,
    /// Chain posts whose content was never pushed
    pub posts_unmirrored: usize,
    pub posts_orphaned: usize,
    pub comments_checked: usize,
    pub comments_created: usize,
    pub comments_updated: usize,
    pub comments_unmirrored: usize,
    pub comments_orphaned: usize,
    pub finished_at: i64,
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn diverged(&self) -> bool {
        self.posts_created + self.posts_updated + self.comments_created + self.comments_updated > 0
    }
}

pub struct Reconciler {
    store: Arc<dyn MirrorStore>,
    ledger: Arc<Ledger>,
    last_report: RwLock<Option<ReconcileReport>>,
    // One pass at a time
    running: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn MirrorStore>, ledger: Arc<Ledger>) -> Self {
        Self {
            store,
            ledger,
            last_report: RwLock::new(None),
            running: Mutex::new(()),
        }
    }

    pub async fn last_report(&self) -> Option<ReconcileReport> {
        self.last_report.read().await.clone()
    }

    /// Run one full pass
    pub async fn run(&self) -> Result<ReconcileReport> {
        let _guard = self.running.lock().await;
        let started = Instant::now();
        let snapshot = self.ledger.snapshot().await;
        let deployment = snapshot.deployment_id.as_str();
        let mut report = ReconcileReport {
            sequence: snapshot.sequence,
            ..Default::default()
        };

        let mut chain_posts = HashSet::new();
        for post in &snapshot.posts {
            chain_posts.insert(post.record.id);
            self.reconcile_post(post, &snapshot, &mut report).await?;
        }

        let mut chain_comments = HashSet::new();
        for comment in &snapshot.comments {
            chain_comments.insert(comment.record.id);
            self.reconcile_comment(comment, &snapshot, &mut report)
                .await?;
        }

        for doc in self.store.find_posts(&PostQuery::default()).await? {
            if chain_posts.contains(&doc.post_id) {
                continue;
            }
            report.posts_orphaned += 1;
            if !doc.orphaned {
                self.store
                    .modify_post(doc.post_id, &|doc| {
                        doc.orphaned = true;
                        Ok(())
                    })
                    .await?;
            }
        }

        for doc in self.store.find_comments(&CommentQuery::default()).await? {
            let linked = doc
                .chain_comment_id
                .map_or(false, |id| chain_comments.contains(&id));
            if linked {
                continue;
            }
            report.comments_orphaned += 1;
            // Left by an earlier deployment: no longer a live comment
            let stale = doc.is_from_other_deployment(deployment);
            if !doc.orphaned || (stale && doc.is_active) {
                self.store
                    .modify_comment(&doc.comment_key, &|doc| {
                        doc.orphaned = true;
                        if doc.is_from_other_deployment(deployment) {
                            doc.is_active = false;
                        }
                        Ok(())
                    })
                    .await?;
            }
        }

        for post in &snapshot.posts {
            refresh_comment_count(self.store.as_ref(), post.record.id).await?;
        }

        report.finished_at = chrono::Utc::now().timestamp_millis();
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if report.diverged() {
            warn!(
                sequence = report.sequence,
                posts_created = report.posts_created,
                posts_updated = report.posts_updated,
                comments_created = report.comments_created,
                comments_updated = report.comments_updated,
                "Mirror diverged from ledger, repaired"
            );
        }
        info!(
            sequence = report.sequence,
            posts = report.posts_checked,
            comments = report.comments_checked,
            unmirrored = report.posts_unmirrored + report.comments_unmirrored,
            orphaned = report.posts_orphaned + report.comments_orphaned,
            duration_ms = report.duration_ms,
            "Reconciliation complete"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    async fn reconcile_post(
        &self,
        snap: &PostSnapshot,
        ledger: &LedgerSnapshot,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        report.posts_checked += 1;
        let before = self.store.get_post(snap.record.id).await?;
        let deployment = ledger.deployment_id.as_str();
        let now = chrono::Utc::now().timestamp_millis();

        let upserted = self
            .store
            .upsert_post(snap.record.id, &|doc| {
                doc.forget_deployment(deployment);
                doc.apply_chain_record(&snap.record);
                if let Some(winner) = &snap.awarded_to {
                    doc.record_award(winner, now);
                }
                doc.likes = snap.likers.clone();
                doc.dislikes = snap.dislikers.clone();
                doc.chain_seq = doc.chain_seq.max(ledger.sequence);
                doc.ledger_deployment = Some(deployment.to_string());
                Ok(())
            })
            .await;
        let after = match upserted {
            Ok(doc) => doc,
            // Deleted from the mirror by its creator
            Err(ViviError::Conflict(reason)) => {
                debug!(post_id = snap.record.id, %reason, "Skipping post");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match before {
            None => report.posts_created += 1,
            Some(before) if post_chain_fields(&before) != post_chain_fields(&after) => {
                report.posts_updated += 1
            }
            Some(_) => {}
        }
        if !after.has_content() {
            report.posts_unmirrored += 1;
        }
        Ok(())
    }

    async fn reconcile_comment(
        &self,
        snap: &CommentSnapshot,
        ledger: &LedgerSnapshot,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        report.comments_checked += 1;
        let record = &snap.record;
        let deployment = ledger.deployment_id.as_str();
        let overwrite = |doc: &mut CommentDoc| -> Result<()> {
            doc.forget_deployment(deployment);
            doc.apply_chain_record(record);
            doc.likes = snap.likers.clone();
            doc.dislikes = snap.dislikers.clone();
            doc.chain_seq = doc.chain_seq.max(ledger.sequence);
            doc.ledger_deployment = Some(deployment.to_string());
            Ok(())
        };

        let before = match self.store.get_comment_by_chain_id(record.id).await? {
            Some(doc) => Some(doc),
            // A pushed comment still waiting for its chain id
            None => self
                .store
                .find_comments(&CommentQuery {
                    post_id: Some(record.post_id),
                    content_hash: Some(record.content_hash.clone()),
                    unlinked_only: true,
                    ..Default::default()
                })
                .await?
                .into_iter()
                .last(),
        };

        let after = match &before {
            Some(doc) => self
                .store
                .modify_comment(&doc.comment_key, &overwrite)
                .await?
                .ok_or_else(|| ViviError::NotFound("Comment not found".to_string()))?,
            None => {
                let mut doc = CommentDoc::new(record.post_id);
                overwrite(&mut doc)?;
                report.comments_created += 1;
                self.store.insert_comment(doc).await?
            }
        };

        if let Some(before) = before {
            if comment_chain_fields(&before) != comment_chain_fields(&after) {
                report.comments_updated += 1;
            }
        }
        if !after.has_content() {
            report.comments_unmirrored += 1;
        }
        Ok(())
    }

    /// Run a pass every `interval` until shutdown. The first pass runs
    /// immediately.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Reconciler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reconciler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run().await {
                            error!(error = %e, "Reconciliation failed");
                        }
                    }
                }
            }
        })
    }
}

type PostFields<'a> = (
    &'a Address,
    &'a str,
    ContentType,
    Wei,
    bool,
    BountyStatus,
    PostStatus,
    Option<&'a Address>,
    &'a [Address],
    &'a [Address],
);

type CommentFields<'a> = (
    Option<CommentId>,
    &'a Address,
    &'a str,
    ContentType,
    bool,
    &'a [Address],
    &'a [Address],
);

fn post_chain_fields(doc: &PostDoc) -> PostFields<'_> {
    (
        &doc.creator_address,
        doc.content_hash.as_str(),
        doc.post_type,
        doc.bounty_amount,
        doc.has_bounty,
        doc.bounty_status,
        doc.status,
        doc.bounty_paid_to.as_ref(),
        doc.likes.as_slice(),
        doc.dislikes.as_slice(),
    )
}

fn comment_chain_fields(doc: &CommentDoc) -> CommentFields<'_> {
    (
        doc.chain_comment_id,
        &doc.creator_address,
        doc.content_hash.as_str(),
        doc.comment_type,
        doc.is_active,
        doc.likes.as_slice(),
        doc.dislikes.as_slice(),
    )
}
