//! Ledger chain
//!
//! Wraps the contract in a single-writer lock and keeps the committed event
//! log. Every committed entry is also broadcast so the mirror listener can
//! follow the chain without polling.
//!
//! ```text
//!   submit(tx) ──▶ [RwLock<ChainState>] ──▶ log (seq 1, 2, 3 ...)
//!                                       └─▶ broadcast::Sender<LogEntry>
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use super::contract::{Revert, ViviContract};
use super::events::{LedgerEvent, LogEntry};
use super::transaction::{Receipt, Transaction};
use super::types::{Address, CommentRecord, PostRecord, Wei};

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

struct ChainState {
    contract: ViviContract,
    log: Vec<LogEntry>,
    tx_count: u64,
}

/// Point-in-time copy of one post and its reactions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSnapshot {
    pub record: PostRecord,
    pub likers: Vec<Address>,
    pub dislikers: Vec<Address>,
    pub comment_ids: Vec<u64>,
    /// Winner of the bounty, when `awardBounty` has been committed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded_to: Option<Address>,
    /// Log sequence of that award
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded_at_seq: Option<u64>,
}

/// Point-in-time copy of one comment and its reactions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnapshot {
    pub record: CommentRecord,
    pub likers: Vec<Address>,
    pub dislikers: Vec<Address>,
}

/// Whole-ledger snapshot used by reconciliation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub deployment_id: String,
    /// Sequence of the last log entry included in this snapshot
    pub sequence: u64,
    pub posts: Vec<PostSnapshot>,
    pub comments: Vec<CommentSnapshot>,
}

/// The ledger: contract state, event log and event fan-out
pub struct Ledger {
    /// Fresh per deployment. Ids issued by another deployment are unrelated.
    deployment_id: String,
    state: RwLock<ChainState>,
    events_tx: broadcast::Sender<LogEntry>,
}

impl Ledger {
    /// Deploy a new ledger owned by `owner`
    pub fn new(owner: Address, event_buffer: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_buffer.max(1));
        let deployment_id = uuid::Uuid::new_v4().simple().to_string();
        info!(owner = %owner, deployment = %deployment_id, "Ledger deployed");
        Self {
            deployment_id,
            state: RwLock::new(ChainState {
                contract: ViviContract::new(owner),
                log: Vec::new(),
                tx_count: 0,
            }),
            events_tx,
        }
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Subscribe to committed log entries
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.events_tx.subscribe()
    }

    /// Execute a transaction. On revert nothing is committed or logged.
    pub async fn submit(&self, tx: Transaction) -> Result<Receipt, Revert> {
        let mut state = self.state.write().await;
        let ctx = tx.context();

        let outcome = match tx.call.apply(&mut state.contract, &ctx) {
            Ok(outcome) => outcome,
            Err(revert) => {
                debug!(
                    method = tx.call.method(),
                    from = %tx.from,
                    reason = revert.reason(),
                    "Transaction reverted"
                );
                return Err(revert);
            }
        };

        state.tx_count += 1;
        let tx_index = state.tx_count;
        let mut logs = Vec::with_capacity(outcome.events.len());
        for event in outcome.events {
            let entry = LogEntry {
                sequence: state.log.len() as u64 + 1,
                tx_index,
                event,
            };
            state.log.push(entry.clone());
            logs.push(entry);
        }

        // Sent while still holding the write lock so subscribers see entries
        // in log order. No receivers is fine.
        for entry in &logs {
            let _ = self.events_tx.send(entry.clone());
        }

        debug!(
            method = tx.call.method(),
            from = %tx.from,
            tx_index,
            events = logs.len(),
            "Transaction committed"
        );

        Ok(Receipt {
            tx_index,
            method: tx.call.method(),
            issued_id: outcome.issued_id,
            logs,
        })
    }

    /// Run a read-only view against the contract
    pub async fn view<R>(&self, f: impl FnOnce(&ViviContract) -> R) -> R {
        let state = self.state.read().await;
        f(&state.contract)
    }

    /// Committed log entries with sequence greater than `since`
    pub async fn logs_since(&self, since: u64) -> Vec<LogEntry> {
        let state = self.state.read().await;
        let start = usize::try_from(since).unwrap_or(usize::MAX).min(state.log.len());
        state.log[start..].to_vec()
    }

    /// Sequence of the most recent log entry (0 when empty)
    pub async fn last_sequence(&self) -> u64 {
        self.state.read().await.log.len() as u64
    }

    /// Consistent copy of all posts, comments and reaction sets
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        let contract = &state.contract;

        // The contract keeps no winner, only the event does
        let awards: HashMap<u64, (&Address, u64)> = state
            .log
            .iter()
            .filter_map(|entry| match &entry.event {
                LedgerEvent::BountyAwarded { post_id, winner } => {
                    Some((*post_id, (winner, entry.sequence)))
                }
                _ => None,
            })
            .collect();

        let posts = contract
            .posts()
            .map(|record| {
                let (likers, dislikers) = contract.post_reactions(record.id);
                let award = awards.get(&record.id);
                PostSnapshot {
                    comment_ids: contract.post_comments(record.id).to_vec(),
                    record: record.clone(),
                    likers,
                    dislikers,
                    awarded_to: award.map(|(winner, _)| (*winner).clone()),
                    awarded_at_seq: award.map(|(_, seq)| *seq),
                }
            })
            .collect();

        let comments = contract
            .comments()
            .map(|record| {
                let (likers, dislikers) = contract.comment_reactions(record.id);
                CommentSnapshot {
                    record: record.clone(),
                    likers,
                    dislikers,
                }
            })
            .collect();

        LedgerSnapshot {
            deployment_id: self.deployment_id.clone(),
            sequence: state.log.len() as u64,
            posts,
            comments,
        }
    }

    /// Development faucet: mint balance to an account
    pub async fn credit(&self, account: &Address, amount: Wei) -> Wei {
        let mut state = self.state.write().await;
        let balance = state.contract.credit(account, amount);
        info!(account = %account, amount = %amount, balance = %balance, "Faucet credit");
        balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ContentType, ContractCall, LedgerEvent};

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn create(hash: &str) -> ContractCall {
        ContractCall::CreatePost {
            content_hash: hash.into(),
            post_type: ContentType::Text,
        }
    }

    #[tokio::test]
    async fn test_submit_appends_and_broadcasts() {
        let ledger = Ledger::new(addr(9), 16);
        let mut rx = ledger.subscribe();

        let receipt = ledger
            .submit(Transaction::new(addr(1), create("QmA")))
            .await
            .unwrap();
        assert_eq!(receipt.issued_id, Some(1));
        assert_eq!(receipt.logs[0].sequence, 1);

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.sequence, 1);
        assert!(matches!(entry.event, LedgerEvent::PostCreated { post_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_revert_leaves_log_untouched() {
        let ledger = Ledger::new(addr(9), 16);
        let err = ledger
            .submit(Transaction::new(addr(1), ContractCall::LikePost { post_id: 1 }))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "Post does not exist");
        assert_eq!(ledger.last_sequence().await, 0);
        assert!(ledger.logs_since(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_logs_since_and_snapshot() {
        let ledger = Ledger::new(addr(9), 16);
        ledger.submit(Transaction::new(addr(1), create("QmA"))).await.unwrap();
        ledger.submit(Transaction::new(addr(1), create("QmB"))).await.unwrap();
        ledger
            .submit(Transaction::new(addr(2), ContractCall::LikePost { post_id: 2 }))
            .await
            .unwrap();

        let tail = ledger.logs_since(1).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 2);
        assert!(ledger.logs_since(10).await.is_empty());

        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.sequence, 3);
        assert_eq!(snapshot.posts.len(), 2);
        assert_eq!(snapshot.posts[1].likers, vec![addr(2)]);
        assert_eq!(snapshot.posts[0].awarded_to, None);
        assert_eq!(snapshot.deployment_id, ledger.deployment_id());
    }

    #[tokio::test]
    async fn test_snapshot_carries_bounty_award() {
        let ledger = Ledger::new(addr(9), 16);
        ledger.credit(&addr(1), Wei(100)).await;
        ledger
            .submit(Transaction::new(addr(1), create("QmA")).with_value(Wei(100)))
            .await
            .unwrap();
        ledger
            .submit(Transaction::new(
                addr(1),
                ContractCall::AwardBounty {
                    post_id: 1,
                    winner: addr(2),
                },
            ))
            .await
            .unwrap();

        let snapshot = ledger.snapshot().await;
        let post = &snapshot.posts[0];
        assert!(post.record.bounty_amount.is_zero());
        assert_eq!(post.awarded_to, Some(addr(2)));
        assert_eq!(post.awarded_at_seq, Some(2));
    }

    #[test]
    fn test_each_deployment_has_its_own_id() {
        let first = Ledger::new(addr(9), 16);
        let second = Ledger::new(addr(9), 16);
        assert_ne!(first.deployment_id(), second.deployment_id());
    }

    #[tokio::test]
    async fn test_faucet_funds_payable_calls() {
        let ledger = Ledger::new(addr(9), 16);
        ledger.credit(&addr(1), Wei(500)).await;
        ledger
            .submit(Transaction::new(addr(1), create("QmA")).with_value(Wei(200)))
            .await
            .unwrap();

        let (balance, escrow) = ledger
            .view(|c| (c.balance_of(&addr(1)), c.contract_balance()))
            .await;
        assert_eq!(balance, Wei(300));
        assert_eq!(escrow, Wei(200));
    }
}
