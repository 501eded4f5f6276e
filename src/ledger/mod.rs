//! Ledger contract
//!
//! The authoritative record of posts, comments, reactions and bounty escrow,
//! plus the chain wrapper that orders transactions and publishes events.

pub mod chain;
pub mod contract;
pub mod events;
pub mod transaction;
pub mod types;

pub use chain::{CommentSnapshot, Ledger, LedgerSnapshot, PostSnapshot, DEFAULT_EVENT_BUFFER};
pub use contract::{CallContext, CallOutcome, Revert, ViviContract};
pub use events::{LedgerEvent, LogEntry};
pub use transaction::{ContractCall, Receipt, Transaction, TransactionRequest};
pub use types::{
    Address, AddressError, CommentId, CommentRecord, ContentType, PostId, PostRecord, Wei,
};
