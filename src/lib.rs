//! Vivi - posts, comments, reactions and bounties on a social ledger
//!
//! The ledger contract is the authoritative record of posts, comments,
//! reactions and bounty escrow. Content (text and voice) lives in an
//! off-chain mirror that the REST API writes to and that a listener keeps
//! aligned with ledger events, with periodic reconciliation as a backstop.

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod ledger;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, ViviError};
