//! Chain to mirror synchronisation
//!
//! The [`MirrorListener`] applies ledger events as they are committed; the
//! [`Reconciler`] periodically compares a full ledger snapshot with the
//! mirror and repairs anything the listener missed.

pub mod listener;
pub mod reconcile;

pub use listener::{ListenerStatus, MirrorListener};
pub use reconcile::{ReconcileReport, Reconciler};
