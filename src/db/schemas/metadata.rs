//! Bookkeeping block embedded in every mirror document
//!
//! Timestamps, the soft-delete flag and the revision counter that guards
//! concurrent writes.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Embedded as `metadata` in posts, comments and users
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Soft-deleted documents are invisible to reads
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// Bumped on every write; a write only lands against the revision it read
    #[serde(default)]
    pub revision: i64,
}

impl Metadata {
    /// Fresh metadata stamped now, revision 0
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    /// Record a successful write
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Some(DateTime::now());
    }

    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.deleted_at = Some(DateTime::now());
        self.touch();
    }
}
