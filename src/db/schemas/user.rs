//! User profile document schema
//!
//! One profile per wallet. `name` and `ens_name` are unique when present.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::ledger::Address;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Lowercase wallet address (unique)
    pub wallet_address: Address,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ens_name: Option<String>,

    /// Content address of the profile picture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Milliseconds since epoch
    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub last_active: i64,
}

impl UserDoc {
    pub fn new(wallet_address: Address) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            _id: None,
            metadata: Metadata::new(),
            wallet_address,
            name: None,
            ens_name: None,
            profile_picture: None,
            bio: None,
            created_at: now,
            last_active: now,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "wallet_address": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("wallet_address_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("name_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "ens_name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("ens_name_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
