//! Profile service

use std::sync::Arc;

use serde::Deserialize;

use crate::store::MirrorStore;
use crate::types::{Result, ViviError};

use super::posts::{now_ms, parse_address};
use super::views::UserView;

/// Body of `POST /api/users/profile`. Absent fields are left unchanged;
/// an empty string clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ens_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture_hash: Option<String>,
}

fn apply(field: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update {
        let value = value.trim();
        *field = (!value.is_empty()).then(|| value.to_string());
    }
}

pub struct ProfileService {
    store: Arc<dyn MirrorStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, req: ProfileRequest) -> Result<UserView> {
        let raw = req
            .wallet_address
            .as_deref()
            .ok_or_else(|| ViviError::BadRequest("walletAddress is required".to_string()))?;
        let wallet = parse_address(raw, "walletAddress")?;
        let now = now_ms();

        let user = self
            .store
            .upsert_user(&wallet, &|user| {
                apply(&mut user.name, &req.name);
                apply(&mut user.ens_name, &req.ens_name);
                apply(&mut user.bio, &req.bio);
                if let Some(hash) = req.profile_picture_hash.as_deref().filter(|h| !h.is_empty()) {
                    user.profile_picture = Some(hash.to_string());
                }
                user.last_active = now;
                Ok(())
            })
            .await?;

        Ok(UserView::from(&user))
    }

    pub async fn get(&self, wallet: &str) -> Result<UserView> {
        let wallet = parse_address(wallet, "walletAddress")?;
        self.store
            .get_user(&wallet)
            .await?
            .map(|user| UserView::from(&user))
            .ok_or_else(|| ViviError::NotFound("User not found".to_string()))
    }
}
