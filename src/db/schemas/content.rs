//! Off-chain content body shared by posts and comments

use serde::{Deserialize, Serialize};

use crate::content::StoredVoice;

/// Text or voice body. Exactly one is set once content has been pushed.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DocContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<StoredVoice>,
}

impl DocContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            voice: None,
        }
    }

    pub fn voice(voice: StoredVoice) -> Self {
        Self {
            text: None,
            voice: Some(voice),
        }
    }
}
