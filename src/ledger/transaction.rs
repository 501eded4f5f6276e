//! Ledger transactions
//!
//! A [`ContractCall`] names one contract method with its arguments. The wire
//! form is internally tagged on `method`, using the ABI method names:
//!
//! ```json
//! { "method": "createPost", "contentHash": "Qm...", "postType": "VOICE", "value": "1000" }
//! ```

use serde::{Deserialize, Serialize};

use super::contract::{CallContext, CallOutcome, Revert, ViviContract};
use super::events::LogEntry;
use super::types::{Address, CommentId, ContentType, PostId, Wei};

/// One contract method invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ContractCall {
    CreatePost {
        content_hash: String,
        #[serde(default)]
        post_type: ContentType,
    },
    AddBountyToPost {
        post_id: PostId,
    },
    AwardBounty {
        post_id: PostId,
        winner: Address,
    },
    CancelPost {
        post_id: PostId,
    },
    AddComment {
        post_id: PostId,
        content_hash: String,
        #[serde(default)]
        comment_type: ContentType,
        #[serde(default)]
        is_anonymous: bool,
    },
    EditComment {
        comment_id: CommentId,
        new_content_hash: String,
    },
    DeleteComment {
        comment_id: CommentId,
    },
    LikePost {
        post_id: PostId,
    },
    DislikePost {
        post_id: PostId,
    },
    LikeComment {
        comment_id: CommentId,
    },
    DislikeComment {
        comment_id: CommentId,
    },
    #[serde(rename = "recoverETH")]
    RecoverEth,
    TransferOwnership {
        new_owner: Address,
    },
    RenounceOwnership,
}

impl ContractCall {
    /// ABI method name
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::CreatePost { .. } => "createPost",
            ContractCall::AddBountyToPost { .. } => "addBountyToPost",
            ContractCall::AwardBounty { .. } => "awardBounty",
            ContractCall::CancelPost { .. } => "cancelPost",
            ContractCall::AddComment { .. } => "addComment",
            ContractCall::EditComment { .. } => "editComment",
            ContractCall::DeleteComment { .. } => "deleteComment",
            ContractCall::LikePost { .. } => "likePost",
            ContractCall::DislikePost { .. } => "dislikePost",
            ContractCall::LikeComment { .. } => "likeComment",
            ContractCall::DislikeComment { .. } => "dislikeComment",
            ContractCall::RecoverEth => "recoverETH",
            ContractCall::TransferOwnership { .. } => "transferOwnership",
            ContractCall::RenounceOwnership => "renounceOwnership",
        }
    }

    /// Execute against the contract
    pub fn apply(
        &self,
        contract: &mut ViviContract,
        ctx: &CallContext,
    ) -> Result<CallOutcome, Revert> {
        match self {
            ContractCall::CreatePost {
                content_hash,
                post_type,
            } => contract.create_post(ctx, content_hash, *post_type),
            ContractCall::AddBountyToPost { post_id } => contract.add_bounty_to_post(ctx, *post_id),
            ContractCall::AwardBounty { post_id, winner } => {
                contract.award_bounty(ctx, *post_id, winner)
            }
            ContractCall::CancelPost { post_id } => contract.cancel_post(ctx, *post_id),
            ContractCall::AddComment {
                post_id,
                content_hash,
                comment_type,
                is_anonymous,
            } => contract.add_comment(ctx, *post_id, content_hash, *comment_type, *is_anonymous),
            ContractCall::EditComment {
                comment_id,
                new_content_hash,
            } => contract.edit_comment(ctx, *comment_id, new_content_hash),
            ContractCall::DeleteComment { comment_id } => contract.delete_comment(ctx, *comment_id),
            ContractCall::LikePost { post_id } => contract.like_post(ctx, *post_id),
            ContractCall::DislikePost { post_id } => contract.dislike_post(ctx, *post_id),
            ContractCall::LikeComment { comment_id } => contract.like_comment(ctx, *comment_id),
            ContractCall::DislikeComment { comment_id } => {
                contract.dislike_comment(ctx, *comment_id)
            }
            ContractCall::RecoverEth => contract.recover_eth(ctx),
            ContractCall::TransferOwnership { new_owner } => {
                contract.transfer_ownership(ctx, new_owner)
            }
            ContractCall::RenounceOwnership => contract.renounce_ownership(ctx),
        }
    }
}

/// Signed-off call: sender, attached value and method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub value: Wei,
    pub call: ContractCall,
}

impl Transaction {
    pub fn new(from: Address, call: ContractCall) -> Self {
        Self {
            from,
            value: Wei::ZERO,
            call,
        }
    }

    pub fn with_value(mut self, value: Wei) -> Self {
        self.value = value;
        self
    }

    pub(crate) fn context(&self) -> CallContext {
        CallContext::new(self.from.clone()).with_value(self.value)
    }
}

/// Wire form of a transaction submitted over HTTP. The sender comes from
/// the request, not the body.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    #[serde(flatten)]
    pub call: ContractCall,
    #[serde(default)]
    pub value: Wei,
}

/// Result of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_index: u64,
    pub method: &'static str,
    /// Post or comment id issued by `createPost` / `addComment`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_id: Option<u64>,
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_wire_format() {
        let call: ContractCall = serde_json::from_str(
            r#"{"method":"addComment","postId":4,"contentHash":"QmC","commentType":"VOICE","isAnonymous":true}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            ContractCall::AddComment {
                post_id: 4,
                content_hash: "QmC".into(),
                comment_type: ContentType::Voice,
                is_anonymous: true,
            }
        );
        assert_eq!(call.method(), "addComment");
    }

    #[test]
    fn test_unit_methods_parse() {
        let call: ContractCall = serde_json::from_str(r#"{"method":"recoverETH"}"#).unwrap();
        assert_eq!(call, ContractCall::RecoverEth);
        let call: ContractCall =
            serde_json::from_str(r#"{"method":"renounceOwnership"}"#).unwrap();
        assert_eq!(call, ContractCall::RenounceOwnership);
    }

    #[test]
    fn test_request_carries_value() {
        let req: TransactionRequest = serde_json::from_str(
            r#"{"method":"createPost","contentHash":"QmP","value":"1000"}"#,
        )
        .unwrap();
        assert_eq!(req.value, Wei(1000));
        assert!(matches!(
            req.call,
            ContractCall::CreatePost {
                post_type: ContentType::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<ContractCall>(r#"{"method":"selfDestruct"}"#).is_err());
    }
}
