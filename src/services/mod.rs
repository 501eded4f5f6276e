//! Services layer
//!
//! Business rules behind the REST surface. Each service owns a handle to
//! the mirror store (and the ledger where it needs to cross-check chain
//! state) and returns API views.

pub mod comments;
pub mod posts;
pub mod profiles;
pub mod reactions;
pub mod views;

pub use comments::{
    refresh_comment_count, CommentService, CreateCommentRequest, CreateCommentResponse,
};
pub use posts::{
    BountyPayment, CreatePostRequest, CreatePostResponse, ListPostsParams, PostService,
    UpdatePostRequest,
};
pub use profiles::{ProfileRequest, ProfileService};
pub use reactions::{ReactionRequest, ReactionService};
pub use views::{CommentView, PostView, ReactionCounts, ReactionSummary, UserView};
