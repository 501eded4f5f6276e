//! Database schemas for Vivi
//!
//! MongoDB document structures for the post, comment and user mirrors.

mod comment;
mod content;
mod metadata;
mod post;
mod user;

pub use comment::{CommentDoc, COMMENT_COLLECTION};
pub use content::DocContent;
pub use metadata::Metadata;
pub use post::{BountyStatus, PostDoc, PostStatus, Reaction, POST_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
