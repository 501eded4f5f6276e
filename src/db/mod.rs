//! Database layer for Vivi
//!
//! MongoDB storage for the off-chain mirror of posts, comments and profiles.

pub mod mongo;
pub mod schemas;

pub use mongo::{is_duplicate_key, MongoClient, MongoCollection, Page};
pub use schemas::{
    BountyStatus, CommentDoc, DocContent, Metadata, PostDoc, PostStatus, Reaction, UserDoc,
};
