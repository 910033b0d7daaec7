// Core types and primitives

pub mod strong_types;

pub use strong_types::{CommentId, FriendshipId, IdeaId, MessageId, UserId, VoteId};
