pub mod service;
pub mod tree;

pub use service::{CommentService, NewComment};
pub use tree::{build_comment_tree, CommentNode, MAX_REPLY_DEPTH};
