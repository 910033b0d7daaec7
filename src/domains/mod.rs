// Domain services: each owns one slice of the school-ideas workflow

pub mod comment;
pub mod friend;
pub mod idea;
pub mod message;
pub mod profile;
pub mod vote;

pub use comment::CommentService;
pub use friend::FriendService;
pub use idea::IdeaService;
pub use message::MessageService;
pub use profile::ProfileService;
pub use vote::VoteAggregator;
