pub mod aggregator;

pub use aggregator::{
    plan_vote, CommentSubject, IdeaSubject, Votable, VoteAggregator, VoteChange, VoteOutcome,
    VotePlan,
};
