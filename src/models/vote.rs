use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::string_enum;
use crate::core::{UserId, VoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteType {
    Up,
    Down,
}

string_enum!(VoteType {
    Up => "up",
    Down => "down",
});

impl VoteType {
    /// Contribution of one vote to the subject's counter.
    pub fn weight(self) -> i64 {
        match self {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            VoteType::Up => VoteType::Down,
            VoteType::Down => VoteType::Up,
        }
    }
}

/// A row of `votes` or `comment_votes`; `subject_id` is the idea or comment id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: VoteId,
    pub user_id: UserId,
    pub subject_id: Uuid,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}
