use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;
use crate::core::{FriendshipId, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FriendStatus {
    Pending,
    Accepted,
    Blocked,
}

string_enum!(FriendStatus {
    Pending => "pending",
    Accepted => "accepted",
    Blocked => "blocked",
});

/// Directed edge: `user_id` asked `friend_id`. An accepted friendship is stored as two
/// accepted edges, one per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: FriendshipId,
    pub user_id: UserId,
    pub friend_id: UserId,
    pub status: FriendStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The participant that is not `viewer`.
    pub fn counterpart(&self, viewer: UserId) -> UserId {
        if self.sender_id == viewer {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}
