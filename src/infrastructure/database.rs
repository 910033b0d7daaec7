// Database Interface - row-level operations over the seven relations
// Services only talk to this trait; SqliteDatabase is the shipped implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::{CommentId, FriendshipId, IdeaId, MessageId, UserId, VoteId};
use crate::error::{AppError, AppResult};
use crate::models::{
    string_enum, Category, Comment, FriendStatus, Friendship, Idea, IdeaStatus, Message,
    PrincipalDecision, PrincipalStatus, Profile, SocialPlatform, TeacherReview, UserRole, VoteRecord,
    VoteType,
};

/// Transaction wrapper handed to the `*_tx` operations
pub struct DatabaseTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl DatabaseTransaction {
    pub fn new_sqlite(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub fn as_sqlite_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    pub async fn rollback(self) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to rollback transaction: {}", e)))
    }
}

/// The two vote relations. Table and column names are fixed strings, never user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTable {
    IdeaVotes,
    CommentVotes,
}

impl VoteTable {
    pub fn table(self) -> &'static str {
        match self {
            VoteTable::IdeaVotes => "votes",
            VoteTable::CommentVotes => "comment_votes",
        }
    }

    pub fn subject_column(self) -> &'static str {
        match self {
            VoteTable::IdeaVotes => "idea_id",
            VoteTable::CommentVotes => "comment_id",
        }
    }

    /// Relation holding the denormalized `votes` counter
    pub fn counter_table(self) -> &'static str {
        match self {
            VoteTable::IdeaVotes => "ideas",
            VoteTable::CommentVotes => "comments",
        }
    }
}

/// Up/down totals re-derived from the vote rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
}

impl VoteTally {
    pub fn net(&self) -> i64 {
        self.up - self.down
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IdeaSort {
    #[default]
    Recent,
    Popular,
    Comments,
}

string_enum!(IdeaSort {
    Recent => "recent",
    Popular => "popular",
    Comments => "comments",
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdeaQuery {
    pub category: Option<Category>,
    pub status: Option<IdeaStatus>,
    pub sort: IdeaSort,
}

#[async_trait]
pub trait DatabaseInterface: Send + Sync {
    async fn begin_transaction(&self) -> AppResult<DatabaseTransaction>;
    async fn health_check(&self) -> AppResult<()>;

    // Profiles
    async fn create_profile(&self, profile: &Profile) -> AppResult<()>;
    async fn get_profile(&self, id: UserId) -> AppResult<Option<Profile>>;
    async fn get_profile_by_username(&self, username: &str) -> AppResult<Option<Profile>>;
    async fn list_profiles(&self) -> AppResult<Vec<Profile>>;
    async fn update_profile_names(
        &self,
        id: UserId,
        full_name: Option<&str>,
        username: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
    async fn update_profile_role(
        &self,
        id: UserId,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
    /// `None` clears the link
    async fn update_social_link(
        &self,
        id: UserId,
        platform: SocialPlatform,
        handle: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
    /// Cascades to everything the profile authored or cast
    async fn delete_profile_tx(&self, tx: &mut DatabaseTransaction, id: UserId) -> AppResult<bool>;

    // Ideas
    async fn create_idea(&self, idea: &Idea) -> AppResult<()>;
    async fn get_idea(&self, id: IdeaId) -> AppResult<Option<Idea>>;
    async fn list_ideas(&self, query: &IdeaQuery) -> AppResult<Vec<Idea>>;
    async fn count_ideas_by_status(&self) -> AppResult<HashMap<IdeaStatus, i64>>;
    /// Writes the review only while the stored status still equals `expected`.
    async fn apply_teacher_review(
        &self,
        id: IdeaId,
        expected: IdeaStatus,
        review: &TeacherReview,
    ) -> AppResult<bool>;
    /// Writes the decision only while the idea is forwarded and the principal status still
    /// equals `expected` (`None` matches a NULL column).
    async fn apply_principal_decision(
        &self,
        id: IdeaId,
        expected: Option<PrincipalStatus>,
        decision: &PrincipalDecision,
    ) -> AppResult<bool>;
    async fn delete_idea(&self, id: IdeaId) -> AppResult<bool>;

    // Votes: the toggle path runs entirely inside one transaction
    async fn vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
    ) -> AppResult<Option<i64>>;
    async fn find_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        user_id: UserId,
    ) -> AppResult<Option<VoteRecord>>;
    async fn insert_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        vote: &VoteRecord,
    ) -> AppResult<()>;
    async fn update_vote_type_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        id: VoteId,
        vote_type: VoteType,
    ) -> AppResult<()>;
    async fn delete_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        id: VoteId,
    ) -> AppResult<()>;
    /// Atomic `votes = votes + delta`; returns the new counter.
    async fn adjust_vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        delta: i64,
    ) -> AppResult<i64>;
    async fn tally_votes_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
    ) -> AppResult<VoteTally>;
    async fn set_vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        votes: i64,
    ) -> AppResult<()>;
    /// Subjects `user_id` currently has a vote on
    async fn voted_subjects_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        user_id: UserId,
    ) -> AppResult<Vec<Uuid>>;
    async fn list_votes(&self, table: VoteTable, subject_id: Uuid) -> AppResult<Vec<VoteRecord>>;
    async fn list_user_votes(
        &self,
        table: VoteTable,
        user_id: UserId,
    ) -> AppResult<HashMap<Uuid, VoteType>>;

    // Comments
    async fn insert_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        comment: &Comment,
    ) -> AppResult<()>;
    async fn adjust_comment_count_tx(
        &self,
        tx: &mut DatabaseTransaction,
        idea_id: IdeaId,
        delta: i64,
    ) -> AppResult<()>;
    /// Re-derives `comment_count` from the comment rows; `None` once the idea is gone
    async fn recount_comments_tx(
        &self,
        tx: &mut DatabaseTransaction,
        idea_id: IdeaId,
    ) -> AppResult<Option<i64>>;
    /// Ideas holding at least one comment by `author_id`
    async fn commented_ideas_tx(
        &self,
        tx: &mut DatabaseTransaction,
        author_id: UserId,
    ) -> AppResult<Vec<IdeaId>>;
    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>>;
    /// Oldest first, insertion order breaking timestamp ties
    async fn list_comments(&self, idea_id: IdeaId) -> AppResult<Vec<Comment>>;

    // Friends
    async fn create_friendship(&self, friendship: &Friendship) -> AppResult<()>;
    async fn get_friendship(&self, id: FriendshipId) -> AppResult<Option<Friendship>>;
    async fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> AppResult<Option<Friendship>>;
    async fn update_friendship_status(
        &self,
        id: FriendshipId,
        status: FriendStatus,
    ) -> AppResult<bool>;
    async fn delete_friendship(&self, id: FriendshipId) -> AppResult<bool>;
    /// Removes the edges in both directions
    async fn delete_friendships_between(&self, a: UserId, b: UserId) -> AppResult<u64>;
    async fn list_friendships_from(
        &self,
        user_id: UserId,
        status: FriendStatus,
    ) -> AppResult<Vec<Friendship>>;
    async fn list_friendships_to(
        &self,
        friend_id: UserId,
        status: FriendStatus,
    ) -> AppResult<Vec<Friendship>>;

    // Messages
    async fn create_message(&self, message: &Message) -> AppResult<()>;
    /// Both directions between `a` and `b`, oldest first
    async fn list_conversation(&self, a: UserId, b: UserId) -> AppResult<Vec<Message>>;
    /// Every message sent or received by `user_id`, newest first
    async fn list_messages_involving(&self, user_id: UserId) -> AppResult<Vec<Message>>;
    /// Marks the unread messages among `ids` addressed to `recipient`; returns the rows it flipped
    async fn mark_messages_read(&self, recipient: UserId, ids: &[MessageId]) -> AppResult<Vec<Message>>;
}
