use chrono::Utc;
use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::tree::{build_comment_tree, CommentNode};
use crate::core::{CommentId, IdeaId};
use crate::domains::vote::{CommentSubject, VoteAggregator};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::database::{DatabaseInterface, DatabaseTransaction};
use crate::infrastructure::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::Comment;

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Clone)]
pub struct CommentService {
    db: Arc<dyn DatabaseInterface>,
    profiles: Arc<ProfileCache>,
    votes: VoteAggregator<CommentSubject>,
    feed: ChangeFeed,
}

impl CommentService {
    pub fn new(
        db: Arc<dyn DatabaseInterface>,
        profiles: Arc<ProfileCache>,
        votes: VoteAggregator<CommentSubject>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            db,
            profiles,
            votes,
            feed,
        }
    }

    /// Store a comment and bump the idea's `comment_count` in the same transaction.
    pub async fn add_comment(
        &self,
        vc: &ViewerContext,
        idea_id: IdeaId,
        new_comment: NewComment,
    ) -> AppResult<CommentNode> {
        let author_id = vc.require_user()?;
        let content = new_comment.content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment cannot be empty".to_string()));
        }

        if self.db.get_idea(idea_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Idea {} not found", idea_id)));
        }
        if let Some(parent_id) = new_comment.parent_id {
            match self.db.get_comment(parent_id).await? {
                Some(parent) if parent.idea_id == idea_id => {}
                Some(_) => {
                    return Err(AppError::Validation(format!(
                        "Comment {} belongs to a different idea",
                        parent_id
                    )))
                }
                None => {
                    return Err(AppError::NotFound(format!("Comment {} not found", parent_id)))
                }
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: CommentId::new(),
            idea_id,
            author_id,
            content: content.to_string(),
            parent_id: new_comment.parent_id,
            votes: 0,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_transaction().await?;
        if let Err(e) = self.insert_counted(&mut tx, &comment).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Comment rollback failed: {}", rollback_err);
            }
            return Err(e);
        }
        tx.commit().await?;

        info!(
            "Comment {} on idea {} by {}{}",
            comment.id,
            idea_id,
            author_id,
            comment
                .parent_id
                .map(|p| format!(" replying to {}", p))
                .unwrap_or_default()
        );
        self.feed.publish(
            ChangeEvent::new(Table::Comments, ChangeKind::Insert, comment.id)
                .with_key("idea_id", idea_id),
        );
        self.feed
            .publish(ChangeEvent::new(Table::Ideas, ChangeKind::Update, idea_id));

        let mut node = CommentNode::new(comment);
        node.author_name = self.profiles.display_name(author_id).await?;
        Ok(node)
    }

    async fn insert_counted(&self, tx: &mut DatabaseTransaction, comment: &Comment) -> AppResult<()> {
        self.db.insert_comment_tx(tx, comment).await?;
        self.db.adjust_comment_count_tx(tx, comment.idea_id, 1).await
    }

    /// Every comment on the idea, assembled into a tree with author names and the
    /// viewer's own votes.
    pub async fn thread(&self, vc: &ViewerContext, idea_id: IdeaId) -> AppResult<Vec<CommentNode>> {
        if self.db.get_idea(idea_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Idea {} not found", idea_id)));
        }

        let rows = self.db.list_comments(idea_id).await?;
        let user_votes = self.votes.viewer_votes(vc).await?;
        let profiles = &self.profiles;

        let nodes = try_join_all(rows.into_iter().map(|comment| {
            let user_vote = user_votes.get(&comment.id).copied();
            async move {
                let author_name = profiles.display_name(comment.author_id).await?;
                let mut node = CommentNode::new(comment);
                node.author_name = author_name;
                node.user_vote = user_vote;
                Ok::<_, AppError>(node)
            }
        }))
        .await?;

        Ok(build_comment_tree(nodes))
    }

    pub fn votes(&self) -> &VoteAggregator<CommentSubject> {
        &self.votes
    }
}
