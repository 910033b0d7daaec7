use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::lifecycle::{plan_principal_transition, plan_teacher_transition, PrincipalAction, TeacherAction};
use crate::core::IdeaId;
use crate::domains::vote::{IdeaSubject, VoteAggregator};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::database::{DatabaseInterface, IdeaQuery, IdeaSort};
use crate::infrastructure::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{Category, Idea, IdeaStatus, UserRole, VoteType};

#[derive(Debug, Clone, Deserialize)]
pub struct NewIdea {
    pub title: String,
    pub description: String,
    pub category: Category,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdeaFilter {
    pub category: Option<Category>,
    pub status: Option<IdeaStatus>,
    pub sort: Option<IdeaSort>,
}

impl From<IdeaFilter> for IdeaQuery {
    fn from(filter: IdeaFilter) -> Self {
        IdeaQuery {
            category: filter.category,
            status: filter.status,
            sort: filter.sort.unwrap_or_default(),
        }
    }
}

/// An idea as a viewer sees it: resolved names plus their own vote.
#[derive(Debug, Clone, Serialize)]
pub struct IdeaView {
    #[serde(flatten)]
    pub idea: Idea,
    pub author_name: Option<String>,
    pub reviewer_name: Option<String>,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdeaStats {
    pub total: i64,
    pub new: i64,
    pub under_review: i64,
    pub forwarded: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl IdeaStats {
    fn from_counts(counts: &HashMap<IdeaStatus, i64>) -> Self {
        let count = |status| counts.get(&status).copied().unwrap_or(0);
        Self {
            total: counts.values().sum(),
            new: count(IdeaStatus::New),
            under_review: count(IdeaStatus::UnderReview),
            forwarded: count(IdeaStatus::Forwarded),
            approved: count(IdeaStatus::Approved),
            rejected: count(IdeaStatus::Rejected),
        }
    }
}

#[derive(Clone)]
pub struct IdeaService {
    db: Arc<dyn DatabaseInterface>,
    profiles: Arc<ProfileCache>,
    votes: VoteAggregator<IdeaSubject>,
    feed: ChangeFeed,
}

impl IdeaService {
    pub fn new(
        db: Arc<dyn DatabaseInterface>,
        profiles: Arc<ProfileCache>,
        votes: VoteAggregator<IdeaSubject>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            db,
            profiles,
            votes,
            feed,
        }
    }

    pub async fn create_idea(&self, vc: &ViewerContext, new_idea: NewIdea) -> AppResult<IdeaView> {
        let author_id = vc.require_user()?;
        let title = new_idea.title.trim();
        let description = new_idea.description.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if description.is_empty() {
            return Err(AppError::Validation("description is required".to_string()));
        }

        let idea = Idea::new(
            author_id,
            title.to_string(),
            description.to_string(),
            new_idea.category,
            Utc::now(),
        );
        self.db.create_idea(&idea).await?;
        info!("Idea {} submitted by {} in {}", idea.id, author_id, idea.category);

        self.feed.publish(
            ChangeEvent::new(Table::Ideas, ChangeKind::Insert, idea.id)
                .with_key("author_id", author_id),
        );
        self.view(vc, idea).await
    }

    pub async fn get_idea(&self, vc: &ViewerContext, id: IdeaId) -> AppResult<IdeaView> {
        let idea = self.load(id).await?;
        self.view(vc, idea).await
    }

    pub async fn list_ideas(&self, vc: &ViewerContext, filter: IdeaFilter) -> AppResult<Vec<IdeaView>> {
        let ideas = self.db.list_ideas(&filter.into()).await?;
        self.views(vc, ideas).await
    }

    /// Forwarded ideas waiting on the principal axis
    pub async fn principal_queue(&self, vc: &ViewerContext) -> AppResult<Vec<IdeaView>> {
        vc.require_role(UserRole::can_decide, "view the principal queue")?;
        let query = IdeaQuery {
            status: Some(IdeaStatus::Forwarded),
            ..IdeaQuery::default()
        };
        let ideas = self.db.list_ideas(&query).await?;
        self.views(vc, ideas).await
    }

    pub async fn stats(&self) -> AppResult<IdeaStats> {
        let counts = self.db.count_ideas_by_status().await?;
        Ok(IdeaStats::from_counts(&counts))
    }

    pub async fn teacher_action(
        &self,
        vc: &ViewerContext,
        id: IdeaId,
        action: TeacherAction,
    ) -> AppResult<IdeaView> {
        vc.require_role(UserRole::can_triage, "review ideas")?;
        let reviewer = vc.require_user()?;

        let idea = self.load(id).await?;
        let review = plan_teacher_transition(&idea, &action, reviewer, Utc::now())?;

        if !self.db.apply_teacher_review(id, idea.status, &review).await? {
            return Err(AppError::Conflict(format!(
                "Idea {} changed while it was being reviewed",
                id
            )));
        }
        info!(
            "Idea {} {} -> {} by {} ({})",
            id,
            idea.status,
            review.status,
            reviewer,
            action.name()
        );

        self.publish_update(&idea);
        self.get_idea(vc, id).await
    }

    pub async fn principal_action(
        &self,
        vc: &ViewerContext,
        id: IdeaId,
        action: PrincipalAction,
    ) -> AppResult<IdeaView> {
        vc.require_role(UserRole::can_decide, "decide on forwarded ideas")?;

        let idea = self.load(id).await?;
        let decision = plan_principal_transition(&idea, &action, Utc::now())?;

        if !self
            .db
            .apply_principal_decision(id, idea.principal_status, &decision)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Idea {} changed while a decision was being recorded",
                id
            )));
        }
        info!(
            "Idea {} principal decision {} by {:?}",
            id, decision.principal_status, vc.user_id
        );

        self.publish_update(&idea);
        self.get_idea(vc, id).await
    }

    /// Administrative override outside the workflow. Votes and comments go with the idea.
    pub async fn delete_idea(&self, vc: &ViewerContext, id: IdeaId) -> AppResult<()> {
        vc.require_role(UserRole::is_admin, "delete ideas")?;
        if !self.db.delete_idea(id).await? {
            return Err(AppError::NotFound(format!("Idea {} not found", id)));
        }
        info!("Idea {} deleted by {:?}", id, vc.user_id);
        self.feed
            .publish(ChangeEvent::new(Table::Ideas, ChangeKind::Delete, id));
        Ok(())
    }

    async fn load(&self, id: IdeaId) -> AppResult<Idea> {
        self.db
            .get_idea(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Idea {} not found", id)))
    }

    fn publish_update(&self, idea: &Idea) {
        self.feed.publish(
            ChangeEvent::new(Table::Ideas, ChangeKind::Update, idea.id)
                .with_key("author_id", idea.author_id),
        );
    }

    async fn view(&self, vc: &ViewerContext, idea: Idea) -> AppResult<IdeaView> {
        let mut views = self.views(vc, vec![idea]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("idea view went missing".to_string()))
    }

    async fn views(&self, vc: &ViewerContext, ideas: Vec<Idea>) -> AppResult<Vec<IdeaView>> {
        let user_votes = self.votes.viewer_votes(vc).await?;
        let profiles = &self.profiles;

        try_join_all(ideas.into_iter().map(|idea| {
            let user_vote = user_votes.get(&idea.id).copied();
            async move {
                let author_name = profiles.display_name(idea.author_id).await?;
                let reviewer_name = match idea.reviewed_by {
                    Some(reviewer) => profiles.display_name(reviewer).await?,
                    None => None,
                };
                Ok::<_, AppError>(IdeaView {
                    idea,
                    author_name,
                    reviewer_name,
                    user_vote,
                })
            }
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_fill_missing_statuses() {
        let mut counts = HashMap::new();
        counts.insert(IdeaStatus::New, 3);
        counts.insert(IdeaStatus::Forwarded, 1);
        let stats = IdeaStats::from_counts(&counts);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.new, 3);
        assert_eq!(stats.forwarded, 1);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn test_filter_defaults_to_recent() {
        let query: IdeaQuery = IdeaFilter::default().into();
        assert_eq!(query.sort, IdeaSort::Recent);
        assert!(query.category.is_none());
    }
}
