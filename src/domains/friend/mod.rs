// Friends - directed request edges; an accepted friendship is an accepted edge each way

use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::core::{FriendshipId, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::database::DatabaseInterface;
use crate::infrastructure::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{FriendStatus, Friendship, Profile};

/// A friendship edge together with the profile on the other end.
#[derive(Debug, Clone, Serialize)]
pub struct FriendEntry {
    pub friendship: Friendship,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct FriendService {
    db: Arc<dyn DatabaseInterface>,
    profiles: Arc<ProfileCache>,
    feed: ChangeFeed,
}

impl FriendService {
    pub fn new(db: Arc<dyn DatabaseInterface>, profiles: Arc<ProfileCache>, feed: ChangeFeed) -> Self {
        Self { db, profiles, feed }
    }

    pub async fn send_request(&self, vc: &ViewerContext, friend_id: UserId) -> AppResult<Friendship> {
        let user_id = vc.require_user()?;
        if user_id == friend_id {
            return Err(AppError::Validation("cannot befriend yourself".to_string()));
        }
        if self.profiles.get(friend_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Profile {} not found", friend_id)));
        }
        if let Some(existing) = self.db.find_friendship(user_id, friend_id).await? {
            return Err(AppError::Conflict(format!(
                "a {} friendship with {} already exists",
                existing.status, friend_id
            )));
        }
        if let Some(incoming) = self.db.find_friendship(friend_id, user_id).await? {
            return Err(AppError::Conflict(format!(
                "{} already has a {} request with you",
                friend_id, incoming.status
            )));
        }

        let request = Friendship {
            id: FriendshipId::new(),
            user_id,
            friend_id,
            status: FriendStatus::Pending,
            created_at: Utc::now(),
        };
        self.db.create_friendship(&request).await?;
        info!("Friend request {} from {} to {}", request.id, user_id, friend_id);

        self.publish(&request, ChangeKind::Insert);
        Ok(request)
    }

    /// Only the recipient accepts. Also stores the reverse accepted edge.
    pub async fn accept(&self, vc: &ViewerContext, request_id: FriendshipId) -> AppResult<Friendship> {
        let user_id = vc.require_user()?;
        let mut request = self.load(request_id).await?;
        if request.friend_id != user_id {
            return Err(AppError::Forbidden(
                "only the recipient can accept a friend request".to_string(),
            ));
        }
        if request.status != FriendStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "friend request {} is {}",
                request_id, request.status
            )));
        }

        self.db
            .update_friendship_status(request_id, FriendStatus::Accepted)
            .await?;
        request.status = FriendStatus::Accepted;
        self.publish(&request, ChangeKind::Update);

        match self.db.find_friendship(user_id, request.user_id).await? {
            Some(reverse) if reverse.status == FriendStatus::Accepted => {}
            Some(reverse) => {
                self.db
                    .update_friendship_status(reverse.id, FriendStatus::Accepted)
                    .await?;
                self.publish(&reverse, ChangeKind::Update);
            }
            None => {
                let reverse = Friendship {
                    id: FriendshipId::new(),
                    user_id,
                    friend_id: request.user_id,
                    status: FriendStatus::Accepted,
                    created_at: Utc::now(),
                };
                self.db.create_friendship(&reverse).await?;
                self.publish(&reverse, ChangeKind::Insert);
            }
        }

        info!("{} accepted friend request from {}", user_id, request.user_id);
        Ok(request)
    }

    /// Either side may drop a pending request.
    pub async fn reject(&self, vc: &ViewerContext, request_id: FriendshipId) -> AppResult<()> {
        let user_id = vc.require_user()?;
        let request = self.load(request_id).await?;
        if request.friend_id != user_id && request.user_id != user_id {
            return Err(AppError::Forbidden(
                "not a participant in this friend request".to_string(),
            ));
        }
        if request.status != FriendStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "friend request {} is {}",
                request_id, request.status
            )));
        }

        self.db.delete_friendship(request_id).await?;
        info!("Friend request {} dropped by {}", request_id, user_id);
        self.publish(&request, ChangeKind::Delete);
        Ok(())
    }

    pub async fn remove_friend(&self, vc: &ViewerContext, friend_id: UserId) -> AppResult<()> {
        let user_id = vc.require_user()?;
        let removed = self.db.delete_friendships_between(user_id, friend_id).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("{} is not a friend", friend_id)));
        }
        info!("{} removed friend {} ({} edges)", user_id, friend_id, removed);
        self.feed.publish(
            ChangeEvent::new(Table::Friends, ChangeKind::Delete, user_id)
                .with_key("user_id", user_id)
                .with_key("friend_id", friend_id),
        );
        Ok(())
    }

    pub async fn are_friends(&self, vc: &ViewerContext, other: UserId) -> AppResult<bool> {
        let user_id = vc.require_user()?;
        Ok(matches!(
            self.db.find_friendship(user_id, other).await?,
            Some(edge) if edge.status == FriendStatus::Accepted
        ))
    }

    pub async fn friends(&self, vc: &ViewerContext) -> AppResult<Vec<FriendEntry>> {
        let user_id = vc.require_user()?;
        let edges = self
            .db
            .list_friendships_from(user_id, FriendStatus::Accepted)
            .await?;
        self.with_profiles(edges, |edge| edge.friend_id).await
    }

    /// Incoming requests awaiting the viewer, with the requester's profile.
    pub async fn pending_requests(&self, vc: &ViewerContext) -> AppResult<Vec<FriendEntry>> {
        let user_id = vc.require_user()?;
        let edges = self
            .db
            .list_friendships_to(user_id, FriendStatus::Pending)
            .await?;
        self.with_profiles(edges, |edge| edge.user_id).await
    }

    async fn with_profiles(
        &self,
        edges: Vec<Friendship>,
        other: fn(&Friendship) -> UserId,
    ) -> AppResult<Vec<FriendEntry>> {
        let profiles = &self.profiles;
        let entries = try_join_all(edges.into_iter().map(|friendship| async move {
            let profile = profiles.get(other(&friendship)).await?;
            Ok::<_, AppError>(profile.map(|profile| FriendEntry {
                friendship,
                profile,
            }))
        }))
        .await?;
        Ok(entries.into_iter().flatten().collect())
    }

    async fn load(&self, id: FriendshipId) -> AppResult<Friendship> {
        self.db
            .get_friendship(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Friend request {} not found", id)))
    }

    fn publish(&self, edge: &Friendship, kind: ChangeKind) {
        self.feed.publish(
            ChangeEvent::new(Table::Friends, kind, edge.id)
                .with_key("user_id", edge.user_id)
                .with_key("friend_id", edge.friend_id),
        );
    }
}
