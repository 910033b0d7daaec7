// Profiles - accounts mirrored from the identity provider, plus role administration

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::database::{DatabaseInterface, DatabaseTransaction, VoteTable};
use crate::infrastructure::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{Profile, SocialPlatform, UserRole};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("username pattern compiles"));
static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]+$").expect("handle pattern compiles"));

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    /// Id issued by the identity provider; generated when absent
    pub id: Option<UserId>,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub username: Option<String>,
    /// Empty string removes the link
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
}

pub fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::Validation(format!(
            "username {:?} must be 3-30 letters, digits or underscores",
            username
        )));
    }
    Ok(username.to_string())
}

/// Normalizes a social handle: trimmed, leading `@` dropped.
pub fn validate_handle(platform: SocialPlatform, handle: &str) -> AppResult<String> {
    let handle = handle.trim();
    let handle = handle.strip_prefix('@').unwrap_or(handle);
    let max = platform.max_handle_len();
    if handle.is_empty() || handle.len() > max || !HANDLE_RE.is_match(handle) {
        return Err(AppError::Validation(format!(
            "{} handle {:?} must be 1-{} letters, digits, dots or underscores",
            platform, handle, max
        )));
    }
    Ok(handle.to_string())
}

fn clean_full_name(full_name: Option<String>) -> Option<String> {
    full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<dyn DatabaseInterface>,
    cache: Arc<ProfileCache>,
    feed: ChangeFeed,
}

impl ProfileService {
    pub fn new(db: Arc<dyn DatabaseInterface>, cache: Arc<ProfileCache>, feed: ChangeFeed) -> Self {
        Self { db, cache, feed }
    }

    /// Register a profile. Anyone may sign up as a student; any other role must come
    /// from an admin. Admin itself is only granted through `set_role`.
    pub async fn create_profile(&self, vc: &ViewerContext, new_profile: NewProfile) -> AppResult<Profile> {
        let username = validate_username(&new_profile.username)?;
        let role = new_profile.role.unwrap_or(UserRole::Student);
        if role.is_admin() {
            return Err(AppError::Forbidden(
                "admin role can only be granted by an admin".to_string(),
            ));
        }
        if role != UserRole::Student {
            vc.require_role(UserRole::is_admin, "assign roles")?;
        }
        if self.db.get_profile_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict(format!("username {} is taken", username)));
        }

        let now = Utc::now();
        let profile = Profile {
            id: new_profile.id.unwrap_or_default(),
            username,
            full_name: clean_full_name(new_profile.full_name),
            role,
            avatar_url: None,
            instagram: None,
            tiktok: None,
            reputation: 0,
            join_date: now.date_naive(),
            created_at: now,
            updated_at: now,
        };
        self.db.create_profile(&profile).await?;
        info!("Profile {} created as {} ({})", profile.id, profile.username, profile.role);

        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeKind::Insert, profile.id));
        Ok(profile)
    }

    pub async fn get_profile(&self, id: UserId) -> AppResult<Profile> {
        self.cache
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", id)))
    }

    pub async fn list_profiles(&self) -> AppResult<Vec<Profile>> {
        self.db.list_profiles().await
    }

    /// Edit the viewer's own names and social links. A username held by someone else is a conflict.
    pub async fn update_profile(&self, vc: &ViewerContext, update: ProfileUpdate) -> AppResult<Profile> {
        let user_id = vc.require_user()?;
        let current = self.get_profile(user_id).await?;

        let username = match update.username {
            Some(username) => validate_username(&username)?,
            None => current.username.clone(),
        };
        if username != current.username {
            if let Some(holder) = self.db.get_profile_by_username(&username).await? {
                if holder.id != user_id {
                    return Err(AppError::Conflict(format!("username {} is taken", username)));
                }
            }
        }
        let full_name = match update.full_name {
            Some(full_name) => clean_full_name(Some(full_name)),
            None => current.full_name.clone(),
        };

        let links = [
            (SocialPlatform::Instagram, update.instagram),
            (SocialPlatform::TikTok, update.tiktok),
        ];
        let mut handles = Vec::new();
        for (platform, handle) in links {
            match handle {
                Some(handle) if handle.trim().is_empty() => handles.push((platform, None)),
                Some(handle) => handles.push((platform, Some(validate_handle(platform, &handle)?))),
                None => {}
            }
        }

        let now = Utc::now();
        self.db
            .update_profile_names(user_id, full_name.as_deref(), &username, now)
            .await?;
        for (platform, handle) in &handles {
            self.db
                .update_social_link(user_id, *platform, handle.as_deref(), now)
                .await?;
        }
        self.cache.invalidate(user_id).await;
        info!("Profile {} updated", user_id);

        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeKind::Update, user_id));
        self.get_profile(user_id).await
    }

    pub async fn set_role(&self, vc: &ViewerContext, user_id: UserId, role: UserRole) -> AppResult<Profile> {
        vc.require_role(UserRole::is_admin, "change roles")?;
        if !self.db.update_profile_role(user_id, role, Utc::now()).await? {
            return Err(AppError::NotFound(format!("Profile {} not found", user_id)));
        }
        self.cache.invalidate(user_id).await;
        info!("Profile {} is now {} (by {:?})", user_id, role, vc.user_id);

        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeKind::Update, user_id));
        self.get_profile(user_id).await
    }

    /// Point the viewer's profile at a social account. A leading `@` is accepted.
    pub async fn set_social_link(
        &self,
        vc: &ViewerContext,
        platform: SocialPlatform,
        handle: &str,
    ) -> AppResult<Profile> {
        let handle = validate_handle(platform, handle)?;
        self.write_social_link(vc, platform, Some(&handle)).await
    }

    pub async fn remove_social_link(&self, vc: &ViewerContext, platform: SocialPlatform) -> AppResult<Profile> {
        self.write_social_link(vc, platform, None).await
    }

    async fn write_social_link(
        &self,
        vc: &ViewerContext,
        platform: SocialPlatform,
        handle: Option<&str>,
    ) -> AppResult<Profile> {
        let user_id = vc.require_user()?;
        if !self
            .db
            .update_social_link(user_id, platform, handle, Utc::now())
            .await?
        {
            return Err(AppError::NotFound(format!("Profile {} not found", user_id)));
        }
        self.cache.invalidate(user_id).await;
        info!("Profile {} {} link set to {:?}", user_id, platform, handle);

        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeKind::Update, user_id));
        self.get_profile(user_id).await
    }

    /// Removes the profile and, through cascades, everything it authored or cast.
    /// Counters on surviving ideas and comments are re-derived in the same transaction.
    pub async fn delete_profile(&self, vc: &ViewerContext, user_id: UserId) -> AppResult<()> {
        vc.require_role(UserRole::is_admin, "delete profiles")?;

        let mut tx = self.db.begin_transaction().await?;
        let touched = match self.delete_cascade(&mut tx, user_id).await {
            Ok(touched) => touched,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Profile delete rollback failed: {}", rollback_err);
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        self.cache.invalidate(user_id).await;
        info!(
            "Profile {} deleted by {:?}; {} ideas and {} comments recounted",
            user_id,
            vc.user_id,
            touched.ideas.len(),
            touched.comments.len()
        );

        for idea_id in touched.ideas {
            self.feed
                .publish(ChangeEvent::new(Table::Ideas, ChangeKind::Update, idea_id));
        }
        for comment_id in touched.comments {
            self.feed
                .publish(ChangeEvent::new(Table::Comments, ChangeKind::Update, comment_id));
        }
        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeKind::Delete, user_id));
        Ok(())
    }

    async fn delete_cascade(&self, tx: &mut DatabaseTransaction, user_id: UserId) -> AppResult<Touched> {
        let voted_ideas = self
            .db
            .voted_subjects_tx(tx, VoteTable::IdeaVotes, user_id)
            .await?;
        let voted_comments = self
            .db
            .voted_subjects_tx(tx, VoteTable::CommentVotes, user_id)
            .await?;
        let commented = self.db.commented_ideas_tx(tx, user_id).await?;

        if !self.db.delete_profile_tx(tx, user_id).await? {
            return Err(AppError::NotFound(format!("Profile {} not found", user_id)));
        }

        let mut touched = Touched::default();
        for subject in voted_ideas {
            if self.recount_votes_tx(tx, VoteTable::IdeaVotes, subject).await? {
                touched.ideas.push(subject);
            }
        }
        for subject in voted_comments {
            if self.recount_votes_tx(tx, VoteTable::CommentVotes, subject).await? {
                touched.comments.push(subject);
            }
        }
        for idea_id in commented {
            if self.db.recount_comments_tx(tx, idea_id).await?.is_some() {
                let subject: Uuid = idea_id.into();
                if !touched.ideas.contains(&subject) {
                    touched.ideas.push(subject);
                }
            }
        }
        Ok(touched)
    }

    /// False when the subject went with the profile.
    async fn recount_votes_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject: Uuid,
    ) -> AppResult<bool> {
        if self.db.vote_counter_tx(tx, table, subject).await?.is_none() {
            return Ok(false);
        }
        let net = self.db.tally_votes_tx(tx, table, subject).await?.net();
        self.db.set_vote_counter_tx(tx, table, subject, net).await?;
        Ok(true)
    }
}

/// Subjects whose counters a profile delete rewrote
#[derive(Default)]
struct Touched {
    ideas: Vec<Uuid>,
    comments: Vec<Uuid>,
}
