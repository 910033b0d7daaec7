// HTTP surface - thin handlers that hand the request's viewer to the domain services

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::{
    app_state::AppState,
    core::{CommentId, FriendshipId, IdeaId, MessageId, UserId},
    domains::{
        comment::{CommentNode, NewComment},
        friend::FriendEntry,
        idea::{IdeaFilter, IdeaStats, IdeaView, NewIdea, PrincipalAction, TeacherAction},
        message::ConversationSummary,
        profile::{NewProfile, ProfileUpdate},
        vote::VoteOutcome,
    },
    error::{AppError, AppResult},
    infrastructure::middleware::{viewer_context_middleware, Vc},
    models::{Friendship, Message, Profile, SocialPlatform, UserRole, VoteType},
};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct SocialLinkRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct FriendRequestBody {
    pub friend_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<MessageId>,
}

#[derive(Debug, Serialize)]
pub struct RecountResponse {
    pub subject_id: IdeaId,
    pub votes: i64,
}

// Health

pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

// Profiles

pub async fn create_profile_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<NewProfile>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = state.profiles.create_profile(&vc, req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn list_profiles_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.profiles.list_profiles().await?))
}

pub async fn get_profile_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<UserId>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.get_profile(id).await?))
}

pub async fn update_own_profile_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.update_profile(&vc, req).await?))
}

pub async fn set_social_link_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(platform): AxumPath<SocialPlatform>,
    Json(req): Json<SocialLinkRequest>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.set_social_link(&vc, platform, &req.handle).await?))
}

pub async fn remove_social_link_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(platform): AxumPath<SocialPlatform>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.remove_social_link(&vc, platform).await?))
}

pub async fn set_role_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<UserId>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.set_role(&vc, id, req.role).await?))
}

pub async fn delete_profile_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<UserId>,
) -> AppResult<StatusCode> {
    state.profiles.delete_profile(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Ideas

pub async fn create_idea_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<NewIdea>,
) -> AppResult<(StatusCode, Json<IdeaView>)> {
    let idea = state.ideas.create_idea(&vc, req).await?;
    Ok((StatusCode::CREATED, Json(idea)))
}

pub async fn list_ideas_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(filter): Query<IdeaFilter>,
) -> AppResult<Json<Vec<IdeaView>>> {
    Ok(Json(state.ideas.list_ideas(&vc, filter).await?))
}

pub async fn idea_stats_handler(State(state): State<AppState>) -> AppResult<Json<IdeaStats>> {
    Ok(Json(state.ideas.stats().await?))
}

pub async fn principal_queue_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<IdeaView>>> {
    Ok(Json(state.ideas.principal_queue(&vc).await?))
}

pub async fn get_idea_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
) -> AppResult<Json<IdeaView>> {
    Ok(Json(state.ideas.get_idea(&vc, id).await?))
}

pub async fn delete_idea_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
) -> AppResult<StatusCode> {
    state.ideas.delete_idea(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn teacher_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
    Json(action): Json<TeacherAction>,
) -> AppResult<Json<IdeaView>> {
    Ok(Json(state.ideas.teacher_action(&vc, id, action).await?))
}

pub async fn principal_decision_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
    Json(action): Json<PrincipalAction>,
) -> AppResult<Json<IdeaView>> {
    Ok(Json(state.ideas.principal_action(&vc, id, action).await?))
}

pub async fn vote_idea_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<VoteOutcome<IdeaId>>> {
    Ok(Json(state.idea_votes.cast_vote(&vc, id, req.vote_type).await?))
}

pub async fn recount_idea_votes_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
) -> AppResult<Json<RecountResponse>> {
    let votes = state.idea_votes.recount(&vc, id).await?;
    Ok(Json(RecountResponse {
        subject_id: id,
        votes,
    }))
}

// Comments

pub async fn list_comments_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
) -> AppResult<Json<Vec<CommentNode>>> {
    Ok(Json(state.comments.thread(&vc, id).await?))
}

pub async fn add_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<IdeaId>,
    Json(req): Json<NewComment>,
) -> AppResult<(StatusCode, Json<CommentNode>)> {
    let comment = state.comments.add_comment(&vc, id, req).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn vote_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<CommentId>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<VoteOutcome<CommentId>>> {
    Ok(Json(state.comments.votes().cast_vote(&vc, id, req.vote_type).await?))
}

// Friends

pub async fn list_friends_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<FriendEntry>>> {
    Ok(Json(state.friends.friends(&vc).await?))
}

pub async fn list_friend_requests_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<FriendEntry>>> {
    Ok(Json(state.friends.pending_requests(&vc).await?))
}

pub async fn send_friend_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<FriendRequestBody>,
) -> AppResult<(StatusCode, Json<Friendship>)> {
    let request = state.friends.send_request(&vc, req.friend_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn accept_friend_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<FriendshipId>,
) -> AppResult<Json<Friendship>> {
    Ok(Json(state.friends.accept(&vc, id).await?))
}

pub async fn reject_friend_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<FriendshipId>,
) -> AppResult<StatusCode> {
    state.friends.reject(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_friend_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(user_id): AxumPath<UserId>,
) -> AppResult<StatusCode> {
    state.friends.remove_friend(&vc, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Messages

pub async fn list_conversations_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.messages.conversations(&vc).await?))
}

pub async fn get_conversation_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(user_id): AxumPath<UserId>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(state.messages.conversation(&vc, user_id).await?))
}

pub async fn send_message_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(user_id): AxumPath<UserId>,
    Json(req): Json<MessageBody>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = state.messages.send(&vc, user_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<Value>, AppError> {
    let marked = state.messages.mark_read(&vc, &req.ids).await?;
    Ok(Json(json!({ "marked": marked })))
}

// Router

pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))

        // Profiles
        .route("/profiles", post(create_profile_handler).get(list_profiles_handler))
        .route("/profiles/me", patch(update_own_profile_handler))
        .route(
            "/profiles/me/social/{platform}",
            put(set_social_link_handler).delete(remove_social_link_handler),
        )
        .route("/profiles/{id}", get(get_profile_handler).delete(delete_profile_handler))
        .route("/profiles/{id}/role", put(set_role_handler))

        // Ideas
        .route("/ideas", post(create_idea_handler).get(list_ideas_handler))
        .route("/ideas/stats", get(idea_stats_handler))
        .route("/ideas/principal-queue", get(principal_queue_handler))
        .route("/ideas/{id}", get(get_idea_handler).delete(delete_idea_handler))
        .route("/ideas/{id}/teacher-review", post(teacher_review_handler))
        .route("/ideas/{id}/principal-decision", post(principal_decision_handler))
        .route("/ideas/{id}/votes", post(vote_idea_handler))
        .route("/ideas/{id}/votes/recount", post(recount_idea_votes_handler))

        // Comments
        .route("/ideas/{id}/comments", get(list_comments_handler).post(add_comment_handler))
        .route("/comments/{id}/votes", post(vote_comment_handler))

        // Friends
        .route("/friends", get(list_friends_handler))
        .route("/friends/requests", get(list_friend_requests_handler).post(send_friend_request_handler))
        .route("/friends/requests/{id}", delete(reject_friend_request_handler))
        .route("/friends/requests/{id}/accept", post(accept_friend_request_handler))
        .route("/friends/{user_id}", delete(remove_friend_handler))

        // Messages
        .route("/messages/conversations", get(list_conversations_handler))
        .route("/messages/read", post(mark_read_handler))
        .route("/messages/{user_id}", get(get_conversation_handler).post(send_message_handler))

        .layer(middleware::from_fn_with_state(
            state,
            viewer_context_middleware::<AppState>,
        ))
}

/// Full application router: the API under `/api/v1` with permissive CORS.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", create_api_router(state.clone()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
