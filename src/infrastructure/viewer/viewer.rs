use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::models::{Profile, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerType {
    User,
    Anonymous,
    System,
}

/// Who is acting. Passed explicitly to every service call; there is no ambient
/// "current user".
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer_type: ViewerType,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub role: Option<UserRole>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn authenticated(profile: &Profile, request_id: String) -> Self {
        Self {
            viewer_type: ViewerType::User,
            user_id: Some(profile.id),
            username: Some(profile.username.clone()),
            role: Some(profile.role),
            request_id,
        }
    }

    pub fn anonymous(request_id: String) -> Self {
        Self {
            viewer_type: ViewerType::Anonymous,
            user_id: None,
            username: None,
            role: None,
            request_id,
        }
    }

    /// Internal jobs such as seeding; passes every role check.
    pub fn system(request_id: String) -> Self {
        Self {
            viewer_type: ViewerType::System,
            user_id: None,
            username: Some("system".to_string()),
            role: Some(UserRole::Admin),
            request_id,
        }
    }

    /// Shorthand for tests and tools acting as a known profile.
    pub fn for_profile(profile: &Profile) -> Self {
        Self::authenticated(profile, format!("user-{}-{}", profile.id, Uuid::new_v4()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer_type == ViewerType::User
    }

    pub fn is_system(&self) -> bool {
        self.viewer_type == ViewerType::System
    }

    pub fn require_user(&self) -> AppResult<UserId> {
        self.user_id
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
    }

    /// Authenticated viewer whose role passes `allowed`.
    pub fn require_role(&self, allowed: impl Fn(UserRole) -> bool, action: &str) -> AppResult<()> {
        if self.is_system() {
            return Ok(());
        }
        self.require_user()?;
        match self.role {
            Some(role) if allowed(role) => Ok(()),
            Some(role) => Err(AppError::Forbidden(format!(
                "Role {} may not {}",
                role, action
            ))),
            None => Err(AppError::Forbidden(format!("No role to {}", action))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(role: UserRole) -> Profile {
        let now = Utc::now();
        Profile {
            id: UserId::new(),
            username: "mjohnson".into(),
            full_name: Some("Ms. Johnson".into()),
            role,
            avatar_url: None,
            instagram: None,
            tiktok: None,
            reputation: 0,
            join_date: now.date_naive(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_anonymous_must_sign_in() {
        let vc = ViewerContext::anonymous("req".into());
        assert!(matches!(vc.require_user(), Err(AppError::Unauthorized(_))));
        assert!(matches!(
            vc.require_role(UserRole::can_triage, "review ideas"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_role_checks() {
        let teacher = ViewerContext::for_profile(&profile(UserRole::Teacher));
        assert!(teacher.require_role(UserRole::can_triage, "review ideas").is_ok());
        assert!(matches!(
            teacher.require_role(UserRole::can_decide, "decide"),
            Err(AppError::Forbidden(_))
        ));
        assert!(ViewerContext::system("seed".into())
            .require_role(UserRole::is_admin, "delete ideas")
            .is_ok());
    }
}
