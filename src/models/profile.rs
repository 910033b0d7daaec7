use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;
use crate::core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    Student,
    Teacher,
    Principal,
    Admin,
}

string_enum!(UserRole {
    Student => "student",
    Teacher => "teacher",
    Principal => "principal",
    Admin => "admin",
});

impl UserRole {
    /// Teachers triage; principals and admins may step in on the teacher axis too.
    pub fn can_triage(self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Principal | UserRole::Admin)
    }

    pub fn can_decide(self) -> bool {
        matches!(self, UserRole::Principal | UserRole::Admin)
    }

    pub fn is_admin(self) -> bool {
        self == UserRole::Admin
    }
}

/// External profiles a user can link from their own profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocialPlatform {
    Instagram,
    TikTok,
}

string_enum!(SocialPlatform {
    Instagram => "instagram",
    TikTok => "tiktok",
});

impl SocialPlatform {
    /// Longest handle the platform accepts
    pub fn max_handle_len(self) -> usize {
        match self {
            SocialPlatform::Instagram => 30,
            SocialPlatform::TikTok => 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub reputation: i64,
    pub join_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Full name when set, otherwise the username.
    pub fn display_name(&self) -> String {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.username.clone(),
        }
    }

    pub fn social_handle(&self, platform: SocialPlatform) -> Option<&str> {
        match platform {
            SocialPlatform::Instagram => self.instagram.as_deref(),
            SocialPlatform::TikTok => self.tiktok.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(full_name: Option<&str>) -> Profile {
        let now = Utc::now();
        Profile {
            id: UserId::new(),
            username: "johnstudent".to_string(),
            full_name: full_name.map(str::to_string),
            role: UserRole::Student,
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
    fn test_display_name_fallback() {
        assert_eq!(profile(Some("John Student")).display_name(), "John Student");
        assert_eq!(profile(Some("   ")).display_name(), "johnstudent");
        assert_eq!(profile(None).display_name(), "johnstudent");
    }

    #[test]
    fn test_role_capabilities() {
        assert!(!UserRole::Student.can_triage());
        assert!(UserRole::Principal.can_triage());
        assert!(!UserRole::Teacher.can_decide());
        assert!(UserRole::Admin.can_decide());
        assert_eq!("principal".parse::<UserRole>().unwrap(), UserRole::Principal);
    }

    #[test]
    fn test_social_handle_lookup() {
        let mut p = profile(None);
        p.tiktok = Some("john.s".into());
        assert_eq!(p.social_handle(SocialPlatform::TikTok), Some("john.s"));
        assert_eq!(p.social_handle(SocialPlatform::Instagram), None);
        assert_eq!("tiktok".parse::<SocialPlatform>().unwrap(), SocialPlatform::TikTok);
    }
}
