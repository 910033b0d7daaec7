mod common;

use common::fixture;
use school_ideas::{
    core::UserId,
    domains::profile::{NewProfile, ProfileUpdate},
    error::AppError,
    infrastructure::viewer::ViewerContext,
    models::{SocialPlatform, UserRole},
};

#[tokio::test]
async fn test_update_profile_names() {
    let fx = fixture().await;
    let john = fx.vc(&fx.student);
    let profiles = &fx.state.profiles;

    // Someone else's username is taken
    let err = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                username: Some("janestudent".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Keeping your own username is fine
    let updated = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                username: Some("johnstudent".to_string()),
                full_name: Some("  John Q. Student ".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "johnstudent");
    assert_eq!(updated.full_name.as_deref(), Some("John Q. Student"));

    let err = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                username: Some("no".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Blank clears the name, and the cached copy follows
    let cleared = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                full_name: Some("   ".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.full_name, None);
    assert_eq!(cleared.display_name(), "johnstudent");
    assert_eq!(
        profiles.get_profile(fx.student.id).await.unwrap().full_name,
        None
    );

    let err = profiles
        .update_profile(&ViewerContext::anonymous("anon".into()), ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_create_profile_role_rules() {
    let fx = fixture().await;
    let profiles = &fx.state.profiles;
    let new = |username: &str, role: Option<UserRole>| NewProfile {
        id: None,
        username: username.to_string(),
        full_name: None,
        role,
    };

    let anon = ViewerContext::anonymous("signup".into());
    let student = profiles.create_profile(&anon, new("newkid", None)).await.unwrap();
    assert_eq!(student.role, UserRole::Student);

    let err = profiles
        .create_profile(&anon, new("fake_teacher", Some(UserRole::Teacher)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    let err = profiles
        .create_profile(&fx.vc(&fx.teacher), new("fake_principal", Some(UserRole::Principal)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let teacher = profiles
        .create_profile(&fx.vc(&fx.admin), new("mr_lee", Some(UserRole::Teacher)))
        .await
        .unwrap();
    assert_eq!(teacher.role, UserRole::Teacher);

    // Admin is never handed out at creation, even by an admin
    let err = profiles
        .create_profile(&fx.vc(&fx.admin), new("second_admin", Some(UserRole::Admin)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = profiles
        .create_profile(&anon, new("johnstudent", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_set_role_is_admin_only() {
    let fx = fixture().await;
    let profiles = &fx.state.profiles;

    let err = profiles
        .set_role(&fx.vc(&fx.principal), fx.student.id, UserRole::Teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = profiles
        .set_role(&fx.vc(&fx.student), fx.student.id, UserRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Warm the cache first so the promotion has something to invalidate
    assert_eq!(profiles.get_profile(fx.student.id).await.unwrap().role, UserRole::Student);
    let promoted = profiles
        .set_role(&fx.vc(&fx.admin), fx.student.id, UserRole::Teacher)
        .await
        .unwrap();
    assert_eq!(promoted.role, UserRole::Teacher);
    assert_eq!(profiles.get_profile(fx.student.id).await.unwrap().role, UserRole::Teacher);

    let err = profiles
        .set_role(&fx.vc(&fx.admin), UserId::new(), UserRole::Teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_profile() {
    let fx = fixture().await;
    let profiles = &fx.state.profiles;
    fx.submit_idea("Recycling bins", school_ideas::models::Category::Environment)
        .await;
    assert!(profiles.get_profile(fx.student.id).await.is_ok());

    let err = profiles
        .delete_profile(&fx.vc(&fx.principal), fx.student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    profiles
        .delete_profile(&fx.vc(&fx.admin), fx.student.id)
        .await
        .unwrap();
    let err = profiles.get_profile(fx.student.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(profiles
        .list_profiles()
        .await
        .unwrap()
        .iter()
        .all(|p| p.id != fx.student.id));

    // Authored ideas went with the profile
    assert_eq!(fx.state.ideas.stats().await.unwrap().total, 0);

    let err = profiles
        .delete_profile(&fx.vc(&fx.admin), fx.student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_social_links() {
    let fx = fixture().await;
    let john = fx.vc(&fx.student);
    let profiles = &fx.state.profiles;

    let linked = profiles
        .set_social_link(&john, SocialPlatform::Instagram, " @lincoln_high.art ")
        .await
        .unwrap();
    assert_eq!(linked.instagram.as_deref(), Some("lincoln_high.art"));
    assert_eq!(linked.social_handle(SocialPlatform::TikTok), None);

    let err = profiles
        .set_social_link(&john, SocialPlatform::TikTok, &"x".repeat(25))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = profiles
        .set_social_link(
            &ViewerContext::anonymous("anon".into()),
            SocialPlatform::TikTok,
            "someone",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Edited alongside the names; empty removes
    let updated = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                tiktok: Some("johnmakes".to_string()),
                instagram: Some(String::new()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tiktok.as_deref(), Some("johnmakes"));
    assert_eq!(updated.instagram, None);

    let err = profiles
        .update_profile(
            &john,
            ProfileUpdate {
                full_name: Some("Not Applied".to_string()),
                instagram: Some("bad handle".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(
        profiles.get_profile(fx.student.id).await.unwrap().full_name.as_deref(),
        Some("John Student")
    );

    let removed = profiles
        .remove_social_link(&john, SocialPlatform::TikTok)
        .await
        .unwrap();
    assert_eq!(removed.tiktok, None);
    assert_eq!(profiles.get_profile(fx.student.id).await.unwrap().tiktok, None);
}
