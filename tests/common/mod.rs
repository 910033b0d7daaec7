#![allow(dead_code)]

use school_ideas::{
    app_state::AppState,
    core::IdeaId,
    domains::{idea::NewIdea, profile::NewProfile},
    infrastructure::viewer::ViewerContext,
    models::{Category, Profile, UserRole},
};

pub struct Fixture {
    pub state: AppState,
    pub student: Profile,
    pub other_student: Profile,
    pub teacher: Profile,
    pub principal: Profile,
    pub admin: Profile,
}

impl Fixture {
    pub fn vc(&self, profile: &Profile) -> ViewerContext {
        ViewerContext::for_profile(profile)
    }

    pub async fn submit_idea(&self, title: &str, category: Category) -> IdeaId {
        self.state
            .ideas
            .create_idea(
                &self.vc(&self.student),
                NewIdea {
                    title: title.to_string(),
                    description: format!("{} - details", title),
                    category,
                },
            )
            .await
            .unwrap()
            .idea
            .id
    }
}

pub async fn profile(state: &AppState, username: &str, full_name: &str, role: UserRole) -> Profile {
    state
        .profiles
        .create_profile(
            &ViewerContext::system("test-setup".into()),
            NewProfile {
                id: None,
                username: username.to_string(),
                full_name: Some(full_name.to_string()),
                role: Some(role),
            },
        )
        .await
        .unwrap()
}

pub async fn fixture() -> Fixture {
    let state = AppState::in_memory().await.unwrap();

    let student = profile(&state, "johnstudent", "John Student", UserRole::Student).await;
    let other_student = profile(&state, "janestudent", "Jane Student", UserRole::Student).await;
    let teacher = profile(&state, "mjohnson", "Ms. Johnson", UserRole::Teacher).await;
    let principal = profile(&state, "drsmith", "Dr. Smith", UserRole::Principal).await;

    let admin = profile(&state, "office_admin", "School Office", UserRole::Student).await;
    let admin = state
        .profiles
        .set_role(&ViewerContext::system("test-setup".into()), admin.id, UserRole::Admin)
        .await
        .unwrap();

    Fixture {
        state,
        student,
        other_student,
        teacher,
        principal,
        admin,
    }
}
