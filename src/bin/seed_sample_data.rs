// Seeds the demo accounts and a handful of ideas, votes and comments

use school_ideas::{
    app_state::AppState,
    config::Config,
    domains::{
        comment::NewComment,
        idea::{NewIdea, TeacherAction},
        profile::NewProfile,
    },
    error::{AppError, AppResult},
    infrastructure::viewer::ViewerContext,
    models::{Category, Profile, UserRole, VoteType},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn ensure_profile(
    state: &AppState,
    username: &str,
    full_name: &str,
    role: UserRole,
) -> AppResult<Profile> {
    let created = state
        .profiles
        .create_profile(
            &ViewerContext::system("seed".into()),
            NewProfile {
                id: None,
                username: username.to_string(),
                full_name: Some(full_name.to_string()),
                role: Some(role),
            },
        )
        .await;

    match created {
        Ok(profile) => Ok(profile),
        Err(AppError::Conflict(_)) => state
            .db
            .get_profile_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("profile {} vanished", username))),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    config.prepare_database_dir()?;
    info!("Seeding sample data into {}", config.database.url);
    let state = AppState::new(config).await?;

    let student = ensure_profile(&state, "johnstudent", "John Student", UserRole::Student).await?;
    let teacher = ensure_profile(&state, "mjohnson", "Ms. Johnson", UserRole::Teacher).await?;
    let principal = ensure_profile(&state, "drsmith", "Dr. Smith", UserRole::Principal).await?;

    let student_vc = ViewerContext::for_profile(&student);
    let teacher_vc = ViewerContext::for_profile(&teacher);
    let principal_vc = ViewerContext::for_profile(&principal);

    let samples = [
        (
            "Install Solar Panels on School Roof",
            "Cut the electricity bill and use the data in physics classes.",
            Category::Environment,
        ),
        (
            "Create Study Pods in the Library",
            "Small bookable rooms for group projects and quiet revision.",
            Category::Facilities,
        ),
        (
            "Add More Healthy Food Options",
            "Salad bar and vegetarian hot meals at least three days a week.",
            Category::FoodService,
        ),
        (
            "Upgrade Computer Lab Equipment",
            "The lab machines are too slow for the coding classes.",
            Category::Technology,
        ),
    ];

    let mut ideas = Vec::with_capacity(samples.len());
    for (title, description, category) in samples {
        let idea = state
            .ideas
            .create_idea(
                &student_vc,
                NewIdea {
                    title: title.to_string(),
                    description: description.to_string(),
                    category,
                },
            )
            .await?;
        ideas.push(idea.idea.id);
    }

    // Solar panels goes all the way to the principal
    state
        .ideas
        .teacher_action(&teacher_vc, ideas[0], TeacherAction::StartReview)
        .await?;
    state
        .ideas
        .teacher_action(
            &teacher_vc,
            ideas[0],
            TeacherAction::Forward {
                notes: "Needs budget review".to_string(),
            },
        )
        .await?;
    state
        .ideas
        .teacher_action(&teacher_vc, ideas[1], TeacherAction::StartReview)
        .await?;

    for (vc, idea, vote) in [
        (&student_vc, ideas[0], VoteType::Up),
        (&teacher_vc, ideas[0], VoteType::Up),
        (&principal_vc, ideas[0], VoteType::Up),
        (&teacher_vc, ideas[1], VoteType::Up),
        (&principal_vc, ideas[2], VoteType::Down),
        (&teacher_vc, ideas[3], VoteType::Up),
    ] {
        state.idea_votes.cast_vote(vc, idea, vote).await?;
    }

    let first = state
        .comments
        .add_comment(
            &teacher_vc,
            ideas[2],
            NewComment {
                content: "Great idea! I'd love to see more vegetarian options too.".to_string(),
                parent_id: None,
            },
        )
        .await?;
    state
        .comments
        .add_comment(
            &student_vc,
            ideas[2],
            NewComment {
                content: "A salad bar would be a good start.".to_string(),
                parent_id: Some(first.comment.id),
            },
        )
        .await?;
    state
        .comments
        .add_comment(
            &principal_vc,
            ideas[3],
            NewComment {
                content: "We definitely need better computers for coding classes.".to_string(),
                parent_id: None,
            },
        )
        .await?;

    let stats = state.ideas.stats().await?;
    info!(
        "Seeded {} profiles and {} ideas ({} forwarded, {} under review)",
        3, stats.total, stats.forwarded, stats.under_review
    );

    Ok(())
}
