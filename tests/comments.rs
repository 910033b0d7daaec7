mod common;

use common::fixture;
use school_ideas::{
    core::{CommentId, IdeaId},
    domains::comment::NewComment,
    error::AppError,
    infrastructure::viewer::ViewerContext,
    models::Category,
};

fn top_level(content: &str) -> NewComment {
    NewComment {
        content: content.to_string(),
        parent_id: None,
    }
}

#[tokio::test]
async fn test_thread_nests_replies_in_order() {
    let fx = fixture().await;
    let id = fx.submit_idea("Add More Healthy Food Options", Category::FoodService).await;
    let comments = &fx.state.comments;

    let first = comments
        .add_comment(&fx.vc(&fx.teacher), id, top_level("Great idea!"))
        .await
        .unwrap();
    let reply = comments
        .add_comment(
            &fx.vc(&fx.student),
            id,
            NewComment {
                content: "  A salad bar would be a good start.  ".to_string(),
                parent_id: Some(first.comment.id),
            },
        )
        .await
        .unwrap();
    let third = comments
        .add_comment(&fx.vc(&fx.principal), id, top_level("Let's cost it"))
        .await
        .unwrap();
    assert_eq!(reply.comment.content, "A salad bar would be a good start.");
    assert_eq!(reply.author_name.as_deref(), Some("John Student"));

    let thread = comments
        .thread(&ViewerContext::anonymous("anon".into()), id)
        .await
        .unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].comment.id, first.comment.id);
    assert_eq!(thread[0].author_name.as_deref(), Some("Ms. Johnson"));
    assert_eq!(thread[0].replies.len(), 1);
    assert_eq!(thread[0].replies[0].comment.id, reply.comment.id);
    assert!(thread[0].replies[0].replies.is_empty());
    assert_eq!(thread[1].comment.id, third.comment.id);
    assert!(thread[1].replies.is_empty());

    let idea = fx.state.ideas.get_idea(&fx.vc(&fx.student), id).await.unwrap();
    assert_eq!(idea.idea.comment_count, 3);
}

#[tokio::test]
async fn test_reply_must_stay_on_the_same_idea() {
    let fx = fixture().await;
    let first_idea = fx.submit_idea("Bus shelter", Category::Transportation).await;
    let second_idea = fx.submit_idea("Bike lane", Category::Transportation).await;

    let parent = fx
        .state
        .comments
        .add_comment(&fx.vc(&fx.teacher), first_idea, top_level("Talk to the council"))
        .await
        .unwrap();

    let err = fx
        .state
        .comments
        .add_comment(
            &fx.vc(&fx.student),
            second_idea,
            NewComment {
                content: "Agreed".to_string(),
                parent_id: Some(parent.comment.id),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = fx
        .state
        .comments
        .add_comment(
            &fx.vc(&fx.student),
            first_idea,
            NewComment {
                content: "Agreed".to_string(),
                parent_id: Some(CommentId::new()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let idea = fx
        .state
        .ideas
        .get_idea(&fx.vc(&fx.student), second_idea)
        .await
        .unwrap();
    assert_eq!(idea.idea.comment_count, 0);
}

#[tokio::test]
async fn test_comment_rejections() {
    let fx = fixture().await;
    let id = fx.submit_idea("Art wall", Category::Other).await;

    let err = fx
        .state
        .comments
        .add_comment(&fx.vc(&fx.student), id, top_level("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = fx
        .state
        .comments
        .add_comment(&fx.vc(&fx.student), IdeaId::new(), top_level("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx
        .state
        .comments
        .add_comment(&ViewerContext::anonymous("anon".into()), id, top_level("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = fx
        .state
        .comments
        .thread(&fx.vc(&fx.student), IdeaId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
