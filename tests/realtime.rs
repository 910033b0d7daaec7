mod common;

use std::time::Duration;

use common::fixture;
use school_ideas::{
    domains::{comment::NewComment, idea::IdeaFilter},
    infrastructure::{
        realtime::{spawn_refresher, ChangeFilter, ChangeKind, Table},
        viewer::ViewerContext,
    },
    models::{Category, VoteType},
};

#[tokio::test]
async fn test_idea_list_refreshes_on_change() {
    let fx = fixture().await;
    fx.submit_idea("Solar panels", Category::Environment).await;

    let ideas = fx.state.ideas.clone();
    let subscription = fx
        .state
        .feed
        .subscribe(ChangeFilter::table(Table::Ideas).or_table(Table::Votes));
    let (mut snapshots, handle) = spawn_refresher(subscription, None, move || {
        let ideas = ideas.clone();
        async move {
            ideas
                .list_ideas(&ViewerContext::anonymous("refresher".into()), IdeaFilter::default())
                .await
        }
    });

    let first = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|snapshot| snapshot.is_some()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone()
    .unwrap();
    assert_eq!(first.len(), 1);

    let second_id = fx.submit_idea("Study pods", Category::Facilities).await;
    let refreshed = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|snapshot| matches!(snapshot, Some(list) if list.len() == 2)),
    )
    .await
    .unwrap()
    .is_ok();
    assert!(refreshed);

    fx.state
        .idea_votes
        .cast_vote(&fx.vc(&fx.student), second_id, VoteType::Up)
        .await
        .unwrap();
    let voted = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|snapshot| {
            matches!(snapshot, Some(list) if list.iter().any(|v| v.idea.id == second_id && v.idea.votes == 1))
        }),
    )
    .await
    .unwrap()
    .is_ok();
    assert!(voted);

    drop(snapshots);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_comment_events_carry_the_idea() {
    let fx = fixture().await;
    let idea_id = fx.submit_idea("Chess club", Category::Clubs).await;
    let other_id = fx.submit_idea("Drama club", Category::Clubs).await;

    let mut subscription = fx
        .state
        .feed
        .subscribe(ChangeFilter::table(Table::Comments).key("idea_id", idea_id));

    fx.state
        .comments
        .add_comment(
            &fx.vc(&fx.teacher),
            other_id,
            NewComment {
                content: "Auditions next week".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();
    let added = fx
        .state
        .comments
        .add_comment(
            &fx.vc(&fx.student),
            idea_id,
            NewComment {
                content: "Tuesdays please".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.table, Table::Comments);
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.row_id, Some(added.comment.id.into()));
    assert_eq!(event.key("idea_id"), Some(idea_id.into()));
}

#[tokio::test]
async fn test_inbox_watch_tracks_unread_counts() {
    let fx = fixture().await;
    let poll = fx.state.config.message_poll_interval();
    let (mut inbox, _handle) = fx
        .state
        .messages
        .watch_conversations(fx.vc(&fx.other_student), poll)
        .unwrap();

    let empty = tokio::time::timeout(Duration::from_secs(5), inbox.wait_for(|s| s.is_some()))
        .await
        .unwrap()
        .map(|snapshot| matches!(&*snapshot, Some(list) if list.is_empty()))
        .unwrap();
    assert!(empty);

    fx.state
        .messages
        .send(&fx.vc(&fx.student), fx.other_student.id, "See you at club")
        .await
        .unwrap();
    let unread = tokio::time::timeout(
        Duration::from_secs(5),
        inbox.wait_for(|s| matches!(s, Some(list) if list.len() == 1 && list[0].unread_count == 1)),
    )
    .await
    .unwrap()
    .is_ok();
    assert!(unread);

    fx.state
        .messages
        .conversation(&fx.vc(&fx.other_student), fx.student.id)
        .await
        .unwrap();
    let read = tokio::time::timeout(
        Duration::from_secs(5),
        inbox.wait_for(|s| matches!(s, Some(list) if list.len() == 1 && list[0].unread_count == 0)),
    )
    .await
    .unwrap()
    .is_ok();
    assert!(read);

    assert!(fx
        .state
        .messages
        .watch_conversations(ViewerContext::anonymous("anon".into()), poll)
        .is_err());
}

#[tokio::test]
async fn test_message_events_name_the_message_and_both_sides() {
    let fx = fixture().await;
    let mut johns = fx.state.feed.subscribe(
        ChangeFilter::table(Table::Messages).any_key(&["sender_id", "recipient_id"], fx.student.id),
    );

    // Traffic between other people is filtered out
    fx.state
        .messages
        .send(&fx.vc(&fx.teacher), fx.principal.id, "Budget meeting at 4")
        .await
        .unwrap();
    let sent = fx
        .state
        .messages
        .send(&fx.vc(&fx.other_student), fx.student.id, "Lunch?")
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), johns.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.row_id, Some(sent.id.into()));

    fx.state
        .messages
        .conversation(&fx.vc(&fx.student), fx.other_student.id)
        .await
        .unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), johns.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(event.row_id, Some(sent.id.into()));
    assert_eq!(event.key("sender_id"), Some(fx.other_student.id.into()));
    assert_eq!(event.key("recipient_id"), Some(fx.student.id.into()));
}
