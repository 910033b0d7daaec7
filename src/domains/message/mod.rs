// Direct messages between two profiles

use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::{MessageId, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::database::DatabaseInterface;
use crate::infrastructure::realtime::{
    spawn_refresher, ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Table,
};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{Message, Profile};

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub counterpart: Profile,
    pub last_message: Message,
    pub unread_count: i64,
}

/// Collapse a newest-first message list into one entry per counterpart:
/// `(counterpart, latest message, unread count for viewer)`, newest conversation first.
pub fn summarize_conversations(viewer: UserId, messages: Vec<Message>) -> Vec<(UserId, Message, i64)> {
    let mut slots: HashMap<UserId, usize> = HashMap::new();
    let mut summaries: Vec<(UserId, Message, i64)> = Vec::new();

    for message in messages {
        let counterpart = message.counterpart(viewer);
        let unread = i64::from(message.recipient_id == viewer && !message.read);
        match slots.get(&counterpart) {
            Some(&slot) => summaries[slot].2 += unread,
            None => {
                slots.insert(counterpart, summaries.len());
                summaries.push((counterpart, message, unread));
            }
        }
    }

    summaries
}

#[derive(Clone)]
pub struct MessageService {
    db: Arc<dyn DatabaseInterface>,
    profiles: Arc<ProfileCache>,
    feed: ChangeFeed,
}

impl MessageService {
    pub fn new(db: Arc<dyn DatabaseInterface>, profiles: Arc<ProfileCache>, feed: ChangeFeed) -> Self {
        Self { db, profiles, feed }
    }

    pub async fn send(&self, vc: &ViewerContext, recipient: UserId, content: &str) -> AppResult<Message> {
        let sender = vc.require_user()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message cannot be empty".to_string()));
        }
        if sender == recipient {
            return Err(AppError::Validation("cannot message yourself".to_string()));
        }
        if self.profiles.get(recipient).await?.is_none() {
            return Err(AppError::NotFound(format!("Profile {} not found", recipient)));
        }

        let message = Message {
            id: MessageId::new(),
            sender_id: sender,
            recipient_id: recipient,
            content: content.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        self.db.create_message(&message).await?;
        info!("Message {} from {} to {}", message.id, sender, recipient);

        self.feed.publish(
            ChangeEvent::new(Table::Messages, ChangeKind::Insert, message.id)
                .with_key("sender_id", sender)
                .with_key("recipient_id", recipient),
        );
        Ok(message)
    }

    /// Both directions, oldest first. Opening the conversation marks the returned
    /// messages `other` sent the viewer as read; later arrivals stay unread.
    pub async fn conversation(&self, vc: &ViewerContext, other: UserId) -> AppResult<Vec<Message>> {
        let viewer = vc.require_user()?;
        let mut messages = self.db.list_conversation(viewer, other).await?;

        let unread: Vec<MessageId> = messages
            .iter()
            .filter(|m| m.recipient_id == viewer && !m.read)
            .map(|m| m.id)
            .collect();
        let marked = self.db.mark_messages_read(viewer, &unread).await?;
        if !marked.is_empty() {
            debug!("Marked {} messages from {} read for {}", marked.len(), other, viewer);
            for message in messages.iter_mut().filter(|m| unread.contains(&m.id)) {
                message.read = true;
            }
            self.publish_read(&marked);
        }
        Ok(messages)
    }

    pub async fn conversations(&self, vc: &ViewerContext) -> AppResult<Vec<ConversationSummary>> {
        let viewer = vc.require_user()?;
        let messages = self.db.list_messages_involving(viewer).await?;
        let profiles = &self.profiles;

        let summaries = try_join_all(summarize_conversations(viewer, messages).into_iter().map(
            |(counterpart, last_message, unread_count)| async move {
                let profile = profiles.get(counterpart).await?;
                Ok::<_, AppError>(profile.map(|counterpart| ConversationSummary {
                    counterpart,
                    last_message,
                    unread_count,
                }))
            },
        ))
        .await?;
        Ok(summaries.into_iter().flatten().collect())
    }

    /// Live inbox: the conversation list is refetched whenever a message the viewer sent
    /// or received changes, and on every `poll_interval` tick as a fallback.
    pub fn watch_conversations(
        &self,
        vc: ViewerContext,
        poll_interval: Duration,
    ) -> AppResult<(watch::Receiver<Option<Vec<ConversationSummary>>>, JoinHandle<()>)> {
        let viewer = vc.require_user()?;
        let subscription = self.feed.subscribe(
            ChangeFilter::table(Table::Messages).any_key(&["sender_id", "recipient_id"], viewer),
        );
        let service = self.clone();
        let vc = Arc::new(vc);

        debug!("Watching conversations for {}", viewer);
        Ok(spawn_refresher(subscription, Some(poll_interval), move || {
            let service = service.clone();
            let vc = vc.clone();
            async move { service.conversations(&vc).await }
        }))
    }

    /// Marks the listed messages read; ids not addressed to the viewer are ignored.
    pub async fn mark_read(&self, vc: &ViewerContext, ids: &[MessageId]) -> AppResult<u64> {
        let viewer = vc.require_user()?;
        let marked = self.db.mark_messages_read(viewer, ids).await?;
        self.publish_read(&marked);
        Ok(marked.len() as u64)
    }

    fn publish_read(&self, marked: &[Message]) {
        for message in marked {
            self.feed.publish(
                ChangeEvent::new(Table::Messages, ChangeKind::Update, message.id)
                    .with_key("sender_id", message.sender_id)
                    .with_key("recipient_id", message.recipient_id),
            );
        }
    }
}
