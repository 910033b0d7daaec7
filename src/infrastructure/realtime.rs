// Change feed - table-keyed notifications that tell dependents to refetch
//
// Consumers never patch their state from an event; they rerun their query. A receiver
// that falls behind therefore only needs one `Resync` to catch up.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Ideas,
    Votes,
    Comments,
    CommentVotes,
    Messages,
    Friends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Notifications were dropped; refetch everything
    Resync,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: Option<Uuid>,
    /// Column values a subscriber can filter on, e.g. `("idea_id", ..)`
    pub keys: Vec<(&'static str, Uuid)>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, row_id: impl Into<Uuid>) -> Self {
        Self {
            table,
            kind,
            row_id: Some(row_id.into()),
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, column: &'static str, value: impl Into<Uuid>) -> Self {
        self.keys.push((column, value.into()));
        self
    }

    fn resync() -> Self {
        Self {
            table: Table::Profiles,
            kind: ChangeKind::Resync,
            row_id: None,
            keys: Vec::new(),
        }
    }

    pub fn key(&self, column: &str) -> Option<Uuid> {
        self.keys
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
    }
}

/// Which events a subscriber cares about. Empty `tables` means every table; every
/// `(column, value)` pair in `keys` must match, and each `any_keys` group needs one
/// of its columns to carry the value.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    tables: Vec<Table>,
    keys: Vec<(&'static str, Uuid)>,
    any_keys: Vec<(&'static [&'static str], Uuid)>,
}

impl ChangeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn table(table: Table) -> Self {
        Self {
            tables: vec![table],
            ..Self::default()
        }
    }

    pub fn or_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn key(mut self, column: &'static str, value: impl Into<Uuid>) -> Self {
        self.keys.push((column, value.into()));
        self
    }

    /// Match when any of `columns` holds `value`, e.g. either side of a message.
    pub fn any_key(mut self, columns: &'static [&'static str], value: impl Into<Uuid>) -> Self {
        self.any_keys.push((columns, value.into()));
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.kind == ChangeKind::Resync {
            return true;
        }
        if !self.tables.is_empty() && !self.tables.contains(&event.table) {
            return false;
        }
        self.keys
            .iter()
            .all(|(column, value)| event.key(column) == Some(*value))
            && self.any_keys.iter().all(|(columns, value)| {
                columns
                    .iter()
                    .any(|column| event.key(column) == Some(*value))
            })
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        debug!("change {:?} {:?} {:?}", event.table, event.kind, event.row_id);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Next matching event, `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Change subscriber lagged by {} events, resyncing", skipped);
                    return Some(ChangeEvent::resync());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Keep a snapshot fresh: fetch once, then again on every matching change and on every
/// `poll_interval` tick. The task exits when every receiver is dropped or the feed closes.
/// A failed fetch is logged and the previous snapshot stays published.
pub fn spawn_refresher<T, F, Fut>(
    mut subscription: Subscription,
    poll_interval: Option<Duration>,
    fetch: F,
) -> (watch::Receiver<Option<T>>, JoinHandle<()>)
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    let (sender, receiver) = watch::channel(None);

    let handle = tokio::spawn(async move {
        let mut ticker = poll_interval.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        // The first interval tick completes immediately and doubles as the initial fetch
        let mut fetch_now = ticker.is_none();

        loop {
            if fetch_now {
                match fetch().await {
                    Ok(snapshot) => {
                        if sender.send(Some(snapshot)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Refresh failed, keeping previous snapshot: {}", e),
                }
            }

            fetch_now = true;

            tokio::select! {
                _ = sender.closed() => break,
                event = subscription.next() => {
                    if event.is_none() {
                        break;
                    }
                }
                _ = async {
                    match ticker.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {}
            }
        }

        debug!("Refresher stopped");
    });

    (receiver, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_filter_matches_table_and_keys() {
        let idea = Uuid::new_v4();
        let filter = ChangeFilter::table(Table::Comments).key("idea_id", idea);

        let hit = ChangeEvent::new(Table::Comments, ChangeKind::Insert, Uuid::new_v4())
            .with_key("idea_id", idea);
        let other_idea = ChangeEvent::new(Table::Comments, ChangeKind::Insert, Uuid::new_v4())
            .with_key("idea_id", Uuid::new_v4());
        let other_table = ChangeEvent::new(Table::Votes, ChangeKind::Insert, Uuid::new_v4())
            .with_key("idea_id", idea);

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&other_idea));
        assert!(!filter.matches(&other_table));
        assert!(filter.matches(&ChangeEvent::resync()));
    }

    #[test]
    fn test_any_key_matches_either_column() {
        let me = Uuid::new_v4();
        let filter = ChangeFilter::table(Table::Messages).any_key(&["sender_id", "recipient_id"], me);

        let sent = ChangeEvent::new(Table::Messages, ChangeKind::Insert, Uuid::new_v4())
            .with_key("sender_id", me)
            .with_key("recipient_id", Uuid::new_v4());
        let received = ChangeEvent::new(Table::Messages, ChangeKind::Update, Uuid::new_v4())
            .with_key("sender_id", Uuid::new_v4())
            .with_key("recipient_id", me);
        let others = ChangeEvent::new(Table::Messages, ChangeKind::Insert, Uuid::new_v4())
            .with_key("sender_id", Uuid::new_v4())
            .with_key("recipient_id", Uuid::new_v4());

        assert!(filter.matches(&sent));
        assert!(filter.matches(&received));
        assert!(!filter.matches(&others));
    }

    #[tokio::test]
    async fn test_subscription_skips_unmatched_events() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(ChangeFilter::table(Table::Ideas));

        feed.publish(ChangeEvent::new(Table::Messages, ChangeKind::Insert, Uuid::new_v4()));
        let id = Uuid::new_v4();
        feed.publish(ChangeEvent::new(Table::Ideas, ChangeKind::Update, id));

        let event = sub.next().await.unwrap();
        assert_eq!(event.row_id, Some(id));
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(ChangeFilter::all());
        for _ in 0..5 {
            feed.publish(ChangeEvent::new(Table::Ideas, ChangeKind::Insert, Uuid::new_v4()));
        }
        assert_eq!(sub.next().await.unwrap().kind, ChangeKind::Resync);
    }

    #[tokio::test]
    async fn test_refresher_refetches_on_change() {
        let feed = ChangeFeed::new(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let (mut rx, handle) = spawn_refresher(
            feed.subscribe(ChangeFilter::table(Table::Ideas)),
            None,
            move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
            },
        );

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(1));

        feed.publish(ChangeEvent::new(Table::Ideas, ChangeKind::Insert, Uuid::new_v4()));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(2));

        drop(rx);
        feed.publish(ChangeEvent::new(Table::Ideas, ChangeKind::Insert, Uuid::new_v4()));
        handle.await.unwrap();
    }
}
