// Vote Aggregator - one toggle implementation shared by idea votes and comment votes
//
// Invariant: a subject's `votes` counter equals (#up - #down) over its stored vote rows.
// Lookup, row mutation and counter delta commit together or not at all.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::{CommentId, IdeaId, UserId, VoteId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{DatabaseInterface, DatabaseTransaction, VoteTable};
use crate::infrastructure::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{UserRole, VoteRecord, VoteType};

/// Something with a denormalized vote counter and a vote relation keyed by its id.
pub trait Votable: Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Into<Uuid> + From<Uuid> + Send + Sync;

    const NAME: &'static str;
    const VOTE_TABLE: VoteTable;
    const VOTE_FEED: Table;
    const SUBJECT_FEED: Table;
}

pub struct IdeaSubject;

impl Votable for IdeaSubject {
    type Id = IdeaId;

    const NAME: &'static str = "idea";
    const VOTE_TABLE: VoteTable = VoteTable::IdeaVotes;
    const VOTE_FEED: Table = Table::Votes;
    const SUBJECT_FEED: Table = Table::Ideas;
}

pub struct CommentSubject;

impl Votable for CommentSubject {
    type Id = CommentId;

    const NAME: &'static str = "comment";
    const VOTE_TABLE: VoteTable = VoteTable::CommentVotes;
    const VOTE_FEED: Table = Table::CommentVotes;
    const SUBJECT_FEED: Table = Table::Comments;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert,
    Remove,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub change: VoteChange,
    /// Amount added to the subject's counter
    pub delta: i64,
    /// The viewer's vote once the plan is applied
    pub resulting: Option<VoteType>,
}

/// Toggle rule: no vote inserts, the same vote removes, the opposite vote switches.
pub fn plan_vote(existing: Option<VoteType>, requested: VoteType) -> VotePlan {
    match existing {
        None => VotePlan {
            change: VoteChange::Insert,
            delta: requested.weight(),
            resulting: Some(requested),
        },
        Some(previous) if previous == requested => VotePlan {
            change: VoteChange::Remove,
            delta: -previous.weight(),
            resulting: None,
        },
        Some(previous) => VotePlan {
            change: VoteChange::Switch,
            delta: requested.weight() - previous.weight(),
            resulting: Some(requested),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome<I> {
    pub subject_id: I,
    pub votes: i64,
    pub user_vote: Option<VoteType>,
}

pub struct VoteAggregator<S: Votable> {
    db: Arc<dyn DatabaseInterface>,
    feed: ChangeFeed,
    _subject: PhantomData<fn() -> S>,
}

impl<S: Votable> Clone for VoteAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            feed: self.feed.clone(),
            _subject: PhantomData,
        }
    }
}

impl<S: Votable> VoteAggregator<S> {
    pub fn new(db: Arc<dyn DatabaseInterface>, feed: ChangeFeed) -> Self {
        Self {
            db,
            feed,
            _subject: PhantomData,
        }
    }

    pub async fn cast_vote(
        &self,
        vc: &ViewerContext,
        subject_id: S::Id,
        vote_type: VoteType,
    ) -> AppResult<VoteOutcome<S::Id>> {
        let user_id = vc.require_user()?;
        let subject: Uuid = subject_id.into();

        let mut tx = self.db.begin_transaction().await?;
        let (plan, votes, vote_id) =
            match self.apply_vote(&mut tx, subject, user_id, vote_type).await {
                Ok(applied) => applied,
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!("Vote rollback failed: {}", rollback_err);
                    }
                    return Err(e);
                }
            };
        tx.commit().await?;

        info!(
            "{} {} vote by {}: {:?} ({:+}) -> {}",
            S::NAME,
            subject_id,
            user_id,
            plan.change,
            plan.delta,
            votes
        );

        let kind = match plan.change {
            VoteChange::Insert => ChangeKind::Insert,
            VoteChange::Remove => ChangeKind::Delete,
            VoteChange::Switch => ChangeKind::Update,
        };
        self.feed.publish(
            ChangeEvent::new(S::VOTE_FEED, kind, vote_id)
                .with_key(S::VOTE_TABLE.subject_column(), subject)
                .with_key("user_id", user_id),
        );
        self.feed
            .publish(ChangeEvent::new(S::SUBJECT_FEED, ChangeKind::Update, subject));

        Ok(VoteOutcome {
            subject_id,
            votes,
            user_vote: plan.resulting,
        })
    }

    async fn apply_vote(
        &self,
        tx: &mut DatabaseTransaction,
        subject: Uuid,
        user_id: UserId,
        requested: VoteType,
    ) -> AppResult<(VotePlan, i64, VoteId)> {
        if self.db.vote_counter_tx(tx, S::VOTE_TABLE, subject).await?.is_none() {
            return Err(AppError::NotFound(format!("{} {} not found", S::NAME, subject)));
        }

        let existing = self
            .db
            .find_vote_tx(tx, S::VOTE_TABLE, subject, user_id)
            .await?;
        let plan = plan_vote(existing.as_ref().map(|v| v.vote_type), requested);

        let vote_id = match (plan.change, existing) {
            (VoteChange::Insert, _) => {
                let record = VoteRecord {
                    id: VoteId::new(),
                    user_id,
                    subject_id: subject,
                    vote_type: requested,
                    created_at: Utc::now(),
                };
                self.db.insert_vote_tx(tx, S::VOTE_TABLE, &record).await?;
                record.id
            }
            (VoteChange::Remove, Some(existing)) => {
                self.db.delete_vote_tx(tx, S::VOTE_TABLE, existing.id).await?;
                existing.id
            }
            (VoteChange::Switch, Some(existing)) => {
                self.db
                    .update_vote_type_tx(tx, S::VOTE_TABLE, existing.id, requested)
                    .await?;
                existing.id
            }
            (change, None) => {
                return Err(AppError::Internal(format!(
                    "{:?} planned without an existing vote",
                    change
                )))
            }
        };

        let votes = self
            .db
            .adjust_vote_counter_tx(tx, S::VOTE_TABLE, subject, plan.delta)
            .await?;
        Ok((plan, votes, vote_id))
    }

    /// Repair path: re-derive the counter from the vote rows and store it. Triage staff only.
    pub async fn recount(&self, vc: &ViewerContext, subject_id: S::Id) -> AppResult<i64> {
        vc.require_role(UserRole::can_triage, "recount votes")?;
        let subject: Uuid = subject_id.into();
        let mut tx = self.db.begin_transaction().await?;

        let stored = match self.db.vote_counter_tx(&mut tx, S::VOTE_TABLE, subject).await? {
            Some(stored) => stored,
            None => {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!("{} {} not found", S::NAME, subject_id)));
            }
        };
        let tally = self.db.tally_votes_tx(&mut tx, S::VOTE_TABLE, subject).await?;
        let net = tally.net();
        if stored != net {
            warn!(
                "{} {} counter drifted: stored {}, votes say {}",
                S::NAME,
                subject_id,
                stored,
                net
            );
            self.db
                .set_vote_counter_tx(&mut tx, S::VOTE_TABLE, subject, net)
                .await?;
        }
        tx.commit().await?;

        if stored != net {
            self.feed
                .publish(ChangeEvent::new(S::SUBJECT_FEED, ChangeKind::Update, subject));
        }
        Ok(net)
    }

    /// The user's current votes, keyed by subject.
    pub async fn user_votes(&self, user_id: UserId) -> AppResult<HashMap<S::Id, VoteType>> {
        let votes = self.db.list_user_votes(S::VOTE_TABLE, user_id).await?;
        Ok(votes
            .into_iter()
            .map(|(subject, vote_type)| (S::Id::from(subject), vote_type))
            .collect())
    }

    /// Viewer's votes, or nothing for an anonymous viewer.
    pub async fn viewer_votes(&self, vc: &ViewerContext) -> AppResult<HashMap<S::Id, VoteType>> {
        match vc.user_id {
            Some(user_id) => self.user_votes(user_id).await,
            None => Ok(HashMap::new()),
        }
    }

    pub async fn votes_on(&self, subject_id: S::Id) -> AppResult<Vec<VoteRecord>> {
        self.db.list_votes(S::VOTE_TABLE, subject_id.into()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_vote_inserts() {
        let plan = plan_vote(None, VoteType::Up);
        assert_eq!(plan.change, VoteChange::Insert);
        assert_eq!(plan.delta, 1);
        assert_eq!(plan.resulting, Some(VoteType::Up));

        assert_eq!(plan_vote(None, VoteType::Down).delta, -1);
    }

    #[test]
    fn test_same_vote_toggles_off() {
        let plan = plan_vote(Some(VoteType::Down), VoteType::Down);
        assert_eq!(plan.change, VoteChange::Remove);
        assert_eq!(plan.delta, 1);
        assert_eq!(plan.resulting, None);
    }

    #[test]
    fn test_opposite_vote_swings_by_two() {
        let plan = plan_vote(Some(VoteType::Up), VoteType::Down);
        assert_eq!(plan.change, VoteChange::Switch);
        assert_eq!(plan.delta, -2);
        assert_eq!(plan.resulting, Some(VoteType::Down));
    }

    #[test]
    fn test_counter_tracks_net_votes_over_any_sequence() {
        let sequence = [
            VoteType::Up,
            VoteType::Up,
            VoteType::Down,
            VoteType::Up,
            VoteType::Down,
            VoteType::Down,
        ];
        let mut counter = 0;
        let mut current = None;
        for requested in sequence {
            let plan = plan_vote(current, requested);
            counter += plan.delta;
            current = plan.resulting;
            assert_eq!(counter, current.map(VoteType::weight).unwrap_or(0));
        }
    }
}
