use std::sync::Arc;

use crate::{
    config::Config,
    domains::{
        vote::{CommentSubject, IdeaSubject},
        CommentService, FriendService, IdeaService, MessageService, ProfileService,
        VoteAggregator,
    },
    infrastructure::{
        middleware::HasProfileLookup, ChangeFeed, DatabaseInterface, ProfileCache, SqliteDatabase,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn DatabaseInterface>,
    pub feed: ChangeFeed,
    pub profile_cache: Arc<ProfileCache>,
    pub profiles: ProfileService,
    pub ideas: IdeaService,
    pub idea_votes: VoteAggregator<IdeaSubject>,
    pub comments: CommentService,
    pub friends: FriendService,
    pub messages: MessageService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = SqliteDatabase::connect(&config.database.url).await?;
        Ok(Self::with_database(config, Arc::new(database)))
    }

    /// Wire every service over an already-initialized store.
    pub fn with_database(config: Config, db: Arc<dyn DatabaseInterface>) -> Self {
        let feed = ChangeFeed::new(config.realtime.channel_capacity);
        let profile_cache = Arc::new(ProfileCache::new(db.clone(), config.cache.capacity));

        let idea_votes = VoteAggregator::<IdeaSubject>::new(db.clone(), feed.clone());
        let comment_votes = VoteAggregator::<CommentSubject>::new(db.clone(), feed.clone());

        Self {
            profiles: ProfileService::new(db.clone(), profile_cache.clone(), feed.clone()),
            ideas: IdeaService::new(
                db.clone(),
                profile_cache.clone(),
                idea_votes.clone(),
                feed.clone(),
            ),
            comments: CommentService::new(
                db.clone(),
                profile_cache.clone(),
                comment_votes,
                feed.clone(),
            ),
            friends: FriendService::new(db.clone(), profile_cache.clone(), feed.clone()),
            messages: MessageService::new(db.clone(), profile_cache.clone(), feed.clone()),
            idea_votes,
            profile_cache,
            feed,
            db,
            config,
        }
    }

    /// In-memory store with default settings, for tests and tools.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let database = SqliteDatabase::new_in_memory().await?;
        Ok(Self::with_database(Config::default(), Arc::new(database)))
    }
}

impl HasProfileLookup for AppState {
    fn profile_cache(&self) -> &ProfileCache {
        &self.profile_cache
    }
}
