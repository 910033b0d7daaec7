use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::UserId;
use crate::error::AppResult;
use crate::infrastructure::database::DatabaseInterface;
use crate::models::Profile;

pub struct Cache<K, V> {
    inner: LruCache<K, V>,
}

impl<K: std::hash::Hash + Eq, V> Cache<K, V> {
    /// A zero capacity is bumped to one entry.
    pub fn new(capacity: usize) -> Self {
        Cache {
            inner: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Read-through profile cache used to resolve author and reviewer names.
///
/// Every invalidation bumps a generation counter. A miss remembers the generation it
/// started under and only stores its database read if no invalidation happened since,
/// so a read racing a write can never pin the old row.
pub struct ProfileCache {
    db: Arc<dyn DatabaseInterface>,
    entries: Mutex<Entries>,
}

struct Entries {
    cache: Cache<UserId, Profile>,
    generation: u64,
}

impl ProfileCache {
    pub fn new(db: Arc<dyn DatabaseInterface>, capacity: usize) -> Self {
        Self {
            db,
            entries: Mutex::new(Entries {
                cache: Cache::new(capacity),
                generation: 0,
            }),
        }
    }

    pub async fn get(&self, id: UserId) -> AppResult<Option<Profile>> {
        let seen = {
            let mut entries = self.entries.lock().await;
            if let Some(profile) = entries.cache.get(&id) {
                return Ok(Some(profile.clone()));
            }
            entries.generation
        };

        debug!("Profile cache miss for {}", id);
        let profile = self.db.get_profile(id).await?;
        if let Some(profile) = &profile {
            self.fill(id, seen, profile).await;
        }
        Ok(profile)
    }

    async fn fill(&self, id: UserId, seen: u64, profile: &Profile) {
        let mut entries = self.entries.lock().await;
        if entries.generation == seen {
            entries.cache.insert(id, profile.clone());
        } else {
            debug!("Dropping stale profile read for {}", id);
        }
    }

    #[cfg(test)]
    async fn generation(&self) -> u64 {
        self.entries.lock().await.generation
    }

    /// Display name for `id`; `None` when the profile no longer exists.
    pub async fn display_name(&self, id: UserId) -> AppResult<Option<String>> {
        Ok(self.get(id).await?.map(|profile| profile.display_name()))
    }

    pub async fn invalidate(&self, id: UserId) {
        let mut entries = self.entries.lock().await;
        entries.cache.remove(&id);
        entries.generation = entries.generation.wrapping_add(1);
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.cache.clear();
        entries.generation = entries.generation.wrapping_add(1);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.cache.len()
    }
}
