use crate::error::Result;
use crate::models::Tag;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub const TAG_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct CacheEntry {
    tags: Vec<Tag>,
    expires_at: Instant,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Short-lived tag listings keyed by Sonarr instance ID.
///
/// Each instance has its own slot lock, held across a refresh, so two callers never
/// refresh the same instance at once while other instances stay available.
#[derive(Debug)]
pub struct TagCache {
    ttl: Duration,
    slots: Mutex<HashMap<i32, Slot>>,
}

impl Default for TagCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCache {
    pub fn new() -> Self {
        Self::with_ttl(TAG_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, instance_id: i32) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(instance_id).or_default())
    }

    /// Returns cached tags for `instance_id` while they are fresh, otherwise calls
    /// `fetch` and stores the result. A failed refresh falls back to whatever stale
    /// entry is still held. Without an instance ID (or with ID 0) nothing is cached.
    pub async fn get_or_refresh<F, Fut>(&self, instance_id: Option<i32>, fetch: F) -> Result<Vec<Tag>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Tag>>>,
    {
        let Some(instance_id) = cache_key(instance_id) else {
            return fetch().await;
        };

        let slot = self.slot(instance_id).await;
        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if Instant::now() < cached.expires_at {
                debug!("Using cached tags for Sonarr instance {}", instance_id);
                return Ok(cached.tags.clone());
            }
        }

        match fetch().await {
            Ok(tags) => {
                *entry = Some(CacheEntry {
                    tags: tags.clone(),
                    expires_at: Instant::now() + self.ttl,
                });
                Ok(tags)
            }
            Err(e) => {
                error!("Failed to refresh tags cache for Sonarr instance {}: {}", instance_id, e);
                match entry.as_ref() {
                    Some(stale) => {
                        warn!("Using stale tags cache for Sonarr instance {}", instance_id);
                        Ok(stale.tags.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    pub async fn invalidate(&self, instance_id: Option<i32>) {
        let Some(instance_id) = cache_key(instance_id) else {
            return;
        };
        let slot = self.slot(instance_id).await;
        *slot.lock().await = None;
        debug!("Invalidated tags cache for Sonarr instance {}", instance_id);
    }
}

fn cache_key(instance_id: Option<i32>) -> Option<i32> {
    instance_id.filter(|id| *id != 0)
}
