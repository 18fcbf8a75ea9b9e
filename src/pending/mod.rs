use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::debug;
use uuid::Uuid;

const REQUEST_ID_LEN: usize = 8;

/// Short token tying a stored link to the button press that claims it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(REQUEST_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct PendingRequest {
    link: String,
    created_at: Instant,
}

/// Links waiting for a format choice.
///
/// Entries are bounded in number, expire after `ttl` and can be claimed
/// exactly once. A claim removes the entry under the same lock that finds
/// it, so two concurrent presses of the same button cannot both win.
pub struct PendingStore {
    entries: Mutex<HashMap<RequestId, PendingRequest>>,
    capacity: usize,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, link: impl Into<String>) -> RequestId {
        self.insert_at(link.into(), Instant::now())
    }

    fn insert_at(&self, link: String, now: Instant) -> RequestId {
        let mut entries = self.lock();

        if entries.len() >= self.capacity {
            entries.retain(|_, pending| now.duration_since(pending.created_at) < self.ttl);
        }
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, pending)| pending.created_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!("Pending store full, evicting {}", id);
                    entries.remove(&id);
                }
                None => break,
            }
        }

        let mut id = RequestId::generate();
        while entries.contains_key(&id) {
            id = RequestId::generate();
        }

        entries.insert(
            id.clone(),
            PendingRequest {
                link,
                created_at: now,
            },
        );
        id
    }

    /// Takes the link out of the store. Returns `None` when the id is
    /// unknown, already claimed or expired.
    pub fn claim(&self, id: &RequestId) -> Option<String> {
        self.claim_at(id, Instant::now())
    }

    fn claim_at(&self, id: &RequestId, now: Instant) -> Option<String> {
        let pending = self.lock().remove(id)?;
        if now.duration_since(pending.created_at) >= self.ttl {
            debug!("Pending request {} expired before it was claimed", id);
            return None;
        }
        Some(pending.link)
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, pending| now.duration_since(pending.created_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, sync::Arc};

    const LINK: &str = "https://youtu.be/dQw4w9WgXcQ";

    #[test]
    fn test_request_id_shape() {
        let ids: HashSet<String> = (0..100)
            .map(|_| RequestId::generate().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
        for id in ids {
            assert_eq!(id.len(), REQUEST_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_claim_is_single_use() {
        let store = PendingStore::new(16, Duration::from_secs(60));
        let id = store.insert(LINK);
        assert_eq!(store.len(), 1);

        assert_eq!(store.claim(&id).as_deref(), Some(LINK));
        assert_eq!(store.len(), 0);
        assert_eq!(store.claim(&id), None);
    }

    #[test]
    fn test_unknown_id_is_not_claimable() {
        let store = PendingStore::new(16, Duration::from_secs(60));
        store.insert(LINK);
        assert_eq!(store.claim(&RequestId::from("deadbeef")), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_not_claimable() {
        let store = PendingStore::new(16, Duration::from_secs(60));
        let start = Instant::now();
        let id = store.insert_at(LINK.to_string(), start);

        assert_eq!(store.claim_at(&id, start + Duration::from_secs(60)), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let store = PendingStore::new(16, Duration::from_secs(60));
        let start = Instant::now();
        store.insert_at("old".to_string(), start);
        let fresh = store.insert_at("fresh".to_string(), start + Duration::from_secs(30));

        assert_eq!(store.purge_expired_at(start + Duration::from_secs(61)), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store
                .claim_at(&fresh, start + Duration::from_secs(61))
                .as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = PendingStore::new(2, Duration::from_secs(60));
        let start = Instant::now();
        let first = store.insert_at("first".to_string(), start);
        let second = store.insert_at("second".to_string(), start + Duration::from_secs(1));
        let third = store.insert_at("third".to_string(), start + Duration::from_secs(2));

        assert_eq!(store.len(), 2);
        let now = start + Duration::from_secs(3);
        assert_eq!(store.claim_at(&first, now), None);
        assert_eq!(store.claim_at(&second, now).as_deref(), Some("second"));
        assert_eq!(store.claim_at(&third, now).as_deref(), Some("third"));
    }

    #[test]
    fn test_capacity_prefers_dropping_expired() {
        let store = PendingStore::new(2, Duration::from_secs(10));
        let start = Instant::now();
        store.insert_at("stale".to_string(), start);
        let live = store.insert_at("live".to_string(), start + Duration::from_secs(8));
        let newest = store.insert_at("newest".to_string(), start + Duration::from_secs(12));

        let now = start + Duration::from_secs(13);
        assert_eq!(store.claim_at(&live, now).as_deref(), Some("live"));
        assert_eq!(store.claim_at(&newest, now).as_deref(), Some("newest"));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(PendingStore::new(16, Duration::from_secs(60)));
        let id = store.insert(LINK);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || store.claim(&id).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
