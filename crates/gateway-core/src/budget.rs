use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use gateway_storage::WatchedKind;

/// `{usage, budget, remaining, updated_at}`, the compact value the
/// budget maintainer writes and the invoke pipeline reads back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetCacheEntry {
    pub usage: f64,
    pub budget: f64,
    pub remaining: f64,
    updated_at_unix: i64,
}

impl BudgetCacheEntry {
    pub fn new(usage: f64, budget: f64, now: OffsetDateTime) -> Self {
        Self {
            usage,
            budget,
            remaining: budget - usage,
            updated_at_unix: now.unix_timestamp(),
        }
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.updated_at_unix).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    fn is_expired(&self, now: OffsetDateTime, ttl_secs: i64) -> bool {
        now.unix_timestamp() - self.updated_at_unix > ttl_secs
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BudgetCacheError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
}

/// 12-byte object id: a one-byte watched-kind tag, an 8-byte big-endian
/// id, and 3 reserved bytes so the key width never needs to change if a
/// third watched kind is added.
fn encode_key(kind: WatchedKind, id: i64) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[0] = match kind {
        WatchedKind::ApiKey => 0,
        WatchedKind::Provider => 1,
    };
    key[1..9].copy_from_slice(&id.to_be_bytes());
    key
}

/// Embedded, single-writer-many-reader key-value cache for per-object
/// budget snapshots. The budget maintainer background loop is the only
/// writer; the invoke pipeline reads it on every successful completion.
pub struct BudgetCache {
    tree: sled::Tree,
    ttl_secs: i64,
}

impl BudgetCache {
    pub fn open(path: &str) -> Result<Self, BudgetCacheError> {
        let db = sled::open(path)?;
        let tree = db.open_tree("budget_cache")?;
        Ok(Self { tree, ttl_secs: 60 })
    }

    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Writes a fresh entry for `(kind, id)`, called only from the
    /// budget maintainer loop.
    pub fn put(&self, kind: WatchedKind, id: i64, entry: &BudgetCacheEntry) -> Result<(), BudgetCacheError> {
        let key = encode_key(kind, id);
        let value = bincode::serialize(entry)?;
        self.tree.insert(key, value)?;
        Ok(())
    }

    /// Returns `None` for a missing or TTL-expired entry, never an error
    /// for that case — a cache miss is silent per the invoke pipeline's
    /// contract.
    pub fn get(&self, kind: WatchedKind, id: i64, now: OffsetDateTime) -> Result<Option<BudgetCacheEntry>, BudgetCacheError> {
        let key = encode_key(kind, id);
        let Some(bytes) = self.tree.get(key)? else {
            return Ok(None);
        };
        let entry: BudgetCacheEntry = bincode::deserialize(&bytes)?;
        if entry.is_expired(now, self.ttl_secs) {
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

/// Picks the `{remaining, spent}` pair to attach to a successful
/// response: whichever of the caller-key/provider entries has the
/// smaller `remaining`, falling back to whichever one exists.
pub fn pick_spend_summary(
    key_entry: Option<&BudgetCacheEntry>,
    provider_entry: Option<&BudgetCacheEntry>,
) -> Option<(f64, f64)> {
    match (key_entry, provider_entry) {
        (Some(a), Some(b)) => {
            let tighter = if a.remaining <= b.remaining { a } else { b };
            Some((tighter.remaining, tighter.usage))
        }
        (Some(a), None) => Some((a.remaining, a.usage)),
        (None, Some(b)) => Some((b.remaining, b.usage)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir() -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("gateway-budget-test-{nanos}")).to_string_lossy().to_string()
    }

    #[test]
    fn roundtrips_through_sled() {
        let path = tempdir();
        let cache = BudgetCache::open(&path).unwrap();
        let now = OffsetDateTime::now_utc();
        let entry = BudgetCacheEntry::new(10.0, 100.0, now);
        cache.put(WatchedKind::ApiKey, 7, &entry).unwrap();
        let fetched = cache.get(WatchedKind::ApiKey, 7, now).unwrap().unwrap();
        assert_eq!(fetched.remaining, 90.0);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn missing_entry_is_none() {
        let path = tempdir();
        let cache = BudgetCache::open(&path).unwrap();
        assert!(cache.get(WatchedKind::Provider, 1, OffsetDateTime::now_utc()).unwrap().is_none());
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn expired_entry_reads_as_none() {
        let path = tempdir();
        let cache = BudgetCache::open(&path).unwrap().with_ttl_secs(5);
        let written_at = OffsetDateTime::now_utc() - time::Duration::seconds(10);
        let entry = BudgetCacheEntry::new(1.0, 2.0, written_at);
        cache.put(WatchedKind::ApiKey, 3, &entry).unwrap();
        assert!(cache.get(WatchedKind::ApiKey, 3, OffsetDateTime::now_utc()).unwrap().is_none());
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn picks_the_tighter_remaining() {
        let now = OffsetDateTime::now_utc();
        let tight = BudgetCacheEntry::new(90.0, 100.0, now);
        let loose = BudgetCacheEntry::new(10.0, 1000.0, now);
        let (remaining, _) = pick_spend_summary(Some(&tight), Some(&loose)).unwrap();
        assert_eq!(remaining, 10.0);
    }
}
