use std::collections::HashSet;

use blake2::{Blake2s256, Digest};

/// One hook's record of an action taken, surfaced to the caller in
/// `usage_records.policy_events` and summarized by `priority`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PolicyEvent {
    pub priority: u8,
    pub sample: Option<String>,
    pub policy_type: &'static str,
}

impl PolicyEvent {
    pub fn new(priority: u8, policy_type: &'static str, sample: Option<&str>) -> Self {
        debug_assert!((1..=3).contains(&priority));
        Self {
            priority: priority.clamp(1, 3),
            sample: sample.map(|s| truncate_sample(s, 50)),
            policy_type,
        }
    }
}

fn truncate_sample(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Running fingerprint over every `(text, hook identity)` pair seen
/// during a request. Repeated identical pairs are fed into the hash
/// only once, so they collapse into one fingerprint.
#[derive(Default)]
pub struct PolicyDigest {
    hasher: Option<Blake2s256>,
    seen: HashSet<(String, String)>,
}

impl PolicyDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, text: &str, hook_identity: &str) {
        let key = (hook_identity.to_string(), text.to_string());
        if !self.seen.insert(key) {
            return;
        }
        let hasher = self.hasher.get_or_insert_with(Blake2s256::new);
        hasher.update(hook_identity.as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        hasher.update(b"\0");
    }

    /// `None` when no event was ever fed, matching the "no policy
    /// activity" usage-record shape.
    pub fn finish(self) -> Option<String> {
        self.hasher.map(|h| hex_encode(&h.finalize()))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_identical_events_collapse_to_one_fingerprint() {
        let mut a = PolicyDigest::new();
        a.feed("hello", "invisible_text");
        a.feed("hello", "invisible_text");

        let mut b = PolicyDigest::new();
        b.feed("hello", "invisible_text");

        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn distinct_events_change_the_fingerprint() {
        let mut a = PolicyDigest::new();
        a.feed("hello", "invisible_text");

        let mut b = PolicyDigest::new();
        b.feed("goodbye", "invisible_text");

        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn empty_digest_is_none() {
        assert!(PolicyDigest::new().finish().is_none());
    }

    #[test]
    fn sample_is_truncated_to_fifty_chars() {
        let long = "x".repeat(100);
        let event = PolicyEvent::new(2, "languages", Some(&long));
        assert_eq!(event.sample.unwrap().chars().count(), 50);
    }
}
