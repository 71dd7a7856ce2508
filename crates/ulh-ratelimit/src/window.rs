//! In-process fixed-window counters, used both as the local fallback when
//! the remote store is unreachable and (in tests) as a store in its own
//! right.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

struct Counter {
    window_start_secs: AtomicI64,
    count: AtomicI64,
}

/// A bare fixed-window counter table keyed by an arbitrary string. Windows
/// truncate to `window_seconds`; a key's counter resets the instant a call
/// lands in a new window rather than being swept eagerly, so [`sweep`] only
/// needs to bound memory, not correctness.
pub struct InProcessWindows {
    counters: DashMap<String, Counter>,
}

impl InProcessWindows {
    pub fn new() -> Self {
        Self { counters: DashMap::new() }
    }

    fn now_secs() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
    }

    /// Increment `key`'s counter for the window containing `now`, and report
    /// whether the post-increment count is still `<= limit`.
    pub fn increment_and_check(&self, key: &str, window_seconds: u64, limit: u32) -> bool {
        let now = Self::now_secs();
        let window_start = now - now.rem_euclid(window_seconds as i64);

        let entry = self.counters.entry(key.to_string()).or_insert_with(|| Counter {
            window_start_secs: AtomicI64::new(window_start),
            count: AtomicI64::new(0),
        });

        let stored_start = entry.window_start_secs.load(Ordering::SeqCst);
        if stored_start != window_start {
            // New window: reset under the lock implied by DashMap's shard,
            // racing resets are harmless since both land on the same value.
            entry.window_start_secs.store(window_start, Ordering::SeqCst);
            entry.count.store(0, Ordering::SeqCst);
        }

        let count = entry.count.fetch_add(1, Ordering::SeqCst) + 1;
        count as u32 <= limit
    }

    /// Drop entries whose window ended more than one window ago. Intended to
    /// be called about once a minute.
    pub fn sweep(&self, max_age_seconds: i64) {
        let now = Self::now_secs();
        self.counters
            .retain(|_, c| now - c.window_start_secs.load(Ordering::SeqCst) <= max_age_seconds);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }
}

impl Default for InProcessWindows {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_denies() {
        let windows = InProcessWindows::new();
        for _ in 0..5 {
            assert!(windows.increment_and_check("k", 60, 5));
        }
        assert!(!windows.increment_and_check("k", 60, 5));
    }

    #[test]
    fn distinct_keys_are_independent() {
        let windows = InProcessWindows::new();
        assert!(windows.increment_and_check("a", 60, 1));
        assert!(windows.increment_and_check("b", 60, 1));
        assert!(!windows.increment_and_check("a", 60, 1));
    }

    #[test]
    fn sweep_drops_stale_entries() {
        let windows = InProcessWindows::new();
        windows.increment_and_check("k", 60, 5);
        assert_eq!(windows.len(), 1);
        windows.sweep(-1);
        assert_eq!(windows.len(), 0);
    }
}
