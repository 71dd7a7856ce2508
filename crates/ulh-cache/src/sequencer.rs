//! Session Sequencer (C11, spec §3 "Session sequence", §4.9).

use dashmap::DashMap;
use std::time::{Duration, Instant};

const EVICTION_AGE: Duration = Duration::from_secs(3600);
const SWEEP_THRESHOLD: usize = 10_000;

struct Entry {
    seq: u64,
    last_used: Instant,
}

/// Process-local monotonic counter per `sessionId`. Entries older than one
/// hour are purged during incidental maintenance once the table grows
/// beyond a small threshold — there is no dedicated sweep task, since a
/// session sequence is cheap enough that a lazy sweep is sufficient (spec
/// §3).
pub struct SessionSequencer {
    sessions: DashMap<String, Entry>,
}

impl SessionSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Return the next sequence number for `session_id`, starting at 1.
    pub fn next(&self, session_id: &str) -> u64 {
        let now = Instant::now();
        let seq = {
            let mut entry = self.sessions.entry(session_id.to_string()).or_insert_with(|| Entry {
                seq: 0,
                last_used: now,
            });
            entry.seq += 1;
            entry.last_used = now;
            entry.seq
        };

        if self.sessions.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        seq
    }

    fn sweep(&self, now: Instant) {
        self.sessions.retain(|_, e| now.duration_since(e.last_used) < EVICTION_AGE);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_increments_per_session() {
        let seq = SessionSequencer::new();
        assert_eq!(seq.next("s1"), 1);
        assert_eq!(seq.next("s1"), 2);
        assert_eq!(seq.next("s1"), 3);
    }

    #[test]
    fn distinct_sessions_are_independent() {
        let seq = SessionSequencer::new();
        assert_eq!(seq.next("s1"), 1);
        assert_eq!(seq.next("s2"), 1);
        assert_eq!(seq.next("s1"), 2);
    }
}
