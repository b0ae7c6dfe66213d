//! Withdrawal guards: reentrancy lock and the construction-time rate gate

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lock held for the duration of a withdrawal
///
/// Entering while locked fails with `Reentrancy`. `entries` counts every
/// successful entry.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    locked: bool,
    entries: u64,
}

impl ReentrancyGuard {
    /// Unlocked guard resuming a stored entry count
    pub(crate) fn with_entries(entries: u64) -> Self {
        Self {
            locked: false,
            entries,
        }
    }

    pub(crate) fn set_entries(&mut self, entries: u64) {
        self.entries = entries;
    }

    /// Take the lock; returns the entry count
    pub(crate) fn enter(&mut self) -> Result<u64> {
        if self.locked {
            tracing::warn!("Reentrant withdrawal rejected");
            return Err(Error::Reentrancy);
        }
        self.locked = true;
        self.entries += 1;
        Ok(self.entries)
    }

    /// Release the lock
    pub(crate) fn exit(&mut self) {
        self.locked = false;
    }

    /// Whether a withdrawal is in flight
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Successful entries so far
    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// Gate fixed at construction and never advanced
///
/// With the default zero window the gate is open from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimit {
    opens_at: DateTime<Utc>,
}

impl RateLimit {
    /// Gate opening `window_secs` after `created_at`
    pub fn new(created_at: DateTime<Utc>, window_secs: u64) -> Self {
        let secs = i64::try_from(window_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        let window = Duration::seconds(secs);
        let opens_at = created_at
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { opens_at }
    }

    /// When the gate opens
    pub fn opens_at(&self) -> DateTime<Utc> {
        self.opens_at
    }

    /// Fail with `RateLimited` before the gate opens
    pub fn check(&self, now: DateTime<Utc>) -> Result<()> {
        if now >= self.opens_at {
            Ok(())
        } else {
            Err(Error::RateLimited(self.opens_at))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_nested_entry() {
        let mut guard = ReentrancyGuard::default();
        assert_eq!(guard.enter().unwrap(), 1);
        assert!(guard.is_locked());
        assert!(matches!(guard.enter(), Err(Error::Reentrancy)));

        guard.exit();
        assert_eq!(guard.enter().unwrap(), 2);
        guard.exit();
        assert_eq!(guard.entries(), 2);
    }

    #[test]
    fn test_rate_limit_zero_window_is_open() {
        let now = Utc::now();
        let limit = RateLimit::new(now, 0);
        assert!(limit.check(now).is_ok());
    }

    #[test]
    fn test_rate_limit_gate_never_advances() {
        let created = Utc::now();
        let limit = RateLimit::new(created, 60);

        assert!(matches!(limit.check(created), Err(Error::RateLimited(_))));

        let later = created + Duration::seconds(61);
        assert!(limit.check(later).is_ok());
        assert!(limit.check(later).is_ok());
        assert_eq!(limit.opens_at(), created + Duration::seconds(60));
    }
}
