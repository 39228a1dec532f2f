//! Retry backoff policy.
//!
//! Delays between automatic retries follow a fixed exponential sequence
//! indexed by the number of failed attempts so far, saturating at the last
//! entry once attempts exceed the sequence length.

use chrono::{DateTime, Duration, Utc};

pub const RETRY_DELAYS_MS: [i64; 4] = [1_000, 2_000, 4_000, 8_000];

/// Delay to observe before the next attempt, given how many attempts have
/// already failed. The first retry (one failure so far) waits 1s.
pub fn retry_delay(retry_count: u32) -> Duration {
    let index = (retry_count.saturating_sub(1) as usize).min(RETRY_DELAYS_MS.len() - 1);
    Duration::milliseconds(RETRY_DELAYS_MS[index])
}

/// Whether a record is due for another automatic attempt. Records that have
/// never been attempted are always due.
pub fn is_due(retry_count: u32, last_attempt_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if retry_count == 0 {
        return true;
    }
    match last_attempt_at {
        Some(last) => last + retry_delay(retry_count) <= now,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_follow_exponential_sequence() {
        assert_eq!(retry_delay(1), Duration::milliseconds(1_000));
        assert_eq!(retry_delay(2), Duration::milliseconds(2_000));
        assert_eq!(retry_delay(3), Duration::milliseconds(4_000));
        assert_eq!(retry_delay(4), Duration::milliseconds(8_000));
    }

    #[test]
    fn delay_saturates_beyond_sequence() {
        assert_eq!(retry_delay(5), Duration::milliseconds(8_000));
        assert_eq!(retry_delay(100), Duration::milliseconds(8_000));
    }

    #[test]
    fn zero_attempts_always_due() {
        let now = Utc::now();
        assert!(is_due(0, None, now));
        assert!(is_due(0, Some(now), now));
    }

    #[test]
    fn due_only_after_delay_elapses() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(500);
        assert!(!is_due(1, Some(last), now));

        let last = now - Duration::milliseconds(1_500);
        assert!(is_due(1, Some(last), now));
        assert!(!is_due(2, Some(last), now));
    }
}
