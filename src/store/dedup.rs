use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;

/// Claim table for webhook event ids.
/// - First claim of a key wins.
/// - Later claims inside the retention window lose.
/// - Expired keys are pruned on the way in.
#[derive(Debug, Clone)]
pub struct EventDedup {
    retention: ChronoDuration,
    claimed: HashMap<String, DateTime<Utc>>,
}

impl EventDedup {
    /// `retention_secs` of 0 still rejects exact replays at the same instant.
    pub fn new(retention_secs: u64) -> Self {
        // Capped at ten years.
        let secs = retention_secs.min(315_360_000) as i64;
        Self {
            retention: ChronoDuration::seconds(secs),
            claimed: HashMap::new(),
        }
    }

    pub fn claim(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let retention = self.retention;
        self.claimed
            .retain(|_, at| now.signed_duration_since(*at) <= retention);
        if self.claimed.contains_key(key) {
            return false;
        }
        self.claimed.insert(key.to_string(), now);
        true
    }

    pub fn release(&mut self, key: &str) {
        self.claimed.remove(key);
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_claim_wins() {
        let mut d = EventDedup::new(60);
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert!(d.claim("sms:SM1", t0));
        assert!(!d.claim("sms:SM1", t0 + ChronoDuration::seconds(30)));
        assert!(d.claim("sms:SM2", t0));
    }

    #[test]
    fn expired_claims_are_pruned() {
        let mut d = EventDedup::new(60);
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert!(d.claim("sms:SM1", t0));
        let later = t0 + ChronoDuration::seconds(61);
        assert!(d.claim("sms:SM1", later));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn released_key_can_be_claimed_again() {
        let mut d = EventDedup::new(60);
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert!(d.claim("crisis-call:WT1", t0));
        d.release("crisis-call:WT1");
        assert!(d.claim("crisis-call:WT1", t0 + ChronoDuration::seconds(5)));
        assert!(!d.claim("crisis-call:WT1", t0 + ChronoDuration::seconds(6)));
    }
}
