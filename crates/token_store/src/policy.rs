use time::{Duration, OffsetDateTime};

use crate::record::CredentialRecord;

/// Age thresholds and scheduling limits for credential upkeep.
///
/// The hard ceiling is independent of any server-side expiry: a record past
/// `max_age` is treated as expired even if the server would still accept
/// it. The soft threshold triggers refresh ahead of expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Hard ceiling on record age.
    pub max_age: Duration,
    /// Soft refresh-ahead threshold, below the hard ceiling.
    pub refresh_after: Duration,
    /// Minimum gap between upkeep checks for one service.
    pub check_cooldown: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(30),
            refresh_after: Duration::days(7),
            check_cooldown: Duration::seconds(120),
        }
    }
}

impl TokenPolicy {
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_refresh_after(mut self, refresh_after: Duration) -> Self {
        self.refresh_after = refresh_after;
        self
    }

    pub fn with_check_cooldown(mut self, check_cooldown: Duration) -> Self {
        self.check_cooldown = check_cooldown;
        self
    }

    /// True when the record's age exceeds the hard ceiling. A record whose
    /// issue timestamp does not parse is treated as expired.
    #[must_use]
    pub fn is_expired(&self, record: &CredentialRecord, now: OffsetDateTime) -> bool {
        match record.age(now) {
            Some(age) => age > self.max_age,
            None => true,
        }
    }

    /// True once age exceeds the soft threshold.
    #[must_use]
    pub fn should_refresh(&self, record: &CredentialRecord, now: OffsetDateTime) -> bool {
        match record.age(now) {
            Some(age) => age > self.refresh_after,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::format_description::well_known::Rfc3339;
    use time::{Duration, OffsetDateTime};

    use super::TokenPolicy;
    use crate::record::CredentialRecord;

    fn record_issued_at(issued_at: &str) -> CredentialRecord {
        CredentialRecord {
            service_id: "svc".to_string(),
            service_name: "Service".to_string(),
            service_url: "http://svc.test".to_string(),
            token: "tok".to_string(),
            issued_at: issued_at.to_string(),
        }
    }

    fn at(timestamp: &str) -> OffsetDateTime {
        OffsetDateTime::parse(timestamp, &Rfc3339).expect("fixture timestamp should parse")
    }

    #[test]
    fn soft_threshold_trips_before_hard_ceiling() {
        let policy = TokenPolicy::default()
            .with_refresh_after(Duration::days(7))
            .with_max_age(Duration::days(30));
        let record = record_issued_at("2026-01-01T00:00:00Z");

        let young = at("2026-01-03T00:00:00Z");
        assert!(!policy.should_refresh(&record, young));
        assert!(!policy.is_expired(&record, young));

        let aging = at("2026-01-10T00:00:00Z");
        assert!(policy.should_refresh(&record, aging));
        assert!(!policy.is_expired(&record, aging));

        let ancient = at("2026-02-15T00:00:00Z");
        assert!(policy.should_refresh(&record, ancient));
        assert!(policy.is_expired(&record, ancient));
    }

    #[test]
    fn unparseable_timestamp_is_expired_and_due() {
        let policy = TokenPolicy::default();
        let record = record_issued_at("garbage");
        let now = OffsetDateTime::now_utc();

        assert!(policy.is_expired(&record, now));
        assert!(policy.should_refresh(&record, now));
    }
}
