use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::TokenStoreError;

/// One credential for one registered backend service.
///
/// There is exactly one record per service id; replacing the record for the
/// same id is the only mutation. Records are destroyed on explicit logout,
/// detected invalidity, or service removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub service_id: String,
    pub service_name: String,
    pub service_url: String,
    pub token: String,
    /// RFC3339 issue timestamp; the age baseline for expiry policy.
    pub issued_at: String,
}

impl CredentialRecord {
    /// Build a record stamped with the current UTC time.
    pub fn issued_now(
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        service_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, TokenStoreError> {
        Ok(Self {
            service_id: service_id.into(),
            service_name: service_name.into(),
            service_url: service_url.into(),
            token: token.into(),
            issued_at: format_rfc3339(OffsetDateTime::now_utc())?,
        })
    }

    /// Age relative to `now`, or `None` when `issued_at` does not parse.
    #[must_use]
    pub fn age(&self, now: OffsetDateTime) -> Option<Duration> {
        let issued = OffsetDateTime::parse(&self.issued_at, &Rfc3339).ok()?;
        Some(now - issued)
    }

    /// Same record with a replacement token and a reset issue timestamp.
    pub fn reissued(&self, token: impl Into<String>) -> Result<Self, TokenStoreError> {
        Ok(Self {
            token: token.into(),
            issued_at: format_rfc3339(OffsetDateTime::now_utc())?,
            ..self.clone()
        })
    }
}

/// Store mutation notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreEvent {
    Updated { service_id: String },
    Removed { service_id: String },
}

pub(crate) fn format_rfc3339(moment: OffsetDateTime) -> Result<String, TokenStoreError> {
    moment
        .format(&Rfc3339)
        .map_err(TokenStoreError::ClockFormat)
}
