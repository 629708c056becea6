use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::error::TokenStoreError;
use crate::store::{lock_unpoisoned, TokenStore};

/// Auth transport failure taxonomy.
///
/// `Unauthorized` is the only variant that destroys a credential; every
/// other failure keeps the record so a flaky network never logs the user
/// out.
#[derive(Debug, Clone, Error)]
pub enum AuthTransportError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Token payload from a successful refresh round trip.
#[derive(Debug, Clone)]
pub struct TokenRefresh {
    /// False when the server judged the token still young enough.
    pub refreshed: bool,
    pub token: Option<String>,
}

/// Network seam for credential upkeep. Implemented over the real backend
/// client by the session surface; tests install in-memory fakes.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn login(&self, service_url: &str, password: &str)
        -> Result<String, AuthTransportError>;
    async fn verify(&self, service_url: &str, token: &str) -> Result<bool, AuthTransportError>;
    async fn refresh(
        &self,
        service_url: &str,
        token: &str,
    ) -> Result<TokenRefresh, AuthTransportError>;
    async fn logout(&self, service_url: &str, token: &str) -> Result<(), AuthTransportError>;
}

/// Outcome of one scheduled refresh attempt for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No record for the service id.
    Missing,
    /// Another refresh is already in flight for this service.
    AlreadyRefreshing,
    /// Checked too recently; skipped under the cooldown.
    Throttled,
    /// Record age is still below the soft threshold.
    NotDue,
    /// New token stored, issue timestamp reset.
    Refreshed,
    /// Server reports the token does not need refreshing yet.
    NotNeeded,
    /// Network/timeout failure; record kept untouched.
    TransportFailed,
    /// Explicit unauthorized; record removed.
    Revoked,
}

/// Outcome of one verify round trip for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Missing,
    Valid,
    /// Server rejected the token; record removed.
    Invalid,
    /// Network/timeout failure; record kept untouched.
    TransportFailed,
}

impl TokenStore {
    /// Drive the per-service refresh state machine one step.
    ///
    /// At most one refresh is in flight per service id; a concurrent
    /// trigger is a no-op. The in-flight guard is checked before the
    /// cooldown so a racing tick reports `AlreadyRefreshing`, not
    /// `Throttled`.
    pub async fn refresh_tick(
        &self,
        service_id: &str,
        transport: &dyn AuthTransport,
    ) -> Result<RefreshOutcome, TokenStoreError> {
        let Some(record) = self.get(service_id) else {
            return Ok(RefreshOutcome::Missing);
        };

        let now = OffsetDateTime::now_utc();
        {
            let mut refreshing = lock_unpoisoned(&self.refreshing);
            if refreshing.contains(service_id) {
                return Ok(RefreshOutcome::AlreadyRefreshing);
            }

            let mut last_checked = lock_unpoisoned(&self.last_checked);
            if let Some(checked_at) = last_checked.get(service_id) {
                if now - *checked_at < self.policy().check_cooldown {
                    return Ok(RefreshOutcome::Throttled);
                }
            }

            if !self.policy().should_refresh(&record, now) {
                last_checked.insert(service_id.to_owned(), now);
                return Ok(RefreshOutcome::NotDue);
            }

            last_checked.insert(service_id.to_owned(), now);
            refreshing.insert(service_id.to_owned());
        }

        tracing::debug!(service_id, "refreshing backend token");
        let result = transport.refresh(&record.service_url, &record.token).await;
        lock_unpoisoned(&self.refreshing).remove(service_id);

        match result {
            Ok(TokenRefresh {
                refreshed: true,
                token: Some(token),
            }) => {
                let reissued = record.reissued(token)?;
                self.set(reissued)?;
                tracing::info!(service_id, "backend token refreshed");
                Ok(RefreshOutcome::Refreshed)
            }
            Ok(TokenRefresh { refreshed, token }) => {
                if refreshed && token.is_none() {
                    tracing::warn!(service_id, "refresh reported success without a token");
                }
                Ok(RefreshOutcome::NotNeeded)
            }
            Err(AuthTransportError::Unauthorized(reason)) => {
                tracing::warn!(service_id, %reason, "token revoked during refresh");
                self.remove(service_id)?;
                Ok(RefreshOutcome::Revoked)
            }
            Err(AuthTransportError::Transport(reason)) => {
                tracing::debug!(service_id, %reason, "refresh failed transiently; token kept");
                Ok(RefreshOutcome::TransportFailed)
            }
        }
    }

    /// One verify round trip with the transient-vs-unauthorized asymmetry:
    /// only an explicit rejection removes the credential.
    pub async fn verify_tick(
        &self,
        service_id: &str,
        transport: &dyn AuthTransport,
    ) -> Result<VerifyOutcome, TokenStoreError> {
        let Some(record) = self.get(service_id) else {
            return Ok(VerifyOutcome::Missing);
        };

        match transport.verify(&record.service_url, &record.token).await {
            Ok(true) => Ok(VerifyOutcome::Valid),
            Ok(false) => {
                tracing::warn!(service_id, "token reported invalid; removing");
                self.remove(service_id)?;
                Ok(VerifyOutcome::Invalid)
            }
            Err(AuthTransportError::Unauthorized(reason)) => {
                tracing::warn!(service_id, %reason, "token unauthorized; removing");
                self.remove(service_id)?;
                Ok(VerifyOutcome::Invalid)
            }
            Err(AuthTransportError::Transport(reason)) => {
                tracing::debug!(service_id, %reason, "verify failed transiently; token kept");
                Ok(VerifyOutcome::TransportFailed)
            }
        }
    }

    /// Explicit logout: best-effort server invalidation, then local removal
    /// regardless of the transport result.
    pub async fn logout(
        &self,
        service_id: &str,
        transport: &dyn AuthTransport,
    ) -> Result<bool, TokenStoreError> {
        let Some(record) = self.get(service_id) else {
            return Ok(false);
        };

        if let Err(error) = transport.logout(&record.service_url, &record.token).await {
            tracing::debug!(service_id, %error, "server-side logout failed; removing locally");
        }
        self.remove(service_id)
    }
}
