use std::time::Duration;

use async_trait::async_trait;
use backend_api::{BackendApiClient, BackendApiError, BackendConfig, SessionPing};
use token_store::{AuthTransport, AuthTransportError, TokenRefresh};

use crate::heartbeat::SessionTransport;

/// [`SessionTransport`] over the real backend client for one session's
/// service.
pub struct BackendSessionTransport {
    client: BackendApiClient,
}

impl BackendSessionTransport {
    #[must_use]
    pub fn new(client: BackendApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionTransport for BackendSessionTransport {
    async fn session_exists(&self, session_id: &str) -> Result<bool, String> {
        self.client
            .session_exists(session_id)
            .await
            .map_err(|error| error.to_string())
    }

    async fn ping(&self, ping: &SessionPing) -> Result<(), String> {
        self.client
            .ping_session(ping)
            .await
            .map_err(|error| error.to_string())
    }
}

/// [`AuthTransport`] over per-service backend clients.
///
/// Auth calls address arbitrary service URLs (the token store drives many
/// services through one transport), so a short-lived client is built per
/// call instead of binding one base URL at construction.
pub struct BackendAuthTransport {
    probe_timeout: Option<Duration>,
}

impl Default for BackendAuthTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendAuthTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe_timeout: None,
        }
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    fn client_for(&self, service_url: &str) -> Result<BackendApiClient, AuthTransportError> {
        // Auth endpoints authenticate per call; the config token is unused.
        let mut config = BackendConfig::new("", service_url);
        if let Some(timeout) = self.probe_timeout {
            config = config.with_probe_timeout(timeout);
        }
        BackendApiClient::new(config).map_err(map_auth_error)
    }
}

#[async_trait]
impl AuthTransport for BackendAuthTransport {
    async fn login(&self, service_url: &str, password: &str) -> Result<String, AuthTransportError> {
        let client = self.client_for(service_url)?;
        client.login(password).await.map_err(map_auth_error)
    }

    async fn verify(&self, service_url: &str, token: &str) -> Result<bool, AuthTransportError> {
        let client = self.client_for(service_url)?;
        client.verify(token).await.map_err(map_auth_error)
    }

    async fn refresh(
        &self,
        service_url: &str,
        token: &str,
    ) -> Result<TokenRefresh, AuthTransportError> {
        let client = self.client_for(service_url)?;
        let response = client.refresh(token).await.map_err(map_auth_error)?;
        if !response.success {
            return Err(AuthTransportError::Transport(
                "refresh reported failure without a status".to_owned(),
            ));
        }
        Ok(TokenRefresh {
            refreshed: response.refreshed,
            token: response.token,
        })
    }

    async fn logout(&self, service_url: &str, token: &str) -> Result<(), AuthTransportError> {
        let client = self.client_for(service_url)?;
        client.logout(token).await.map_err(map_auth_error)
    }
}

fn map_auth_error(error: BackendApiError) -> AuthTransportError {
    match error {
        BackendApiError::Unauthorized(message) => AuthTransportError::Unauthorized(message),
        other => AuthTransportError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use backend_api::BackendApiError;
    use token_store::AuthTransportError;

    use super::map_auth_error;

    #[test]
    fn unauthorized_maps_to_unauthorized() {
        let mapped = map_auth_error(BackendApiError::Unauthorized("401".to_string()));
        assert!(matches!(mapped, AuthTransportError::Unauthorized(_)));
    }

    #[test]
    fn every_other_failure_maps_to_transport() {
        let mapped = map_auth_error(BackendApiError::Unknown("bad gateway".to_string()));
        assert!(matches!(mapped, AuthTransportError::Transport(_)));

        let mapped = map_auth_error(BackendApiError::RetryExhausted {
            status: None,
            last_error: None,
        });
        assert!(matches!(mapped, AuthTransportError::Transport(_)));
    }
}
