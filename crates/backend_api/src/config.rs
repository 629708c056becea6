use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_BASE_URL;

/// Default ceiling for verify/health round trips. Short so a dead backend
/// is reported quickly and the caller can distinguish timeout from reject.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport configuration for one backend service.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Bearer token passed to `Authorization`.
    pub token: String,
    /// Base URL of the backend service.
    pub base_url: String,
    /// Agent identifier carried in the `x-agent-id` header.
    pub agent_id: Option<String>,
    /// Optional `x-session-id` request header value.
    pub session_id: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional whole-request timeout for non-probe calls.
    pub timeout: Option<Duration>,
    /// Timeout applied to verify/health probes.
    pub probe_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_id: None,
            session_id: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl BackendConfig {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
