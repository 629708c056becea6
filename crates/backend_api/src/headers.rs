use std::collections::BTreeMap;

use crate::config::BackendConfig;
use crate::error::BackendApiError;

pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AGENT_ID: &str = "x-agent-id";
pub const HEADER_SESSION_ID: &str = "x-session-id";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";
pub const ACCEPT_JSON: &str = "application/json";

const DEFAULT_USER_AGENT: &str = concat!("agent-console/", env!("CARGO_PKG_VERSION"));

/// Build a deterministic header map for backend requests.
///
/// `streaming` selects the accept header: event-stream for chat requests,
/// JSON for everything else. Extra headers are lowercased so the map order
/// (and therefore the outgoing header order) is stable.
pub fn build_headers(
    config: &BackendConfig,
    streaming: bool,
) -> Result<BTreeMap<String, String>, BackendApiError> {
    if config.token.trim().is_empty() {
        return Err(BackendApiError::MissingToken);
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", config.token.trim()),
    );
    headers.insert(
        HEADER_ACCEPT.to_owned(),
        if streaming {
            ACCEPT_EVENT_STREAM.to_owned()
        } else {
            ACCEPT_JSON.to_owned()
        },
    );
    headers.insert(HEADER_CONTENT_TYPE.to_owned(), ACCEPT_JSON.to_owned());

    let user_agent = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT);
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.to_owned());

    if let Some(agent_id) = config.agent_id.as_deref().map(str::trim) {
        if !agent_id.is_empty() {
            headers.insert(HEADER_AGENT_ID.to_owned(), agent_id.to_owned());
        }
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    if let Some(session_id) = config.session_id.as_deref().map(str::trim) {
        if !session_id.is_empty() {
            headers.insert(HEADER_SESSION_ID.to_owned(), session_id.to_owned());
        }
    }

    Ok(headers)
}
