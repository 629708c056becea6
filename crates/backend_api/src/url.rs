/// Default base URL for a locally-run backend service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8420";

/// Normalize a backend base URL.
///
/// Normalization rules:
/// 1) an empty input falls back to the default base URL
/// 2) surrounding whitespace and trailing slashes are stripped
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

pub fn chat_url(base: &str) -> String {
    format!("{}/chat", normalize_base_url(base))
}

pub fn health_url(base: &str) -> String {
    format!("{}/health", normalize_base_url(base))
}

pub fn auth_url(base: &str, operation: &str) -> String {
    format!("{}/auth/{operation}", normalize_base_url(base))
}

pub fn session_exists_url(base: &str, session_id: &str) -> String {
    format!("{}/sessions/{session_id}/exists", normalize_base_url(base))
}

pub fn session_heartbeat_url(base: &str, session_id: &str) -> String {
    format!("{}/sessions/{session_id}/heartbeat", normalize_base_url(base))
}

pub fn session_history_url(base: &str, session_id: &str) -> String {
    format!("{}/sessions/{session_id}/history", normalize_base_url(base))
}
