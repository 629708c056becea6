use backend_api::payload::{RefreshResponse, SessionPing, VerifyResponse};
use backend_api::ChatRequest;
use serde_json::json;

#[test]
fn chat_request_serializes_camel_case_and_omits_default_resume() {
    let request = ChatRequest::new("agent-1", "s-1", "/work/project", "hello");
    let value = serde_json::to_value(&request).expect("chat request should serialize");

    assert_eq!(
        value,
        json!({
            "agentId": "agent-1",
            "sessionId": "s-1",
            "projectPath": "/work/project",
            "message": "hello"
        })
    );
}

#[test]
fn resumed_chat_request_carries_the_flag() {
    let request = ChatRequest::new("agent-1", "s-1", "/work/project", "hello").resumed();
    let value = serde_json::to_value(&request).expect("chat request should serialize");
    assert_eq!(value["resume"], json!(true));
}

#[test]
fn session_ping_round_trips_camel_case() {
    let ping = SessionPing {
        agent_id: "agent-1".to_string(),
        session_id: "s-1".to_string(),
        project_path: "/work/project".to_string(),
    };

    let value = serde_json::to_value(&ping).expect("ping should serialize");
    assert_eq!(value["agentId"], "agent-1");
    assert_eq!(value["sessionId"], "s-1");
    assert_eq!(value["projectPath"], "/work/project");

    let parsed: SessionPing = serde_json::from_value(value).expect("ping should deserialize");
    assert_eq!(parsed, ping);
}

#[test]
fn refresh_response_defaults_optional_fields() {
    let parsed: RefreshResponse =
        serde_json::from_str(r#"{"success":true}"#).expect("minimal refresh should parse");
    assert!(parsed.success);
    assert!(!parsed.refreshed);
    assert!(parsed.token.is_none());

    let parsed: RefreshResponse =
        serde_json::from_str(r#"{"success":true,"token":"t2","refreshed":true}"#)
            .expect("full refresh should parse");
    assert!(parsed.refreshed);
    assert_eq!(parsed.token.as_deref(), Some("t2"));
}

#[test]
fn verify_response_parses_validity() {
    let parsed: VerifyResponse =
        serde_json::from_str(r#"{"valid":false}"#).expect("verify should parse");
    assert!(!parsed.valid);
}
