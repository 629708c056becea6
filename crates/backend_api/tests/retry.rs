use std::time::Duration;

use backend_api::retry::{is_retryable_http_error, retry_delay_ms, BASE_DELAY_MS, MAX_RETRIES};

#[test]
fn transient_statuses_are_retryable() {
    for status in [429, 500, 502, 503, 504] {
        assert!(is_retryable_http_error(status, ""), "status {status}");
    }
}

#[test]
fn unauthorized_and_client_errors_are_not_retryable() {
    assert!(!is_retryable_http_error(401, ""));
    assert!(!is_retryable_http_error(403, ""));
    assert!(!is_retryable_http_error(404, ""));
    assert!(!is_retryable_http_error(422, ""));
}

#[test]
fn retryable_error_text_matches_regardless_of_status() {
    assert!(is_retryable_http_error(400, "Rate limit exceeded"));
    assert!(is_retryable_http_error(400, "upstream connect error"));
    assert!(!is_retryable_http_error(400, "validation failed"));
}

#[test]
fn backoff_grows_exponentially() {
    assert_eq!(retry_delay_ms(0), Duration::from_millis(BASE_DELAY_MS));
    assert_eq!(retry_delay_ms(1), Duration::from_millis(BASE_DELAY_MS * 2));
    assert_eq!(retry_delay_ms(2), Duration::from_millis(BASE_DELAY_MS * 4));
    assert!(MAX_RETRIES >= 1);
}
