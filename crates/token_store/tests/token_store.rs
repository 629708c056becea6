use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use token_store::{
    AuthTransport, AuthTransportError, CredentialRecord, RefreshOutcome, TokenPolicy, TokenRefresh,
    TokenStore, TokenStoreError, VerifyOutcome,
};

#[derive(Debug, Clone)]
enum PlannedRefresh {
    Refreshed(&'static str),
    NotNeeded,
    Unauthorized,
    NetworkDown,
}

#[derive(Debug, Clone)]
enum PlannedVerify {
    Valid,
    Invalid,
    Unauthorized,
    TimedOut,
}

struct FakeAuthTransport {
    refresh_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    refresh_delay: Option<StdDuration>,
    refresh_plan: Mutex<PlannedRefresh>,
    verify_plan: Mutex<PlannedVerify>,
}

impl FakeAuthTransport {
    fn new(refresh_plan: PlannedRefresh, verify_plan: PlannedVerify) -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            refresh_delay: None,
            refresh_plan: Mutex::new(refresh_plan),
            verify_plan: Mutex::new(verify_plan),
        }
    }

    fn with_refresh_delay(mut self, delay: StdDuration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthTransport for FakeAuthTransport {
    async fn login(&self, _service_url: &str, _password: &str) -> Result<String, AuthTransportError> {
        Ok("login-token".to_string())
    }

    async fn verify(&self, _service_url: &str, _token: &str) -> Result<bool, AuthTransportError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .verify_plan
            .lock()
            .expect("verify plan lock should not poison")
            .clone();
        match plan {
            PlannedVerify::Valid => Ok(true),
            PlannedVerify::Invalid => Ok(false),
            PlannedVerify::Unauthorized => {
                Err(AuthTransportError::Unauthorized("401".to_string()))
            }
            PlannedVerify::TimedOut => Err(AuthTransportError::Transport(
                "verify timed out".to_string(),
            )),
        }
    }

    async fn refresh(
        &self,
        _service_url: &str,
        _token: &str,
    ) -> Result<TokenRefresh, AuthTransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        let plan = self
            .refresh_plan
            .lock()
            .expect("refresh plan lock should not poison")
            .clone();
        match plan {
            PlannedRefresh::Refreshed(token) => Ok(TokenRefresh {
                refreshed: true,
                token: Some(token.to_string()),
            }),
            PlannedRefresh::NotNeeded => Ok(TokenRefresh {
                refreshed: false,
                token: None,
            }),
            PlannedRefresh::Unauthorized => {
                Err(AuthTransportError::Unauthorized("401".to_string()))
            }
            PlannedRefresh::NetworkDown => Err(AuthTransportError::Transport(
                "connection refused".to_string(),
            )),
        }
    }

    async fn logout(&self, _service_url: &str, _token: &str) -> Result<(), AuthTransportError> {
        Ok(())
    }
}

fn record_aged_days(service_id: &str, days: i64) -> CredentialRecord {
    let issued = OffsetDateTime::now_utc() - Duration::days(days);
    CredentialRecord {
        service_id: service_id.to_string(),
        service_name: "Service".to_string(),
        service_url: "http://svc.test".to_string(),
        token: "tok-original".to_string(),
        issued_at: issued
            .format(&Rfc3339)
            .expect("fixture timestamp should format"),
    }
}

fn store_with(record: CredentialRecord) -> TokenStore {
    let store = TokenStore::in_memory(TokenPolicy::default());
    store.set(record).expect("seeding the store should succeed");
    store
}

#[test]
fn store_round_trips_through_its_file() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("tokens.json");

    let store =
        TokenStore::open(&path, TokenPolicy::default()).expect("missing file should open empty");
    store
        .set(record_aged_days("svc-a", 1))
        .expect("set should persist");
    store
        .set(record_aged_days("svc-b", 2))
        .expect("set should persist");

    let reopened = TokenStore::open(&path, TokenPolicy::default()).expect("reopen should succeed");
    assert_eq!(
        reopened.service_ids(),
        vec!["svc-a".to_string(), "svc-b".to_string()]
    );
    assert_eq!(reopened.last_active().as_deref(), Some("svc-b"));
    assert_eq!(
        reopened.get("svc-a").map(|record| record.token),
        Some("tok-original".to_string())
    );
}

#[test]
fn corrupt_store_file_is_a_construction_error() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, "{not json").expect("fixture write should succeed");

    let error = TokenStore::open(&path, TokenPolicy::default())
        .expect_err("corrupt file should not open");
    assert!(matches!(error, TokenStoreError::Parse { .. }));
}

#[tokio::test]
async fn concurrent_refresh_triggers_produce_one_inflight_call() {
    let store = store_with(record_aged_days("svc", 10));
    let transport = FakeAuthTransport::new(PlannedRefresh::Refreshed("tok-new"), PlannedVerify::Valid)
        .with_refresh_delay(StdDuration::from_millis(50));

    let (first, second) = tokio::join!(
        store.refresh_tick("svc", &transport),
        store.refresh_tick("svc", &transport),
    );

    let outcomes = [
        first.expect("first tick should succeed"),
        second.expect("second tick should succeed"),
    ];
    assert!(outcomes.contains(&RefreshOutcome::Refreshed));
    assert!(outcomes.contains(&RefreshOutcome::AlreadyRefreshing));
    assert_eq!(transport.refresh_calls(), 1);
    assert_eq!(
        store.get("svc").map(|record| record.token),
        Some("tok-new".to_string())
    );
}

#[tokio::test]
async fn refresh_resets_issue_timestamp() {
    let store = store_with(record_aged_days("svc", 10));
    let stale_issued_at = store
        .get("svc")
        .map(|record| record.issued_at)
        .expect("seeded record should exist");
    let transport =
        FakeAuthTransport::new(PlannedRefresh::Refreshed("tok-new"), PlannedVerify::Valid);

    let outcome = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, RefreshOutcome::Refreshed);
    let record = store.get("svc").expect("record should remain");
    assert_ne!(record.issued_at, stale_issued_at);
    assert!(!store.should_refresh(&record));
}

#[tokio::test]
async fn server_not_needed_keeps_existing_token() {
    let store = store_with(record_aged_days("svc", 10));
    let transport = FakeAuthTransport::new(PlannedRefresh::NotNeeded, PlannedVerify::Valid);

    let outcome = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, RefreshOutcome::NotNeeded);
    assert_eq!(
        store.get("svc").map(|record| record.token),
        Some("tok-original".to_string())
    );
}

#[tokio::test]
async fn network_failure_during_refresh_keeps_the_credential() {
    let store = store_with(record_aged_days("svc", 10));
    let transport = FakeAuthTransport::new(PlannedRefresh::NetworkDown, PlannedVerify::Valid);

    let outcome = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, RefreshOutcome::TransportFailed);
    assert!(store.get("svc").is_some());
}

#[tokio::test]
async fn unauthorized_refresh_removes_the_credential() {
    let store = store_with(record_aged_days("svc", 10));
    let transport = FakeAuthTransport::new(PlannedRefresh::Unauthorized, PlannedVerify::Valid);

    let outcome = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, RefreshOutcome::Revoked);
    assert!(store.get("svc").is_none());
}

#[tokio::test]
async fn young_record_is_not_due_and_skips_the_transport() {
    let store = store_with(record_aged_days("svc", 1));
    let transport =
        FakeAuthTransport::new(PlannedRefresh::Refreshed("tok-new"), PlannedVerify::Valid);

    let outcome = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, RefreshOutcome::NotDue);
    assert_eq!(transport.refresh_calls(), 0);
}

#[tokio::test]
async fn checks_within_the_cooldown_are_throttled() {
    let store = store_with(record_aged_days("svc", 1));
    let transport =
        FakeAuthTransport::new(PlannedRefresh::Refreshed("tok-new"), PlannedVerify::Valid);

    let first = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");
    let second = store
        .refresh_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(first, RefreshOutcome::NotDue);
    assert_eq!(second, RefreshOutcome::Throttled);
}

#[tokio::test]
async fn verify_timeout_keeps_credential_but_rejection_removes_it() {
    let store = store_with(record_aged_days("svc", 1));
    let timed_out = FakeAuthTransport::new(PlannedRefresh::NotNeeded, PlannedVerify::TimedOut);

    let outcome = store
        .verify_tick("svc", &timed_out)
        .await
        .expect("tick should succeed");
    assert_eq!(outcome, VerifyOutcome::TransportFailed);
    assert!(store.get("svc").is_some(), "timeout must not log the user out");

    let rejected = FakeAuthTransport::new(PlannedRefresh::NotNeeded, PlannedVerify::Unauthorized);
    let outcome = store
        .verify_tick("svc", &rejected)
        .await
        .expect("tick should succeed");
    assert_eq!(outcome, VerifyOutcome::Invalid);
    assert!(store.get("svc").is_none());
    assert_eq!(rejected.verify_calls(), 1);
}

#[tokio::test]
async fn verify_invalid_response_removes_credential() {
    let store = store_with(record_aged_days("svc", 1));
    let transport = FakeAuthTransport::new(PlannedRefresh::NotNeeded, PlannedVerify::Invalid);

    let outcome = store
        .verify_tick("svc", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(outcome, VerifyOutcome::Invalid);
    assert!(store.get("svc").is_none());
}

#[tokio::test]
async fn missing_service_is_reported_without_transport_calls() {
    let store = TokenStore::in_memory(TokenPolicy::default());
    let transport =
        FakeAuthTransport::new(PlannedRefresh::Refreshed("tok-new"), PlannedVerify::Valid);

    let refresh = store
        .refresh_tick("ghost", &transport)
        .await
        .expect("tick should succeed");
    let verify = store
        .verify_tick("ghost", &transport)
        .await
        .expect("tick should succeed");

    assert_eq!(refresh, RefreshOutcome::Missing);
    assert_eq!(verify, VerifyOutcome::Missing);
    assert_eq!(transport.refresh_calls(), 0);
    assert_eq!(transport.verify_calls(), 0);
}
