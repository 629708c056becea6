use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use agent_console::heartbeat::{HeartbeatScheduler, SessionTransport};
use async_trait::async_trait;
use backend_api::SessionPing;

#[derive(Debug, Clone, Copy)]
enum PlannedExistence {
    Exists,
    Missing,
    NetworkDown,
}

struct FakeSessionTransport {
    existence: PlannedExistence,
    ping_count: AtomicUsize,
    pings: Mutex<Vec<SessionPing>>,
}

impl FakeSessionTransport {
    fn new(existence: PlannedExistence) -> Self {
        Self {
            existence,
            ping_count: AtomicUsize::new(0),
            pings: Mutex::new(Vec::new()),
        }
    }

    fn ping_count(&self) -> usize {
        self.ping_count.load(Ordering::SeqCst)
    }

    fn last_ping(&self) -> Option<SessionPing> {
        self.pings
            .lock()
            .expect("ping log lock should not poison")
            .last()
            .cloned()
    }
}

#[async_trait]
impl SessionTransport for FakeSessionTransport {
    async fn session_exists(&self, _session_id: &str) -> Result<bool, String> {
        match self.existence {
            PlannedExistence::Exists => Ok(true),
            PlannedExistence::Missing => Ok(false),
            PlannedExistence::NetworkDown => Err("connection refused".to_string()),
        }
    }

    async fn ping(&self, ping: &SessionPing) -> Result<(), String> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        self.pings
            .lock()
            .expect("ping log lock should not poison")
            .push(ping.clone());
        Ok(())
    }
}

#[tokio::test]
async fn no_ping_before_first_successful_response() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s1", "/work");

    // t=0: session id is minted client-side only; nothing may be pinged.
    assert_eq!(scheduler.tick(&transport).await, 0);
    assert_eq!(transport.ping_count(), 0);

    scheduler.mark_response_success("agent-1", "s1");

    // t=1: the server has acknowledged the session; pings flow.
    assert_eq!(scheduler.tick(&transport).await, 1);
    assert_eq!(transport.ping_count(), 1);
}

#[tokio::test]
async fn ping_payload_carries_session_identity() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s1", "/work/project");
    scheduler.mark_response_success("agent-1", "s1");

    scheduler.tick(&transport).await;

    let ping = transport.last_ping().expect("a ping should have been sent");
    assert_eq!(ping.agent_id, "agent-1");
    assert_eq!(ping.session_id, "s1");
    assert_eq!(ping.project_path, "/work/project");
}

#[tokio::test]
async fn resumed_session_arms_after_confirmed_existence() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s-old", "/work");

    assert!(scheduler.activate_resumed("agent-1", "s-old", &transport).await);
    assert!(scheduler.is_armed("agent-1", "s-old"));
    assert_eq!(scheduler.tick(&transport).await, 1);
}

#[tokio::test]
async fn unknown_resumed_session_stays_dormant_until_response() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Missing);
    scheduler.attach("agent-1", "s-old", "/work");

    assert!(!scheduler.activate_resumed("agent-1", "s-old", &transport).await);
    assert_eq!(scheduler.tick(&transport).await, 0);

    // Fallback to path 1: a later successful response still arms it.
    scheduler.mark_response_success("agent-1", "s-old");
    assert_eq!(scheduler.tick(&transport).await, 1);
}

#[tokio::test]
async fn existence_check_failure_is_transient_and_never_arms() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::NetworkDown);
    scheduler.attach("agent-1", "s-old", "/work");

    assert!(!scheduler.activate_resumed("agent-1", "s-old", &transport).await);
    assert!(!scheduler.is_armed("agent-1", "s-old"));
    assert_eq!(scheduler.tick(&transport).await, 0);
}

#[tokio::test]
async fn arming_is_idempotent() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s1", "/work");

    scheduler.mark_response_success("agent-1", "s1");
    scheduler.mark_response_success("agent-1", "s1");
    assert!(scheduler.activate_resumed("agent-1", "s1", &transport).await);

    assert_eq!(scheduler.tick(&transport).await, 1);
}

#[tokio::test]
async fn detach_destroys_the_handle() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s1", "/work");
    scheduler.mark_response_success("agent-1", "s1");

    scheduler.detach("agent-1", "s1");

    assert_eq!(scheduler.tick(&transport).await, 0);
    assert!(!scheduler.is_armed("agent-1", "s1"));
}

#[tokio::test]
async fn session_identity_change_starts_a_fresh_dormant_handle() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);
    scheduler.attach("agent-1", "s1", "/work");
    scheduler.mark_response_success("agent-1", "s1");

    // The surface switches sessions: old handle destroyed, new one dormant.
    scheduler.detach("agent-1", "s1");
    scheduler.attach("agent-1", "s2", "/work");

    assert_eq!(scheduler.tick(&transport).await, 0);
    scheduler.mark_response_success("agent-1", "s2");
    assert_eq!(scheduler.tick(&transport).await, 1);
    assert_eq!(
        transport.last_ping().map(|ping| ping.session_id),
        Some("s2".to_string())
    );
}

#[tokio::test]
async fn activating_an_unattached_session_is_a_no_op() {
    let scheduler = HeartbeatScheduler::new();
    let transport = FakeSessionTransport::new(PlannedExistence::Exists);

    assert!(!scheduler.activate_resumed("agent-1", "ghost", &transport).await);
    scheduler.mark_response_success("agent-1", "ghost");
    assert_eq!(scheduler.tick(&transport).await, 0);
}
