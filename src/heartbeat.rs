use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use backend_api::{CancellationSignal, SessionPing};

/// Default gap between liveness pings for an armed session.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Network seam for session liveness. Implemented over the real backend
/// client in `transport.rs`; tests install in-memory fakes.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn session_exists(&self, session_id: &str) -> Result<bool, String>;
    async fn ping(&self, ping: &SessionPing) -> Result<(), String>;
}

/// Per-(agent, session) liveness pinger state.
///
/// A handle starts dormant and arms through exactly two paths: the first
/// successful response on a newly created session, or a confirmed one-shot
/// existence check when resuming. A session id minted client-side but not
/// yet acknowledged by the server is never pinged.
#[derive(Debug, Clone)]
pub struct HeartbeatHandle {
    agent_id: String,
    session_id: String,
    project_path: String,
    interval: Duration,
    armed: bool,
    arm_logged: bool,
}

impl HeartbeatHandle {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        project_path: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            project_path: project_path.into(),
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            armed: false,
            arm_logged: false,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Arm the handle. Idempotent; the transition is logged exactly once
    /// per handle, not on every render or tick.
    pub fn arm(&mut self) {
        if self.armed {
            return;
        }
        self.armed = true;
        if !self.arm_logged {
            self.arm_logged = true;
            tracing::info!(
                agent_id = %self.agent_id,
                session_id = %self.session_id,
                "heartbeat armed"
            );
        }
    }

    #[must_use]
    pub fn ping_payload(&self) -> SessionPing {
        SessionPing {
            agent_id: self.agent_id.clone(),
            session_id: self.session_id.clone(),
            project_path: self.project_path.clone(),
        }
    }
}

type HandleKey = (String, String);

/// Owns heartbeat handles and drives their periodic ticks.
///
/// Handles are keyed by (agent id, session id); a handle is destroyed when
/// the owning surface detaches or replaces its session identity.
pub struct HeartbeatScheduler {
    handles: Mutex<HashMap<HandleKey, HeartbeatHandle>>,
    interval: Duration,
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Create a dormant handle for a chat surface. Re-attaching the same
    /// identity keeps the existing handle (and its armed state).
    pub fn attach(
        &self,
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        project_path: impl Into<String>,
    ) {
        let agent_id = agent_id.into();
        let session_id = session_id.into();
        let key = (agent_id.clone(), session_id.clone());
        let interval = self.interval;
        lock_unpoisoned(&self.handles).entry(key).or_insert_with(|| {
            HeartbeatHandle::new(agent_id, session_id, project_path).with_interval(interval)
        });
    }

    /// Destroy the handle when the surface unmounts or its session identity
    /// changes.
    pub fn detach(&self, agent_id: &str, session_id: &str) {
        lock_unpoisoned(&self.handles)
            .remove(&(agent_id.to_owned(), session_id.to_owned()));
    }

    #[must_use]
    pub fn is_armed(&self, agent_id: &str, session_id: &str) -> bool {
        lock_unpoisoned(&self.handles)
            .get(&(agent_id.to_owned(), session_id.to_owned()))
            .is_some_and(HeartbeatHandle::is_armed)
    }

    /// Activation path 1: the first successful response on the session.
    pub fn mark_response_success(&self, agent_id: &str, session_id: &str) {
        let mut handles = lock_unpoisoned(&self.handles);
        if let Some(handle) = handles.get_mut(&(agent_id.to_owned(), session_id.to_owned())) {
            handle.arm();
        }
    }

    /// Activation path 2: one-shot existence check for a resumed session.
    ///
    /// Arms immediately when the server confirms the session; otherwise the
    /// handle stays dormant and falls back to path 1. A transport failure
    /// is transient and never arms.
    pub async fn activate_resumed(
        &self,
        agent_id: &str,
        session_id: &str,
        transport: &dyn SessionTransport,
    ) -> bool {
        let key = (agent_id.to_owned(), session_id.to_owned());
        {
            let handles = lock_unpoisoned(&self.handles);
            match handles.get(&key) {
                Some(handle) if handle.is_armed() => return true,
                Some(_) => {}
                None => return false,
            }
        }

        match transport.session_exists(session_id).await {
            Ok(true) => {
                let mut handles = lock_unpoisoned(&self.handles);
                if let Some(handle) = handles.get_mut(&key) {
                    handle.arm();
                    true
                } else {
                    false
                }
            }
            Ok(false) => {
                tracing::debug!(session_id, "resumed session not found; staying dormant");
                false
            }
            Err(error) => {
                tracing::debug!(session_id, %error, "existence check failed; staying dormant");
                false
            }
        }
    }

    /// Ping every armed session once. Returns the number of pings sent.
    /// Ping failures are logged and never disarm a handle.
    pub async fn tick(&self, transport: &dyn SessionTransport) -> usize {
        let pings: Vec<SessionPing> = {
            let handles = lock_unpoisoned(&self.handles);
            handles
                .values()
                .filter(|handle| handle.is_armed())
                .map(HeartbeatHandle::ping_payload)
                .collect()
        };

        let mut sent = 0;
        for ping in pings {
            match transport.ping(&ping).await {
                Ok(()) => sent += 1,
                Err(error) => {
                    tracing::warn!(
                        session_id = %ping.session_id,
                        %error,
                        "heartbeat ping failed"
                    );
                }
            }
        }
        sent
    }

    /// Drive ticks on the configured interval until cancelled.
    pub async fn run(&self, transport: &dyn SessionTransport, cancellation: &CancellationSignal) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if cancellation.load(Ordering::Acquire) {
                return;
            }
            self.tick(transport).await;
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
