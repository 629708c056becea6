//! Client-side conversation and session engine for an agent management
//! console.
//!
//! The console's UI is ordinary forms and tables; this workspace owns the
//! parts with real ordering discipline: per-service credential records with
//! race-free refresh (`token_store`), the backend transport and stream
//! decoder (`backend_api`), the pure conversation fold (`conversation`),
//! agent-to-agent task reconciliation (`external_task`), and the session
//! surface in this crate that wires them together: the chat controller and
//! the gated heartbeat scheduler.

pub mod external;
pub mod heartbeat;
pub mod session;
pub mod transport;

pub use external::ExternalCall;
pub use heartbeat::{
    HeartbeatHandle, HeartbeatScheduler, SessionTransport, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use session::ChatSession;
pub use transport::{BackendAuthTransport, BackendSessionTransport};
