//! Transport-only backend client primitives.
//!
//! This crate owns request building, response parsing, and stream decoding
//! for one backend service's endpoints: chat streaming, replay history,
//! health probes, session liveness, and auth. It intentionally contains no
//! conversation folding and no UI coupling; decoded frames are handed to
//! callers as raw JSON values.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{BackendApiClient, CancellationSignal};
pub use config::BackendConfig;
pub use error::BackendApiError;
pub use payload::{ChatRequest, RefreshResponse, SessionPing};
pub use sse::FrameDecoder;
pub use url::normalize_base_url;
