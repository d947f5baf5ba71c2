//! HTTP API server for external control (companion app UI)
//!
//! This module exposes the session coordinator over REST:
//! - /conversation/... - messages, the draft, and sending
//! - /recording/... - voice note capture
//! - /playback/... - voice note playback (repeat to toggle off)
//! - /speech/... - text-to-speech (repeat to toggle off)
//! - GET /status, GET /health

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
