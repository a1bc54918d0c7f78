//! HTTP API server for controlling capture sessions
//!
//! This module provides a REST API the review UI drives:
//! - POST /recordings/start - Start capturing
//! - POST /recordings/:id/finish - Finalize the WAV and hand it off
//! - POST /recordings/:id/cancel - Discard the recording
//! - GET /recordings/:id/status - Query session status
//! - GET /recordings - List active sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, DeviceFactory};
