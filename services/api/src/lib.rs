//! Interview API Library Crate
//!
//! This library contains the realtime side of the mock interview service:
//! configuration, the shared application state, routing, and the per-call
//! WebSocket session logic. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
