//! WebSocket Session Management
//!
//! This module contains the realtime side of the service: one WebSocket per
//! call, speaking the voice platform's JSON protocol. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: Inbound events and outbound frames as they appear on the wire.
//! - `session`: Connection lifecycle, from upgrade to disconnect.
//! - `dispatcher`: The per-call state machine deciding what to say and when.
//! - `cycle`: Generating and streaming one interviewer reply, with retries.
//! - `prober`: Background compatibility checks.
//! - `writer`: The ordered outbound frame channel.

mod cycle;
pub mod dispatcher;
mod prober;
pub mod protocol;
pub mod session;
mod writer;

pub use session::ws_handler;
