//! Per-tenant bridge wiring: session registry, broadcast emitter, the
//! polling state machine, the WebSocket listener, and the supervisor that
//! assembles one bridge per roster entry.

#![deny(unsafe_code)]

pub mod bridge;
pub mod emitter;
pub mod metrics;
pub mod poller;
pub mod server;
pub mod session;
pub mod supervisor;

pub use bridge::TenantBridge;
pub use server::{start_listener, ListenerHandle};
pub use supervisor::BridgeSupervisor;
