//! Realtime session: configuration, transport, and the client glue.

pub mod client;
pub mod config;
pub mod transport;

pub use client::{RealtimeClient, StepOutcome};
pub use config::SessionConfig;
pub use transport::RealtimeTransport;
