//! Typed wire events and the decode registry.

pub mod client;
pub mod registry;
pub mod server;

pub use client::ClientEvent;
pub use registry::EventRegistry;
pub use server::{ErrorPayload, ResponsePayload, ServerEvent};

use serde::{Deserialize, Serialize};

/// Any event on the wire, as published on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RealtimeEvent {
    Server(ServerEvent),
    Client(ClientEvent),
}

impl RealtimeEvent {
    /// The wire `type` tag of the wrapped event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Server(event) => event.event_type(),
            Self::Client(event) => event.event_type(),
        }
    }

    pub fn as_server(&self) -> Option<&ServerEvent> {
        match self {
            Self::Server(event) => Some(event),
            Self::Client(_) => None,
        }
    }

    pub fn as_client(&self) -> Option<&ClientEvent> {
        match self {
            Self::Client(event) => Some(event),
            Self::Server(_) => None,
        }
    }
}
