//! Static decode surface for raw wire payloads.

use serde_json::Value;

use crate::error::{ColloquyError, Result};

use super::server::ServerEvent;

/// Maps wire `type` tags to typed server events.
///
/// The tag table is fixed at compile time and inspectable through
/// [`EventRegistry::types`]; nothing registers itself at load time.
/// `construct` refuses unknown tags before attempting to decode the
/// payload, so a malformed body for a known tag and an unknown tag fail
/// distinguishably.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRegistry;

impl EventRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Every registered wire tag.
    pub fn types(&self) -> &'static [&'static str] {
        ServerEvent::TYPES
    }

    /// Whether `event_type` has a registered constructor.
    pub fn contains(&self, event_type: &str) -> bool {
        ServerEvent::TYPES.contains(&event_type)
    }

    /// Decode a raw event mapping into a typed server event.
    ///
    /// Fails with [`ColloquyError::UnknownEventType`] when the `type` key
    /// is missing or not registered.
    pub fn construct(&self, raw: Value) -> Result<ServerEvent> {
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ColloquyError::UnknownEventType("<missing type>".into()))?;
        if !self.contains(tag) {
            return Err(ColloquyError::UnknownEventType(tag.to_string()));
        }
        serde_json::from_value(raw).map_err(ColloquyError::from)
    }
}
