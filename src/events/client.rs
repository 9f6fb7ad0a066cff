//! Typed client events for the realtime wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::item::Item;
use crate::error::Result;

/// Client-originated events, tagged by their wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded little-endian PCM16.
        audio: String,
    },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,

    #[serde(rename = "conversation.item.create")]
    ItemCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: Item,
    },

    #[serde(rename = "conversation.item.truncate")]
    ItemTruncate {
        item_id: String,
        content_index: usize,
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.delete")]
    ItemDelete { item_id: String },

    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// The wire `type` tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::InputAudioBufferClear => "input_audio_buffer.clear",
            Self::ItemCreate { .. } => "conversation.item.create",
            Self::ItemTruncate { .. } => "conversation.item.truncate",
            Self::ItemDelete { .. } => "conversation.item.delete",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel => "response.cancel",
        }
    }

    /// Serialize for the wire, stamping the generated `event_id`.
    pub fn to_wire(&self, event_id: &str) -> Result<Value> {
        let mut payload = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut payload {
            fields.insert("event_id".into(), Value::String(event_id.to_string()));
        }
        Ok(payload)
    }
}
