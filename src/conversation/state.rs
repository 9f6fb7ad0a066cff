//! Mutable conversation bookkeeping.

use std::collections::HashMap;

use crate::events::server::ResponsePayload;

use super::item::Item;

/// A speech segment buffered before its item exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuedSpeech {
    pub audio_start_ms: u64,
    pub audio_end_ms: Option<u64>,
    /// Samples sliced out of the captured input buffer at speech stop.
    pub audio: Vec<i16>,
}

/// A server generation unit, tracked separately from items.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: String,
    pub payload: ResponsePayload,
    /// Item ids in output order.
    pub output: Vec<String>,
}

/// The authoritative in-memory model of one conversation session.
///
/// Invariant: every id in the ordered item list appears exactly once in
/// `item_lookup` and vice versa (deletion removes from both). Fragments
/// that outrace their item land in the queued side-tables and are merged
/// in when the item is created.
#[derive(Debug, Default)]
pub struct ConversationState {
    pub(crate) item_lookup: HashMap<String, Item>,
    pub(crate) item_order: Vec<String>,
    pub(crate) response_lookup: HashMap<String, Response>,
    pub(crate) response_order: Vec<String>,
    pub(crate) queued_speech: HashMap<String, QueuedSpeech>,
    pub(crate) queued_transcripts: HashMap<String, String>,
    pub(crate) queued_input_audio: Option<Vec<i16>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all conversation history and queued buffers.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.item_lookup.get(id)
    }

    /// Items in arrival order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.item_order
            .iter()
            .filter_map(|id| self.item_lookup.get(id))
    }

    pub fn response(&self, id: &str) -> Option<&Response> {
        self.response_lookup.get(id)
    }

    /// Responses in arrival order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.response_order
            .iter()
            .filter_map(|id| self.response_lookup.get(id))
    }

    pub fn queued_speech(&self) -> &HashMap<String, QueuedSpeech> {
        &self.queued_speech
    }

    pub fn queued_transcripts(&self) -> &HashMap<String, String> {
        &self.queued_transcripts
    }

    pub fn queued_input_audio(&self) -> Option<&[i16]> {
        self.queued_input_audio.as_deref()
    }
}
