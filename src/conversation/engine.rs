//! Reconciliation of server events into conversation state.
//!
//! One transition per event kind, applied strictly in arrival order. The
//! queued side-tables rely on that ordering: an item creation is
//! guaranteed to see every fragment dispatched before it, and only those.
//! Transitions are synchronous and perform no I/O; a failed lookup leaves
//! the state untouched for that event.

use tracing::debug;

use crate::audio;
use crate::error::{ColloquyError, Result};
use crate::events::server::{ResponsePayload, ServerEvent};

use super::item::{ContentPart, FormattedItem, FormattedTool, Item, ItemKind, ItemRole, ItemStatus};
use super::state::{ConversationState, QueuedSpeech, Response};

/// PCM sample rate of the realtime wire (24 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// What a single reconciled event changed, for re-rendering downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChange {
    /// The affected item, as it stands after the event (the removed item
    /// for deletions).
    pub item: Option<Item>,
    /// The incremental fragment applied by this event.
    pub delta: Option<ItemDelta>,
}

impl ItemChange {
    fn item(item: &Item) -> Self {
        Self {
            item: Some(item.clone()),
            delta: None,
        }
    }

    fn with_delta(item: &Item, delta: ItemDelta) -> Self {
        Self {
            item: Some(item.clone()),
            delta: Some(delta),
        }
    }
}

/// Incremental fragment carried by a delta-bearing event.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDelta {
    Text(String),
    Transcript(String),
    Audio(Vec<i16>),
    Arguments(String),
}

/// Folds the server event stream into a [`ConversationState`].
///
/// One instance models exactly one conversation. The caller serializes
/// access by driving all transitions from a single consumption loop.
#[derive(Debug)]
pub struct Conversation {
    state: ConversationState,
    sample_rate: u32,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_sample_rate(DEFAULT_SAMPLE_RATE)
    }

    /// Use a non-default PCM sample rate for truncation and speech-slice
    /// math.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            state: ConversationState::new(),
            sample_rate,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.state.item(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.state.items()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drop all conversation history and queued buffers.
    pub fn clear(&mut self) {
        self.state.clear();
    }

    /// Stage captured input audio for the next user message item.
    pub fn queue_input_audio(&mut self, samples: Vec<i16>) {
        self.state.queued_input_audio = Some(samples);
    }

    /// Apply one server event.
    ///
    /// Returns `Ok(None)` for events that do not touch conversation state.
    pub fn apply(&mut self, event: &ServerEvent) -> Result<Option<ItemChange>> {
        self.apply_with_input_audio(event, None)
    }

    /// Apply one server event, supplying the captured input buffer so a
    /// speech-stopped event can slice the spoken segment out of it.
    pub fn apply_with_input_audio(
        &mut self,
        event: &ServerEvent,
        input_audio: Option<&[i16]>,
    ) -> Result<Option<ItemChange>> {
        let change = match event {
            ServerEvent::ItemCreated { item, .. } => self.item_created(item),
            ServerEvent::ItemTruncated {
                item_id,
                audio_end_ms,
                ..
            } => self.item_truncated(item_id, *audio_end_ms)?,
            ServerEvent::ItemDeleted { item_id } => self.item_deleted(item_id)?,
            ServerEvent::InputAudioTranscriptionCompleted {
                item_id,
                content_index,
                transcript,
            } => self.transcription_completed(item_id, *content_index, transcript),
            ServerEvent::SpeechStarted {
                item_id,
                audio_start_ms,
            } => self.speech_started(item_id, *audio_start_ms),
            ServerEvent::SpeechStopped {
                item_id,
                audio_end_ms,
            } => self.speech_stopped(item_id, *audio_end_ms, input_audio),
            ServerEvent::ResponseCreated { response } => self.response_created(response),
            ServerEvent::OutputItemAdded {
                response_id, item, ..
            } => self.output_item_added(response_id, &item.id)?,
            ServerEvent::OutputItemDone { item, .. } => self.output_item_done(item)?,
            ServerEvent::ContentPartAdded { item_id, part, .. } => {
                self.content_part_added(item_id, part)?
            }
            ServerEvent::ContentPartDone {
                item_id,
                content_index,
                part,
                ..
            } => self.content_part_done(item_id, *content_index, part)?,
            ServerEvent::TextDelta {
                item_id,
                content_index,
                delta,
                ..
            } => self.text_delta(item_id, *content_index, delta)?,
            ServerEvent::TextDone {
                item_id,
                content_index,
                text,
                ..
            } => self.text_done(item_id, *content_index, text)?,
            ServerEvent::AudioTranscriptDelta {
                item_id,
                content_index,
                delta,
                ..
            } => self.transcript_delta(item_id, *content_index, delta)?,
            ServerEvent::AudioTranscriptDone {
                item_id,
                content_index,
                transcript,
                ..
            } => self.transcript_done(item_id, *content_index, transcript)?,
            ServerEvent::AudioDelta { item_id, delta, .. } => self.audio_delta(item_id, delta)?,
            ServerEvent::AudioDone { item_id, .. } => self.audio_done(item_id)?,
            ServerEvent::FunctionCallArgumentsDelta { item_id, delta, .. } => {
                self.arguments_delta(item_id, delta)?
            }
            ServerEvent::FunctionCallArgumentsDone {
                item_id, arguments, ..
            } => self.arguments_done(item_id, arguments)?,
            _ => return Ok(None),
        };
        Ok(Some(change))
    }

    fn lookup_item_mut(&mut self, event_type: &'static str, item_id: &str) -> Result<&mut Item> {
        self.state
            .item_lookup
            .get_mut(item_id)
            .ok_or_else(|| ColloquyError::ItemNotFound {
                event_type,
                item_id: item_id.to_string(),
            })
    }

    fn item_created(&mut self, incoming: &Item) -> ItemChange {
        if let Some(existing) = self.state.item_lookup.get(&incoming.id) {
            // Re-assertion of an item we already track; only the first
            // creation registers it.
            return ItemChange::item(existing);
        }

        let mut item = incoming.clone();
        item.formatted = FormattedItem::default();

        if let Some(speech) = self.state.queued_speech.remove(&item.id) {
            item.formatted.audio = speech.audio;
        }

        for part in &item.content {
            if let Some(text) = part.text() {
                item.formatted.text.push_str(text);
            }
        }

        if let Some(transcript) = self.state.queued_transcripts.remove(&item.id) {
            item.formatted.transcript = transcript;
        }

        match item.kind {
            ItemKind::Message => {
                if item.role == Some(ItemRole::User) {
                    item.status = ItemStatus::Completed;
                    if let Some(samples) = self.state.queued_input_audio.take() {
                        item.formatted.audio = samples;
                    }
                } else {
                    item.status = ItemStatus::InProgress;
                }
            }
            ItemKind::FunctionCall => {
                item.formatted.tool = Some(FormattedTool {
                    name: item.name.clone().unwrap_or_default(),
                    call_id: item.call_id.clone().unwrap_or_default(),
                    arguments: String::new(),
                });
                item.status = ItemStatus::InProgress;
            }
            ItemKind::FunctionCallOutput => {
                item.status = ItemStatus::Completed;
                item.formatted.output = item.output.clone();
            }
        }

        debug!(item_id = %item.id, kind = %item.kind, "item created");
        self.state.item_order.push(item.id.clone());
        let change = ItemChange::item(&item);
        self.state.item_lookup.insert(item.id.clone(), item);
        change
    }

    fn item_truncated(&mut self, item_id: &str, audio_end_ms: u64) -> Result<ItemChange> {
        let sample_rate = self.sample_rate as u64;
        let item = self.lookup_item_mut("conversation.item.truncated", item_id)?;
        let end_index = (audio_end_ms * sample_rate / 1000) as usize;
        item.formatted.transcript.clear();
        item.formatted.audio.truncate(end_index);
        item.status = ItemStatus::Truncated;
        Ok(ItemChange::item(item))
    }

    fn item_deleted(&mut self, item_id: &str) -> Result<ItemChange> {
        let item = self.state.item_lookup.remove(item_id).ok_or_else(|| {
            ColloquyError::ItemNotFound {
                event_type: "conversation.item.deleted",
                item_id: item_id.to_string(),
            }
        })?;
        self.state.item_order.retain(|id| id != item_id);
        Ok(ItemChange {
            item: Some(item),
            delta: None,
        })
    }

    fn transcription_completed(
        &mut self,
        item_id: &str,
        content_index: usize,
        transcript: &str,
    ) -> ItemChange {
        match self.state.item_lookup.get_mut(item_id) {
            Some(item) => {
                if let Some(part) = item.content.get_mut(content_index) {
                    part.set_transcript(transcript);
                }
                item.formatted.transcript = transcript.to_string();
                ItemChange::with_delta(item, ItemDelta::Transcript(transcript.to_string()))
            }
            None => {
                // Input transcription can outrace the item it belongs to.
                self.state
                    .queued_transcripts
                    .insert(item_id.to_string(), transcript.to_string());
                ItemChange::default()
            }
        }
    }

    fn speech_started(&mut self, item_id: &str, audio_start_ms: u64) -> ItemChange {
        self.state.queued_speech.insert(
            item_id.to_string(),
            QueuedSpeech {
                audio_start_ms,
                audio_end_ms: None,
                audio: Vec::new(),
            },
        );
        ItemChange::default()
    }

    fn speech_stopped(
        &mut self,
        item_id: &str,
        audio_end_ms: u64,
        input_audio: Option<&[i16]>,
    ) -> ItemChange {
        let sample_rate = self.sample_rate as u64;
        let speech = self
            .state
            .queued_speech
            .entry(item_id.to_string())
            .or_insert_with(|| QueuedSpeech {
                // Stop without a matching start: an empty segment.
                audio_start_ms: audio_end_ms,
                audio_end_ms: None,
                audio: Vec::new(),
            });
        speech.audio_end_ms = Some(audio_end_ms);
        if let Some(buffer) = input_audio {
            let end = ((audio_end_ms * sample_rate / 1000) as usize).min(buffer.len());
            let start = ((speech.audio_start_ms * sample_rate / 1000) as usize).min(end);
            speech.audio = buffer[start..end].to_vec();
        }
        ItemChange::default()
    }

    fn response_created(&mut self, payload: &ResponsePayload) -> ItemChange {
        if !self.state.response_lookup.contains_key(&payload.id) {
            self.state.response_order.push(payload.id.clone());
            self.state.response_lookup.insert(
                payload.id.clone(),
                Response {
                    id: payload.id.clone(),
                    payload: payload.clone(),
                    output: Vec::new(),
                },
            );
        }
        ItemChange::default()
    }

    fn output_item_added(&mut self, response_id: &str, item_id: &str) -> Result<ItemChange> {
        let response = self.state.response_lookup.get_mut(response_id).ok_or_else(|| {
            ColloquyError::ResponseNotFound {
                event_type: "response.output_item.added",
                response_id: response_id.to_string(),
            }
        })?;
        response.output.push(item_id.to_string());
        Ok(ItemChange::default())
    }

    fn output_item_done(&mut self, incoming: &Item) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.output_item.done", &incoming.id)?;
        item.status = incoming.status;
        Ok(ItemChange::item(item))
    }

    fn content_part_added(&mut self, item_id: &str, part: &ContentPart) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.content_part.added", item_id)?;
        item.content.push(part.clone());
        Ok(ItemChange::item(item))
    }

    fn content_part_done(
        &mut self,
        item_id: &str,
        content_index: usize,
        part: &ContentPart,
    ) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.content_part.done", item_id)?;
        if let Some(slot) = item.content.get_mut(content_index) {
            *slot = part.clone();
        }
        Ok(ItemChange::item(item))
    }

    fn text_delta(&mut self, item_id: &str, content_index: usize, delta: &str) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.text.delta", item_id)?;
        if let Some(part) = item.content.get_mut(content_index) {
            part.push_text(delta);
        }
        item.formatted.text.push_str(delta);
        Ok(ItemChange::with_delta(
            item,
            ItemDelta::Text(delta.to_string()),
        ))
    }

    fn text_done(&mut self, item_id: &str, content_index: usize, text: &str) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.text.done", item_id)?;
        if let Some(part) = item.content.get_mut(content_index) {
            part.set_text(text);
        }
        item.formatted.text = text.to_string();
        Ok(ItemChange::item(item))
    }

    fn transcript_delta(
        &mut self,
        item_id: &str,
        content_index: usize,
        delta: &str,
    ) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.audio_transcript.delta", item_id)?;
        if let Some(part) = item.content.get_mut(content_index) {
            let updated = match part.transcript() {
                Some(existing) => format!("{existing}{delta}"),
                None => delta.to_string(),
            };
            part.set_transcript(&updated);
        }
        item.formatted.transcript.push_str(delta);
        Ok(ItemChange::with_delta(
            item,
            ItemDelta::Transcript(delta.to_string()),
        ))
    }

    fn transcript_done(
        &mut self,
        item_id: &str,
        content_index: usize,
        transcript: &str,
    ) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.audio_transcript.done", item_id)?;
        if let Some(part) = item.content.get_mut(content_index) {
            part.set_transcript(transcript);
        }
        item.formatted.transcript = transcript.to_string();
        Ok(ItemChange::item(item))
    }

    fn audio_delta(&mut self, item_id: &str, delta: &str) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.audio.delta", item_id)?;
        let samples = audio::decode_pcm16(delta)?;
        audio::merge_samples(&mut item.formatted.audio, &samples);
        Ok(ItemChange::with_delta(item, ItemDelta::Audio(samples)))
    }

    fn audio_done(&mut self, item_id: &str) -> Result<ItemChange> {
        // Audio is already accumulated from the deltas; this only
        // re-asserts the item.
        let item = self.lookup_item_mut("response.audio.done", item_id)?;
        Ok(ItemChange::item(item))
    }

    fn arguments_delta(&mut self, item_id: &str, delta: &str) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.function_call_arguments.delta", item_id)?;
        if let Some(tool) = item.formatted.tool.as_mut() {
            tool.arguments.push_str(delta);
        }
        match item.arguments.as_mut() {
            Some(arguments) => arguments.push_str(delta),
            None => item.arguments = Some(delta.to_string()),
        }
        Ok(ItemChange::with_delta(
            item,
            ItemDelta::Arguments(delta.to_string()),
        ))
    }

    fn arguments_done(&mut self, item_id: &str, arguments: &str) -> Result<ItemChange> {
        let item = self.lookup_item_mut("response.function_call_arguments.done", item_id)?;
        if let Some(tool) = item.formatted.tool.as_mut() {
            tool.arguments = arguments.to_string();
        }
        item.arguments = Some(arguments.to_string());
        Ok(ItemChange::item(item))
    }
}
