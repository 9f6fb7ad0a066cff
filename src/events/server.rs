//! Typed server events on the realtime wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::item::{ContentPart, Item};

/// Error detail payload attached to `error` and transcription-failed
/// events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A server generation unit. Everything beyond the id is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub id: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// Server-originated events, tagged by their wire `type`.
///
/// Unknown fields (`event_id`, indices the engine does not use) are
/// ignored during decode; [`crate::events::registry::EventRegistry`]
/// rejects unknown type tags before decode is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ErrorPayload },

    #[serde(rename = "session.created")]
    SessionCreated { session: Value },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: Value },

    #[serde(rename = "conversation.item.created")]
    ItemCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: Item,
    },

    #[serde(rename = "conversation.item.truncated")]
    ItemTruncated {
        item_id: String,
        content_index: usize,
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.deleted")]
    ItemDeleted { item_id: String },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        item_id: String,
        content_index: usize,
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputAudioTranscriptionFailed {
        item_id: String,
        content_index: usize,
        error: ErrorPayload,
    },

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item_id: String,
    },

    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared,

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted { audio_start_ms: u64, item_id: String },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped { audio_end_ms: u64, item_id: String },

    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponsePayload },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponsePayload },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        response_id: String,
        output_index: usize,
        item: Item,
    },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        response_id: String,
        output_index: usize,
        item: Item,
    },

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: ContentPart,
    },

    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: ContentPart,
    },

    #[serde(rename = "response.text.delta")]
    TextDelta {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        delta: String,
    },

    #[serde(rename = "response.text.done")]
    TextDone {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        text: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        transcript: String,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
        /// Base64-encoded little-endian PCM16.
        delta: String,
    },

    #[serde(rename = "response.audio.done")]
    AudioDone {
        response_id: String,
        item_id: String,
        output_index: usize,
        content_index: usize,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        response_id: String,
        item_id: String,
        output_index: usize,
        call_id: String,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        response_id: String,
        item_id: String,
        output_index: usize,
        call_id: String,
        arguments: String,
    },

    #[serde(rename = "rate_limits_updated")]
    RateLimitsUpdated { rate_limits: Vec<Value> },
}

impl ServerEvent {
    /// Every wire type tag this crate can decode, in declaration order.
    pub const TYPES: &'static [&'static str] = &[
        "error",
        "session.created",
        "session.updated",
        "conversation.item.created",
        "conversation.item.truncated",
        "conversation.item.deleted",
        "conversation.item.input_audio_transcription.completed",
        "conversation.item.input_audio_transcription.failed",
        "input_audio_buffer.committed",
        "input_audio_buffer.cleared",
        "input_audio_buffer.speech_started",
        "input_audio_buffer.speech_stopped",
        "response.created",
        "response.done",
        "response.output_item.added",
        "response.output_item.done",
        "response.content_part.added",
        "response.content_part.done",
        "response.text.delta",
        "response.text.done",
        "response.audio_transcript.delta",
        "response.audio_transcript.done",
        "response.audio.delta",
        "response.audio.done",
        "response.function_call_arguments.delta",
        "response.function_call_arguments.done",
        "rate_limits_updated",
    ];

    /// The wire `type` tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::ItemCreated { .. } => "conversation.item.created",
            Self::ItemTruncated { .. } => "conversation.item.truncated",
            Self::ItemDeleted { .. } => "conversation.item.deleted",
            Self::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputAudioTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::InputAudioBufferCleared => "input_audio_buffer.cleared",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::OutputItemDone { .. } => "response.output_item.done",
            Self::ContentPartAdded { .. } => "response.content_part.added",
            Self::ContentPartDone { .. } => "response.content_part.done",
            Self::TextDelta { .. } => "response.text.delta",
            Self::TextDone { .. } => "response.text.done",
            Self::AudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::AudioTranscriptDone { .. } => "response.audio_transcript.done",
            Self::AudioDelta { .. } => "response.audio.delta",
            Self::AudioDone { .. } => "response.audio.done",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::RateLimitsUpdated { .. } => "rate_limits_updated",
        }
    }
}
