//! Conversation item model.

use serde::{Deserialize, Serialize};
use strum::Display;

/// What a conversation item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemKind {
    Message,
    FunctionCall,
    FunctionCallOutput,
}

/// Speaker role of a message item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemRole {
    User,
    Assistant,
    System,
}

/// Item lifecycle status.
///
/// `Incomplete` only ever arrives from the wire (an aborted generation);
/// the reconciliation engine itself assigns the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    InProgress,
    Completed,
    Incomplete,
    Truncated,
}

/// One content part of an item, as received on the wire.
///
/// Payloads are opaque to the engine beyond the type tag and the text and
/// transcript fields it folds into the formatted view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    InputText {
        text: String,
    },
    InputAudio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
}

impl ContentPart {
    /// Text carried by `text` / `input_text` parts.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::InputText { text } => Some(text),
            _ => None,
        }
    }

    /// Transcript carried by audio parts.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Self::InputAudio { transcript, .. } | Self::Audio { transcript, .. } => {
                transcript.as_deref()
            }
            _ => None,
        }
    }

    pub(crate) fn push_text(&mut self, delta: &str) {
        if let Self::Text { text } | Self::InputText { text } = self {
            text.push_str(delta);
        }
    }

    pub(crate) fn set_text(&mut self, value: &str) {
        if let Self::Text { text } | Self::InputText { text } = self {
            *text = value.to_string();
        }
    }

    pub(crate) fn set_transcript(&mut self, value: &str) {
        if let Self::InputAudio { transcript, .. } | Self::Audio { transcript, .. } = self {
            *transcript = Some(value.to_string());
        }
    }
}

/// Derived view of an item, assembled by the reconciliation engine.
///
/// `audio` holds decoded little-endian PCM16 samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedItem {
    pub audio: Vec<i16>,
    pub text: String,
    pub transcript: String,
    pub tool: Option<FormattedTool>,
    pub output: Option<String>,
}

/// Tool invocation assembled from a `function_call` item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedTool {
    pub name: String,
    pub call_id: String,
    pub arguments: String,
}

/// One turn or tool interaction in the conversation.
///
/// The serialized shape matches the wire item exactly; `formatted` exists
/// only in memory and is rebuilt by the engine on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ItemRole>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip)]
    pub formatted: FormattedItem,
}

impl Item {
    /// Build a user message item from content parts (for
    /// `conversation.item.create`).
    pub fn user_message(id: impl Into<String>, content: Vec<ContentPart>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Message,
            role: Some(ItemRole::User),
            status: ItemStatus::Completed,
            content,
            name: None,
            call_id: None,
            arguments: None,
            output: None,
            formatted: FormattedItem::default(),
        }
    }
}
