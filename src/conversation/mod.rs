//! Conversation state and the reconciliation engine.

pub mod engine;
pub mod item;
pub mod state;

pub use engine::{Conversation, ItemChange, ItemDelta, DEFAULT_SAMPLE_RATE};
pub use item::{ContentPart, FormattedItem, FormattedTool, Item, ItemKind, ItemRole, ItemStatus};
pub use state::{ConversationState, QueuedSpeech, Response};
