//! Convenience re-exports for common use.

pub use crate::bus::{EventBus, ListenerId};
pub use crate::conversation::{
    ContentPart, Conversation, ConversationState, Item, ItemChange, ItemDelta, ItemKind, ItemRole,
    ItemStatus,
};
pub use crate::error::{ColloquyError, Result};
pub use crate::events::{ClientEvent, EventRegistry, RealtimeEvent, ServerEvent};
pub use crate::session::{RealtimeClient, SessionConfig, StepOutcome};
