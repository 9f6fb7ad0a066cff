//! Colloquy: realtime conversation client for Rust.
//!
//! Maintains a consistent, incrementally-updated view of a bidirectional
//! realtime conversation (text, audio, and tool calls) exchanged over a
//! persistent websocket stream: a typed wire event model, a
//! publish/subscribe event bus with one-shot and wait-for-next semantics,
//! and a reconciliation engine that folds out-of-order
//! creation/delta/completion events into a single transcript, where audio
//! and transcript fragments may arrive before the item they belong to
//! exists.
//!
//! # Quick Start
//!
//! ```no_run
//! use colloquy::prelude::*;
//!
//! # async fn example() -> colloquy::error::Result<()> {
//! let mut client = RealtimeClient::new(SessionConfig::from_env());
//! client.connect().await?;
//! client.create_response().await?;
//! while let Some(outcome) = client.step().await? {
//!     if let Some(change) = outcome.change {
//!         println!("changed: {:?}", change.item.map(|item| item.id));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod bus;
pub mod conversation;
pub mod error;
pub mod events;
pub mod prelude;
pub mod relay;
pub mod session;
pub mod util;
