//! Realtime client: event bus, conversation, and transport glue.

use std::time::Duration;

use tracing::debug;

use crate::audio;
use crate::bus::EventBus;
use crate::conversation::{Conversation, Item, ItemChange};
use crate::error::{ColloquyError, Result};
use crate::events::{ClientEvent, RealtimeEvent, ServerEvent};
use crate::util::generate_id;

use super::config::SessionConfig;
use super::transport::RealtimeTransport;

/// Length of generated wire event ids, prefix included.
const EVENT_ID_LENGTH: usize = 21;

/// Outcome of consuming one inbound server event.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub event: ServerEvent,
    /// What the event changed in the conversation, when it was a
    /// conversation-affecting event.
    pub change: Option<ItemChange>,
}

/// High-level realtime conversation client.
///
/// Inbound server events are published on the bus under `server.<type>`
/// and `server.*`, then folded into the conversation; outbound client
/// events are stamped with a generated id, published under
/// `client.<type>` and `client.*`, and framed out. Drive it by calling
/// [`RealtimeClient::step`] in a loop; the conversation assumes at most
/// one in-flight step at a time, which `&mut self` enforces.
pub struct RealtimeClient {
    config: SessionConfig,
    bus: EventBus<RealtimeEvent>,
    conversation: Conversation,
    transport: Option<RealtimeTransport>,
    input_audio_buffer: Vec<i16>,
}

impl RealtimeClient {
    pub fn new(config: SessionConfig) -> Self {
        let conversation = Conversation::with_sample_rate(config.sample_rate);
        Self {
            config,
            bus: EventBus::new(),
            conversation,
            transport: None,
            input_audio_buffer: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The event bus. Clone it to subscribe or wait from other tasks.
    pub fn bus(&self) -> &EventBus<RealtimeEvent> {
        &self.bus
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.conversation.item(id)
    }

    pub fn items(&self) -> Vec<&Item> {
        self.conversation.items().collect()
    }

    /// Connect the underlying transport.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(ColloquyError::InvalidState(
                "Realtime client is already connected".into(),
            ));
        }
        self.transport = Some(RealtimeTransport::connect(&self.config).await?);
        Ok(())
    }

    /// Close the transport, keeping the conversation as-is.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// Drop every listener and all conversation state.
    pub fn reset(&mut self) {
        self.bus.clear();
        self.conversation.clear();
        self.input_audio_buffer.clear();
    }

    /// Consume and reconcile the next inbound server event.
    ///
    /// Returns `Ok(None)` once the connection has ended. Decode failures
    /// from the transport surface here so the driver can decide whether
    /// to log, skip, or terminate.
    pub async fn step(&mut self) -> Result<Option<StepOutcome>> {
        let transport = self.transport.as_mut().ok_or_else(|| {
            ColloquyError::InvalidState("Realtime client is not connected".into())
        })?;
        let inbound = match transport.next_event().await {
            Some(inbound) => inbound,
            None => {
                self.transport = None;
                return Ok(None);
            }
        };
        let event = inbound?;
        let change = self.handle_server_event(event.clone()).await?;
        Ok(Some(StepOutcome { event, change }))
    }

    /// Dispatch and reconcile one already-decoded server event.
    pub async fn handle_server_event(&mut self, event: ServerEvent) -> Result<Option<ItemChange>> {
        let channel = format!("server.{}", event.event_type());
        self.bus
            .dispatch(&channel, RealtimeEvent::Server(event.clone()))
            .await?;
        self.bus
            .dispatch("server.*", RealtimeEvent::Server(event.clone()))
            .await?;
        let input_audio = if self.input_audio_buffer.is_empty() {
            None
        } else {
            Some(self.input_audio_buffer.as_slice())
        };
        self.conversation.apply_with_input_audio(&event, input_audio)
    }

    /// Send a client event: stamp an id, publish on `client.<type>` and
    /// `client.*`, then frame it out. Returns the stamped event id.
    pub async fn send(&mut self, event: ClientEvent) -> Result<String> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            ColloquyError::InvalidState("Realtime client is not connected".into())
        })?;
        let event_id = generate_id("evt_", EVENT_ID_LENGTH);
        let payload = event.to_wire(&event_id)?;

        let channel = format!("client.{}", event.event_type());
        self.bus
            .dispatch(&channel, RealtimeEvent::Client(event.clone()))
            .await?;
        self.bus
            .dispatch("client.*", RealtimeEvent::Client(event))
            .await?;

        transport.send_payload(&payload)?;
        debug!(event_id = %event_id, "client event sent");
        Ok(event_id)
    }

    /// Append captured audio to the pending input buffer and stream it
    /// out to the server.
    pub async fn append_input_audio(&mut self, samples: &[i16]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let encoded = audio::encode_pcm16(samples);
        self.send(ClientEvent::InputAudioBufferAppend { audio: encoded })
            .await?;
        audio::merge_samples(&mut self.input_audio_buffer, samples);
        Ok(())
    }

    /// Commit the pending input buffer; the staged samples attach to the
    /// next user message item the server creates.
    pub async fn commit_input_audio(&mut self) -> Result<()> {
        if self.input_audio_buffer.is_empty() {
            return Err(ColloquyError::InvalidState(
                "Input audio buffer is empty".into(),
            ));
        }
        self.send(ClientEvent::InputAudioBufferCommit).await?;
        let buffered = std::mem::take(&mut self.input_audio_buffer);
        self.conversation.queue_input_audio(buffered);
        Ok(())
    }

    /// Ask the server to start generating a response.
    pub async fn create_response(&mut self) -> Result<String> {
        self.send(ClientEvent::ResponseCreate { response: None })
            .await
    }

    /// Wait for the next occurrence of `name` on the bus.
    pub async fn wait_for_next(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Option<RealtimeEvent> {
        self.bus.wait_for_next(name, timeout).await
    }
}
