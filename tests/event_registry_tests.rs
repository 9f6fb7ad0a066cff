//! Tests for the wire-event decode registry.

use colloquy::conversation::{ItemKind, ItemRole};
use colloquy::error::ColloquyError;
use colloquy::events::{EventRegistry, ServerEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn constructs_item_created_from_a_raw_mapping() {
    let registry = EventRegistry::new();
    let raw = json!({
        "event_id": "event_345",
        "type": "conversation.item.created",
        "previous_item_id": null,
        "item": {
            "id": "msg_001",
            "type": "message",
            "status": "completed",
            "role": "user",
            "content": [{"type": "input_text", "text": "Hello, how are you?"}],
        },
    });

    let event = registry.construct(raw).expect("construct should succeed");
    let ServerEvent::ItemCreated { item, .. } = event else {
        panic!("expected conversation.item.created, got {event:?}");
    };
    assert_eq!(item.id, "msg_001");
    assert_eq!(item.kind, ItemKind::Message);
    assert_eq!(item.role, Some(ItemRole::User));
    assert_eq!(item.content[0].text(), Some("Hello, how are you?"));
}

#[test]
fn constructs_a_delta_event_with_its_fields() {
    let registry = EventRegistry::new();
    let raw = json!({
        "event_id": "event_890",
        "type": "response.text.delta",
        "response_id": "resp_001",
        "item_id": "msg_007",
        "output_index": 0,
        "content_index": 0,
        "delta": "Sure, I can",
    });

    let event = registry.construct(raw).expect("construct should succeed");
    assert_eq!(
        event,
        ServerEvent::TextDelta {
            response_id: "resp_001".into(),
            item_id: "msg_007".into(),
            output_index: 0,
            content_index: 0,
            delta: "Sure, I can".into(),
        }
    );
}

#[test]
fn unknown_type_tag_is_rejected_before_decode() {
    let registry = EventRegistry::new();
    let error = registry
        .construct(json!({"type": "conversation.item.exploded"}))
        .expect_err("construct should fail");
    assert!(matches!(
        error,
        ColloquyError::UnknownEventType(tag) if tag == "conversation.item.exploded"
    ));
}

#[test]
fn missing_type_tag_is_rejected() {
    let registry = EventRegistry::new();
    let error = registry
        .construct(json!({"event_id": "event_1"}))
        .expect_err("construct should fail");
    assert!(matches!(error, ColloquyError::UnknownEventType(_)));
}

#[test]
fn malformed_body_for_a_known_tag_fails_as_serialization() {
    let registry = EventRegistry::new();
    let error = registry
        .construct(json!({"type": "conversation.item.truncated"}))
        .expect_err("construct should fail");
    assert!(matches!(error, ColloquyError::Serialization(_)));
}

#[test]
fn registered_tags_round_trip_through_serialization() {
    let registry = EventRegistry::new();
    let samples = vec![
        ServerEvent::SessionCreated {
            session: json!({"id": "sess_1"}),
        },
        ServerEvent::ItemDeleted {
            item_id: "msg_1".into(),
        },
        ServerEvent::SpeechStarted {
            audio_start_ms: 10,
            item_id: "msg_2".into(),
        },
        ServerEvent::AudioDone {
            response_id: "resp_1".into(),
            item_id: "msg_3".into(),
            output_index: 0,
            content_index: 0,
        },
        ServerEvent::FunctionCallArgumentsDone {
            response_id: "resp_1".into(),
            item_id: "msg_4".into(),
            output_index: 0,
            call_id: "call_1".into(),
            arguments: "{}".into(),
        },
        ServerEvent::InputAudioBufferCleared,
        ServerEvent::RateLimitsUpdated {
            rate_limits: vec![json!({"name": "requests", "limit": 1000})],
        },
    ];

    for event in samples {
        let serialized = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(
            serialized["type"].as_str(),
            Some(event.event_type()),
            "serialized tag should match event_type() for {event:?}"
        );
        assert!(registry.contains(event.event_type()));
        let reconstructed = registry
            .construct(serialized)
            .expect("serialized event should reconstruct");
        assert_eq!(reconstructed, event);
    }
}

#[test]
fn registry_exposes_the_full_tag_table() {
    let registry = EventRegistry::new();
    let types = registry.types();
    assert_eq!(types.len(), 27);
    assert!(types.contains(&"conversation.item.created"));
    assert!(types.contains(&"response.audio.delta"));
    assert!(types.contains(&"input_audio_buffer.speech_stopped"));
    assert!(!registry.contains("client.only.event"));
}
