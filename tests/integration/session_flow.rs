//! Typed conversation, replay and lifecycle through the session handle.

use crate::helpers::{drain_events, instant_config, spawn_kiosk};
use kiosk::audio::playback::PlaybackState;
use kiosk::config::KIOSK_GREETING;
use kiosk::conversation::MessageKind;
use kiosk::pipeline::messages::SynthesisEvent;
use kiosk::runtime::{Capabilities, StatusNotice};
use kiosk::{KioskConfig, KioskError, RuntimeEvent, SubmitOutcome};
use std::time::Duration;

#[tokio::test]
async fn capabilities_are_reported_first() {
    let mut kiosk = spawn_kiosk(instant_config());
    let first = kiosk.events.recv().await.unwrap();
    assert_eq!(
        first,
        RuntimeEvent::Capabilities(Capabilities {
            speech_recognition: true,
            speech_synthesis: true,
        })
    );
    kiosk.stop().await;
}

#[tokio::test]
async fn typed_destination_gets_spoken_reply() {
    let mut config = instant_config();
    config.conversation.greeting = Some(KIOSK_GREETING.to_owned());
    let mut kiosk = spawn_kiosk(config);

    let outcome = kiosk.handle.submit_typed("Batu Ferringhi").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Accepted(_)));

    let state = kiosk.settled(3).await;
    let kinds: Vec<_> = state.messages.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, [MessageKind::Bot, MessageKind::User, MessageKind::Bot]);
    assert_eq!(state.messages[0].text, KIOSK_GREETING);
    assert_eq!(state.messages[1].text, "Batu Ferringhi");
    assert_eq!(
        state.messages[2].text,
        "I'll help you find the best route to Batu Ferringhi. Please check the map for directions."
    );

    let (utterance, _) = kiosk.next_utterance().await;
    assert_eq!(utterance.text, state.messages[2].text);
    assert_eq!(utterance.voice.map(|v| v.name).as_deref(), Some("Network"));
    kiosk.stop().await;
}

#[tokio::test(start_paused = true)]
async fn placeholder_shows_until_reply_latency_elapses() {
    let mut kiosk = spawn_kiosk(KioskConfig::default());
    let started = tokio::time::Instant::now();
    kiosk.handle.submit_typed("Komtar").await.unwrap();

    let pending = kiosk.handle.render_state().await.unwrap();
    assert!(pending.awaiting_reply);
    let kinds: Vec<_> = pending.messages.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, [MessageKind::User, MessageKind::TypingPlaceholder]);

    let state = kiosk.settled(2).await;
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(state.messages[1].kind, MessageKind::Bot);
    assert!(state.messages.iter().all(|m| m.kind != MessageKind::TypingPlaceholder));
    kiosk.stop().await;
}

#[tokio::test]
async fn conversation_alternates_over_many_rounds() {
    let mut kiosk = spawn_kiosk(instant_config());
    let places = ["Komtar", "Penang Hill", "Kek Lok Si", "Gurney Drive"];
    for (round, place) in places.iter().enumerate() {
        kiosk.handle.submit_typed(*place).await.unwrap();
        kiosk.settled(2 * (round + 1)).await;
    }

    let state = kiosk.handle.render_state().await.unwrap();
    assert_eq!(state.messages.len(), 2 * places.len());
    for pair in state.messages.chunks(2) {
        assert_eq!(pair[0].kind, MessageKind::User);
        assert_eq!(pair[1].kind, MessageKind::Bot);
        assert!(pair[1].text.contains(&pair[0].text));
    }
    kiosk.stop().await;
}

#[tokio::test]
async fn whitespace_submission_is_ignored() {
    let kiosk = spawn_kiosk(instant_config());
    let outcome = kiosk.handle.submit_typed("   ").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Ignored(_)));
    assert!(kiosk.handle.render_state().await.unwrap().messages.is_empty());
    kiosk.stop().await;
}

#[tokio::test]
async fn replay_reads_an_earlier_reply_again() {
    let mut kiosk = spawn_kiosk(instant_config());
    kiosk.handle.submit_typed("Komtar").await.unwrap();
    kiosk.settled(2).await;
    kiosk.handle.submit_typed("Penang Hill").await.unwrap();
    let state = kiosk.settled(4).await;

    let (first, _) = kiosk.next_utterance().await;
    let (second, second_sink) = kiosk.next_utterance().await;
    assert_eq!(first.text, state.messages[1].text);
    assert_eq!(second.text, state.messages[3].text);

    kiosk.handle.replay_message(state.messages[1].id).await.unwrap();
    let (replayed, replay_sink) = kiosk.next_utterance().await;
    assert_eq!(replayed.text, state.messages[1].text);

    // The superseded playback no longer drives the speech state.
    second_sink.emit(SynthesisEvent::Ended);
    replay_sink.emit(SynthesisEvent::Started);
    kiosk
        .wait_for(|e| {
            *e == RuntimeEvent::SpeechStateChanged {
                state: PlaybackState::Speaking,
            }
        })
        .await;
    let state_now = kiosk.handle.render_state().await.unwrap();
    assert_eq!(state_now.speech_state, PlaybackState::Speaking);
    assert_eq!(state_now.speech_text.as_deref(), Some(state.messages[1].text.as_str()));
    kiosk.stop().await;
}

#[tokio::test]
async fn replaying_a_user_message_is_rejected() {
    let mut kiosk = spawn_kiosk(instant_config());
    kiosk.handle.submit_typed("Komtar").await.unwrap();
    let state = kiosk.settled(2).await;
    let err = kiosk
        .handle
        .replay_message(state.messages[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, KioskError::NotReplayable(_)));
    kiosk.stop().await;
}

#[tokio::test]
async fn synthesis_failure_is_reported_and_session_continues() {
    let mut kiosk = spawn_kiosk(instant_config());
    kiosk.handle.submit_typed("Komtar").await.unwrap();
    kiosk.settled(2).await;
    let (_, sink) = kiosk.next_utterance().await;
    sink.emit(SynthesisEvent::Failed {
        reason: "audio-busy".into(),
    });
    kiosk
        .wait_for(|e| matches!(e, RuntimeEvent::Status(StatusNotice::SynthesisFailed { .. })))
        .await;

    kiosk.handle.submit_typed("Penang Hill").await.unwrap();
    let state = kiosk.settled(4).await;
    assert_eq!(state.messages.len(), 4);
    kiosk.stop().await;
}

#[tokio::test]
async fn render_state_serializes_for_the_panel() {
    let mut kiosk = spawn_kiosk(instant_config());
    kiosk.handle.submit_typed("Komtar").await.unwrap();
    let state = kiosk.settled(2).await;

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["messages"][0]["kind"], "user");
    assert_eq!(json["messages"][1]["kind"], "bot");
    assert_eq!(json["awaiting_reply"], false);
    kiosk.stop().await;
}

#[tokio::test]
async fn shutdown_stops_the_event_loop() {
    let mut kiosk = spawn_kiosk(instant_config());
    kiosk.handle.submit_typed("Komtar").await.unwrap();
    kiosk.settled(2).await;
    drain_events(&mut kiosk.events);

    let handle = kiosk.handle.clone();
    kiosk.stop().await;
    let err = handle.render_state().await.unwrap_err();
    assert!(matches!(err, KioskError::Channel(_)));
}
