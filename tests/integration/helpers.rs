//! Shared helpers for integration tests.

use kiosk::audio::capture::{ChannelRecognizer, RecognitionSink, RecognizerCommand};
use kiosk::audio::playback::{
    ChannelSynthesizer, PlaybackSink, SynthesizerCommand, Utterance, Voice,
};
use kiosk::reply::RouteReplyResolver;
use kiosk::{KioskConfig, RenderState, RuntimeEvent, SessionController, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

/// A running session plus the platform side of both speech bridges.
pub(crate) struct Kiosk {
    pub handle: SessionHandle,
    pub events: broadcast::Receiver<RuntimeEvent>,
    pub recognizer: mpsc::UnboundedReceiver<RecognizerCommand>,
    pub synthesizer: mpsc::UnboundedReceiver<SynthesizerCommand>,
    pub session: JoinHandle<kiosk::Result<()>>,
}

/// Config with instant replies and no greeting.
pub(crate) fn instant_config() -> KioskConfig {
    let mut config = KioskConfig::default();
    config.reply.latency_ms = 0;
    config
}

pub(crate) fn voices() -> Vec<Voice> {
    vec![
        Voice {
            name: "Local".into(),
            lang: "en-US".into(),
            local_service: true,
        },
        Voice {
            name: "Network".into(),
            lang: "en-US".into(),
            local_service: false,
        },
    ]
}

/// Start a session with both speech devices attached.
pub(crate) fn spawn_kiosk(config: KioskConfig) -> Kiosk {
    let (recognizer, recognizer_rx) = ChannelRecognizer::new();
    let (synthesizer, synthesizer_rx) = ChannelSynthesizer::new(voices());
    let resolver = Arc::new(RouteReplyResolver::from_config(&config.reply));
    let controller = SessionController::new(config, resolver)
        .with_recognizer(recognizer)
        .with_synthesizer(synthesizer);
    let handle = controller.handle();
    let events = controller.subscribe();
    let session = tokio::spawn(controller.run());
    Kiosk {
        handle,
        events,
        recognizer: recognizer_rx,
        synthesizer: synthesizer_rx,
        session,
    }
}

impl Kiosk {
    /// Sink handed to the recognizer by the next `Start` command.
    pub(crate) async fn recognition_sink(&mut self) -> RecognitionSink {
        loop {
            let command = tokio::time::timeout(WAIT, self.recognizer.recv())
                .await
                .expect("recognizer start timed out")
                .expect("recognizer bridge closed");
            if let RecognizerCommand::Start { sink, .. } = command {
                return sink;
            }
        }
    }

    /// Next utterance handed to the synthesizer, skipping cancels.
    pub(crate) async fn next_utterance(&mut self) -> (Utterance, PlaybackSink) {
        loop {
            let command = tokio::time::timeout(WAIT, self.synthesizer.recv())
                .await
                .expect("speech request timed out")
                .expect("synthesizer bridge closed");
            if let SynthesizerCommand::Speak { utterance, sink } = command {
                return (utterance, sink);
            }
        }
    }

    /// Wait for the first runtime event matching `pred`.
    pub(crate) async fn wait_for(&mut self, pred: impl Fn(&RuntimeEvent) -> bool) -> RuntimeEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.expect("runtime events closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("runtime event timed out")
    }

    /// Wait until the log holds `count` messages and no reply is pending.
    pub(crate) async fn settled(&mut self, count: usize) -> RenderState {
        tokio::time::timeout(WAIT, async {
            loop {
                let state = self.handle.render_state().await.expect("render state");
                if !state.awaiting_reply && state.messages.len() >= count {
                    return state;
                }
                self.events.recv().await.expect("runtime events closed");
            }
        })
        .await
        .expect("session never settled")
    }

    pub(crate) async fn stop(self) {
        self.handle.shutdown();
        self.session
            .await
            .expect("session task panicked")
            .expect("session loop failed");
    }
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}
