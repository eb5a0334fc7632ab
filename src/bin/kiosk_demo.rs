//! Scripted kiosk session for trying the controller without a browser.
//!
//! Scripted bridges stand in for the platform speech devices: the recognizer
//! "hears" a fixed phrase and the synthesizer pretends to read each reply.

use clap::Parser;
use kiosk::audio::capture::{ChannelRecognizer, RecognizerCommand};
use kiosk::audio::playback::{ChannelSynthesizer, SynthesizerCommand, Voice};
use kiosk::config::KIOSK_GREETING;
use kiosk::conversation::MessageKind;
use kiosk::pipeline::messages::{RecognitionEvent, SynthesisEvent};
use kiosk::reply::RouteReplyResolver;
use kiosk::runtime::StatusNotice;
use kiosk::{KioskConfig, RuntimeEvent, SessionController, SessionHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Run one scripted visitor conversation and print the final chat state.
#[derive(Parser)]
#[command(name = "kiosk-demo", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination typed into the input field.
    #[arg(long, default_value = "Batu Ferringhi")]
    typed: String,

    /// Destination spoken into the microphone.
    #[arg(long, default_value = "Penang Hill")]
    say: String,

    /// Override the reply latency in milliseconds.
    #[arg(long)]
    latency_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the rendered state.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiosk=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => KioskConfig::from_file(path)?,
        None => {
            let path = KioskConfig::default_config_path();
            if path.exists() {
                KioskConfig::from_file(&path)?
            } else {
                KioskConfig::default()
            }
        }
    };
    if config.conversation.greeting.is_none() {
        config.conversation.greeting = Some(KIOSK_GREETING.to_owned());
    }
    if let Some(latency_ms) = cli.latency_ms {
        config.reply.latency_ms = latency_ms;
    }

    let (recognizer, recognizer_rx) = ChannelRecognizer::new();
    let (synthesizer, synthesizer_rx) = ChannelSynthesizer::new(demo_voices());
    tokio::spawn(scripted_recognizer(recognizer_rx, cli.say.clone()));
    tokio::spawn(scripted_synthesizer(synthesizer_rx));

    let resolver = Arc::new(RouteReplyResolver::from_config(&config.reply));
    let controller = SessionController::new(config, resolver)
        .with_recognizer(recognizer)
        .with_synthesizer(synthesizer);
    let handle = controller.handle();
    let mut events = handle.subscribe();

    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    });

    let session = tokio::spawn(controller.run());

    println!("Kiosk demo v{}", env!("CARGO_PKG_VERSION"));
    let mut expected = handle.render_state().await?.messages.len();

    println!("> {}", cli.typed);
    handle.submit_typed(cli.typed.as_str()).await?;
    expected += 2;
    wait_for_reply(&handle, &mut events, expected).await?;

    println!("> (voice) {}", cli.say);
    handle.start_voice_input().await?;
    expected += 2;
    wait_for_reply(&handle, &mut events, expected).await?;

    // Replay the first bot reply to the typed question.
    let state = handle.render_state().await?;
    if let Some(first) = state
        .messages
        .iter()
        .filter(|m| m.kind == MessageKind::Bot)
        .nth(1)
    {
        handle.replay_message(first.id).await?;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = handle.render_state().await?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    handle.shutdown();
    session.await??;
    Ok(())
}

/// Wait until the log holds `expected` settled messages.
async fn wait_for_reply(
    handle: &SessionHandle,
    events: &mut broadcast::Receiver<RuntimeEvent>,
    expected: usize,
) -> anyhow::Result<()> {
    loop {
        match events.recv().await {
            Ok(RuntimeEvent::LogChanged) => {
                let state = handle.render_state().await?;
                if state.awaiting_reply || state.messages.len() < expected {
                    continue;
                }
                if let Some(last) = state.messages.last() {
                    println!("< {}", last.text);
                }
                return Ok(());
            }
            Ok(RuntimeEvent::Status(notice)) => {
                warn!(?notice, "session status");
                if matches!(
                    notice,
                    StatusNotice::ReplyFailed { .. } | StatusNotice::RecognitionFailed { .. }
                ) {
                    anyhow::bail!("no reply: {notice:?}");
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("skipped {n} runtime events"),
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("session stopped before the reply arrived")
            }
        }
    }
}

fn demo_voices() -> Vec<Voice> {
    vec![
        Voice {
            name: "Kiosk Local".into(),
            lang: "en-US".into(),
            local_service: true,
        },
        Voice {
            name: "Kiosk Online".into(),
            lang: "en_US".into(),
            local_service: false,
        },
    ]
}

/// Hears `phrase` word by word, then finalizes it.
async fn scripted_recognizer(
    mut commands: mpsc::UnboundedReceiver<RecognizerCommand>,
    phrase: String,
) {
    while let Some(command) = commands.recv().await {
        let RecognizerCommand::Start { options, sink } = command else {
            continue;
        };
        info!(capture = %sink.capture_id(), language = %options.language, "microphone opened");
        sink.emit(RecognitionEvent::Started);

        let words: Vec<&str> = phrase.split_whitespace().collect();
        if options.interim_results {
            for end in 1..words.len() {
                tokio::time::sleep(Duration::from_millis(150)).await;
                sink.emit(RecognitionEvent::Result {
                    segments: vec![words[..end].join(" ")],
                    is_final: false,
                });
            }
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        sink.emit(RecognitionEvent::Result {
            segments: vec![phrase.clone()],
            is_final: true,
        });
        sink.emit(RecognitionEvent::Ended);
    }
}

/// Pretends to read each utterance aloud at roughly speaking pace.
async fn scripted_synthesizer(mut commands: mpsc::UnboundedReceiver<SynthesizerCommand>) {
    let mut current: Option<tokio::task::JoinHandle<()>> = None;
    while let Some(command) = commands.recv().await {
        if let Some(task) = current.take() {
            task.abort();
        }
        if let SynthesizerCommand::Speak { utterance, sink } = command {
            let voice = utterance.voice.as_ref().map_or("default", |v| v.name.as_str());
            info!(playback = %sink.playback_id(), voice, "speaking");
            let words = utterance.text.split_whitespace().count() as u64;
            current = Some(tokio::spawn(async move {
                sink.emit(SynthesisEvent::Started);
                tokio::time::sleep(Duration::from_millis(60 * words)).await;
                sink.emit(SynthesisEvent::Ended);
            }));
        }
    }
}
