//! Sessions configured from TOML files.

use crate::helpers::spawn_kiosk;
use kiosk::KioskConfig;
use kiosk::audio::capture::RecognizerCommand;
use kiosk::conversation::MessageKind;

#[tokio::test]
async fn reply_template_and_greeting_come_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[reply]
latency_ms = 0
template = "Head to {input} via the coastal road."

[conversation]
greeting = "Selamat datang!"
"#,
    )
    .unwrap();

    let config = KioskConfig::from_file(&path).unwrap();
    let mut kiosk = spawn_kiosk(config);
    kiosk.handle.submit_typed("Tanjung Bungah").await.unwrap();
    let state = kiosk.settled(3).await;

    assert_eq!(state.messages[0].kind, MessageKind::Bot);
    assert_eq!(state.messages[0].text, "Selamat datang!");
    assert_eq!(
        state.messages[2].text,
        "Head to Tanjung Bungah via the coastal road."
    );
    kiosk.stop().await;
}

#[tokio::test]
async fn capture_options_reach_the_recognizer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = KioskConfig::default();
    config.capture.language = "ms-MY".into();
    config.capture.interim_results = false;
    config.save_to_file(&path).unwrap();

    let mut kiosk = spawn_kiosk(KioskConfig::from_file(&path).unwrap());
    kiosk.handle.start_voice_input().await.unwrap();
    let command = kiosk.recognizer.recv().await.unwrap();
    let RecognizerCommand::Start { options, .. } = command else {
        panic!("expected a start command");
    };
    assert_eq!(options.language, "ms-MY");
    assert!(!options.interim_results);
    assert!(!options.continuous);
    kiosk.stop().await;
}

#[test]
fn map_with_center_outside_bounds_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[map.center]
lat = 3.139
lng = 101.6869
"#,
    )
    .unwrap();
    assert!(KioskConfig::from_file(&path).is_err());
}
