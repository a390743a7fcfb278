//! Wake-phrase listening through the assistant, with scripted audio and a
//! mocked transcription service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use jarvis_control::{Assistant, Components};
use jarvis_interpret::Interpreter;
use jarvis_ledger::MemoryHistory;
use jarvis_policy::PolicyEngine;
use jarvis_types::{ErrorKind, Platform};
use jarvis_voice::scripted::{voiced_clip, ScriptedAudio, ScriptedStt};
use jarvis_voice::{SttProvider, WakeListener, WakeSettings, WhisperStt};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn fast_settings() -> WakeSettings {
    WakeSettings {
        default_phrase: "hey jarvis".into(),
        listen_window: Duration::from_millis(50),
        cooldown: Duration::ZERO,
        ..WakeSettings::default()
    }
}

fn assistant_with(dir: &std::path::Path, wake: WakeListener) -> Assistant {
    let (automation, _screen, _input) = common::simulated_automation(dir);
    Assistant::with_components(
        common::unix_config(dir),
        Components {
            interpreter: Interpreter::local(PolicyEngine::for_platform(Platform::Unix)),
            automation,
            wake,
            history: Arc::new(MemoryHistory::new()),
        },
    )
}

async fn wait_until_idle(assistant: &Assistant) -> bool {
    for _ in 0..100 {
        if !assistant.wake_status().data.is_some_and(|s| s.listening) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn transcribed_phrase_publishes_wake_event() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/audio/transcriptions"))
        .and(matchers::header("authorization", "Bearer stt-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Hey   JARVIS, open the browser\n"))
        .mount(&server)
        .await;

    let stt: Arc<dyn SttProvider> = Arc::new(
        WhisperStt::new(&server.uri(), "stt-key", "whisper-1", "en", Duration::from_secs(5))
            .unwrap(),
    );
    let audio = Arc::new(ScriptedAudio::new(vec![voiced_clip()]));
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant_with(dir.path(), WakeListener::new(fast_settings(), audio, stt));

    let mut events = assistant.subscribe_wake();
    let started = assistant.start_wake(None);
    assert!(started.success);
    let session = started.data.unwrap().session_id;

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("wake event")
        .unwrap();
    assert_eq!(event.phrase, "hey jarvis");
    assert_eq!(event.transcript, "Hey   JARVIS, open the browser");
    assert_eq!(Some(event.session_id), session);

    let stopped = assistant.stop_wake().data.unwrap();
    assert!(!stopped.listening);
    assert!(stopped.detections >= 1);
}

#[tokio::test]
async fn transcription_outage_returns_listener_to_idle() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let stt = Arc::new(
        WhisperStt::new(&server.uri(), "k", "whisper-1", "en", Duration::from_secs(5)).unwrap(),
    );
    let audio = Arc::new(ScriptedAudio::new(vec![voiced_clip()]));
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant_with(dir.path(), WakeListener::new(fast_settings(), audio, stt));

    assert!(assistant.start_wake(None).success);
    assert!(wait_until_idle(&assistant).await, "listener should stop after a hard error");

    // A fresh start is allowed once idle.
    let restarted = assistant.start_wake(Some("computer")).data.unwrap();
    assert!(restarted.listening);
    assert!(!restarted.already_active);
    assert_eq!(restarted.phrase.as_deref(), Some("computer"));
    assistant.stop_wake();
}

#[tokio::test]
async fn second_start_reports_the_running_session() {
    let audio = Arc::new(ScriptedAudio::new(Vec::new()));
    let stt = Arc::new(ScriptedStt::default());
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant_with(dir.path(), WakeListener::new(fast_settings(), audio, stt));

    let first = assistant.start_wake(Some("Computer")).data.unwrap();
    let second = assistant.start_wake(Some("something else")).data.unwrap();
    assert!(second.already_active);
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.phrase.as_deref(), Some("computer"));

    let status = assistant.status().await.data.unwrap();
    assert!(status.wake.listening);
    assert!(status.wake.available);

    assistant.stop_wake();
    assert!(wait_until_idle(&assistant).await);
}

#[tokio::test]
async fn missing_audio_reports_capture_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant_with(
        dir.path(),
        WakeListener::unavailable(fast_settings(), "no capture tool found"),
    );

    let response = assistant.start_wake(None);
    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::CaptureUnavailable));
    assert!(response.error.unwrap().contains("no capture tool found"));

    let status = assistant.wake_status().data.unwrap();
    assert!(!status.listening);
    assert!(!status.available);
}
