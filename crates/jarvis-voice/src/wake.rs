//! Wake-phrase listener.
//!
//! # State machine
//!
//! ```text
//! Idle --start(phrase)--> Listening --stop() / hard STT error--> Idle
//! ```
//!
//! `start` while listening is a no-op that reports `already_active`, so
//! there is never more than one loop. `stop` cancels the current session's
//! token; the loop notices at its next await point and exits. A loop that
//! dies on a hard transcription error resets the state only if it is still
//! the current session, so a stale loop can never clobber a newer one.
//!
//! # Detection flow
//!
//! 1. Record a short window from the [`AudioSource`].
//! 2. Skip it when too few frames carry voice activity.
//! 3. Transcribe; empty transcripts and timeouts are skipped.
//! 4. If the lower-cased transcript contains the phrase, publish a
//!    [`WakeEvent`] on the broadcast channel, unless the previous signal
//!    was within the cooldown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use jarvis_types::VoiceConfig;

use crate::capture::{voice_activity_ratio, wav_to_samples, AudioSource, CommandAudioSource, VAD_FRAME};
use crate::stt::{SttProvider, WhisperStt};
use crate::{VoiceError, VoiceResult};

/// Windows with a smaller fraction of voiced frames are not transcribed.
const MIN_VOICE_RATIO: f32 = 0.1;

/// Pause after a failed recording before trying again.
const CAPTURE_RETRY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Settings, events, status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WakeSettings {
    /// Phrase used when `start` is called without one.
    pub default_phrase: String,
    pub listen_window: Duration,
    pub cooldown: Duration,
    pub vad_threshold: f32,
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self::from(&VoiceConfig::default())
    }
}

impl From<&VoiceConfig> for WakeSettings {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            default_phrase: config.phrase.clone(),
            listen_window: Duration::from_secs(config.listen_window_secs),
            cooldown: Duration::from_millis(config.cooldown_ms),
            vad_threshold: config.vad_threshold,
        }
    }
}

/// Published when the trigger phrase is heard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeEvent {
    pub transcript: String,
    pub phrase: String,
    pub session_id: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeStatus {
    pub listening: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    /// Set when `start` found a session already running.
    #[serde(default)]
    pub already_active: bool,
    /// False when no audio source or transcriber could be set up.
    pub available: bool,
    /// Signals published since construction.
    pub detections: u64,
}

// ---------------------------------------------------------------------------
// Phrase matching
// ---------------------------------------------------------------------------

/// Case-insensitive containment after collapsing whitespace.
pub fn matches_wake_phrase(transcript: &str, phrase: &str) -> bool {
    let phrase = normalize_text(phrase);
    !phrase.is_empty() && normalize_text(transcript).contains(&phrase)
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// WakeListener
// ---------------------------------------------------------------------------

struct Session {
    id: u64,
    phrase: String,
    cancel: CancellationToken,
}

enum State {
    Idle,
    Listening(Session),
}

/// Backend pair, or the reason there is none.
enum Backend {
    Ready {
        audio: Arc<dyn AudioSource>,
        stt: Arc<dyn SttProvider>,
    },
    Degraded(String),
}

/// Long-lived wake-phrase service.
///
/// Owns at most one background loop. Dropping the listener cancels it.
pub struct WakeListener {
    settings: WakeSettings,
    backend: Backend,
    state: Arc<Mutex<State>>,
    events: broadcast::Sender<WakeEvent>,
    next_session: AtomicU64,
    detections: Arc<AtomicU64>,
    degraded_warned: AtomicBool,
}

impl WakeListener {
    pub fn new(
        settings: WakeSettings,
        audio: Arc<dyn AudioSource>,
        stt: Arc<dyn SttProvider>,
    ) -> Self {
        Self::with_backend(settings, Backend::Ready { audio, stt })
    }

    /// A listener that cannot listen; `start` reports the reason.
    pub fn unavailable(settings: WakeSettings, reason: impl Into<String>) -> Self {
        Self::with_backend(settings, Backend::Degraded(reason.into()))
    }

    fn with_backend(settings: WakeSettings, backend: Backend) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            settings,
            backend,
            state: Arc::new(Mutex::new(State::Idle)),
            events,
            next_session: AtomicU64::new(1),
            detections: Arc::new(AtomicU64::new(0)),
            degraded_warned: AtomicBool::new(false),
        }
    }

    /// Probe for a capture tool and a transcription key. Missing pieces
    /// leave the listener degraded instead of failing.
    pub async fn from_config(config: &VoiceConfig) -> Self {
        let settings = WakeSettings::from(config);
        let audio = CommandAudioSource::detect(config.sample_rate).await;
        let stt = WhisperStt::from_settings(&config.stt);
        match (audio, stt) {
            (Ok(audio), Ok(stt)) => Self::new(settings, Arc::new(audio), Arc::new(stt)),
            (Err(e), _) | (_, Err(e)) => Self::unavailable(settings, e.to_string()),
        }
    }

    pub fn settings(&self) -> &WakeSettings {
        &self.settings
    }

    /// Receive future [`WakeEvent`]s.
    pub fn subscribe(&self) -> broadcast::Receiver<WakeEvent> {
        self.events.subscribe()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready { .. })
    }

    /// Begin listening for `phrase` (or the configured default).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, phrase: Option<&str>) -> VoiceResult<WakeStatus> {
        let (audio, stt) = match &self.backend {
            Backend::Ready { audio, stt } => (audio.clone(), stt.clone()),
            Backend::Degraded(reason) => {
                if !self.degraded_warned.swap(true, Ordering::SeqCst) {
                    warn!(reason = %reason, "wake listener unavailable");
                }
                return Err(VoiceError::Unavailable(reason.clone()));
            }
        };

        let phrase = phrase
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.settings.default_phrase.as_str())
            .to_lowercase();
        if phrase.trim().is_empty() {
            return Err(VoiceError::ConfigError("wake phrase is empty".into()));
        }

        let mut state = self.lock_state()?;
        if let State::Listening(session) = &*state {
            debug!(session = session.id, "wake listener already active");
            let mut status = self.status_of(&state);
            status.already_active = true;
            return Ok(status);
        }

        let session = Session {
            id: self.next_session.fetch_add(1, Ordering::SeqCst),
            phrase: phrase.clone(),
            cancel: CancellationToken::new(),
        };
        let ctx = LoopContext {
            session_id: session.id,
            phrase,
            cancel: session.cancel.clone(),
            settings: self.settings.clone(),
            audio,
            stt,
            events: self.events.clone(),
            state: self.state.clone(),
            detections: self.detections.clone(),
        };
        info!(session = session.id, phrase = %session.phrase, "wake listener started");
        *state = State::Listening(session);
        tokio::spawn(listen_loop(ctx));

        Ok(self.status_of(&state))
    }

    /// Stop the current session, if any. The loop exits at its next await.
    pub fn stop(&self) -> WakeStatus {
        match self.lock_state() {
            Ok(mut state) => {
                if let State::Listening(session) = std::mem::replace(&mut *state, State::Idle) {
                    session.cancel.cancel();
                    info!(session = session.id, "wake listener stopped");
                }
                self.status_of(&state)
            }
            Err(_) => self.idle_status(),
        }
    }

    pub fn status(&self) -> WakeStatus {
        match self.lock_state() {
            Ok(state) => self.status_of(&state),
            Err(_) => self.idle_status(),
        }
    }

    fn status_of(&self, state: &State) -> WakeStatus {
        match state {
            State::Idle => self.idle_status(),
            State::Listening(session) => WakeStatus {
                listening: true,
                phrase: Some(session.phrase.clone()),
                session_id: Some(session.id),
                already_active: false,
                available: self.is_available(),
                detections: self.detections.load(Ordering::SeqCst),
            },
        }
    }

    fn idle_status(&self) -> WakeStatus {
        WakeStatus {
            listening: false,
            phrase: None,
            session_id: None,
            already_active: false,
            available: self.is_available(),
            detections: self.detections.load(Ordering::SeqCst),
        }
    }

    fn lock_state(&self) -> VoiceResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| VoiceError::ConfigError("wake listener state poisoned".into()))
    }
}

impl Drop for WakeListener {
    fn drop(&mut self) {
        if let Ok(state) = self.state.lock() {
            if let State::Listening(session) = &*state {
                session.cancel.cancel();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Background loop
// ---------------------------------------------------------------------------

struct LoopContext {
    session_id: u64,
    phrase: String,
    cancel: CancellationToken,
    settings: WakeSettings,
    audio: Arc<dyn AudioSource>,
    stt: Arc<dyn SttProvider>,
    events: broadcast::Sender<WakeEvent>,
    state: Arc<Mutex<State>>,
    detections: Arc<AtomicU64>,
}

async fn listen_loop(ctx: LoopContext) {
    let mut last_signal: Option<Instant> = None;

    loop {
        let recorded = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            r = ctx.audio.record(ctx.settings.listen_window) => r,
        };
        let audio = match recorded {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "wake listener: audio capture failed");
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = tokio::time::sleep(CAPTURE_RETRY) => continue,
                }
            }
        };

        let samples = wav_to_samples(&audio);
        if voice_activity_ratio(&samples, ctx.settings.vad_threshold, VAD_FRAME) < MIN_VOICE_RATIO {
            continue;
        }

        let transcribed = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            r = ctx.stt.transcribe(&audio) => r,
        };
        let transcript = match transcribed {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => text,
            Err(VoiceError::Timeout) => {
                debug!("wake listener: transcription timed out");
                continue;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    provider = ctx.stt.name(),
                    "wake listener: transcription failed, stopping"
                );
                reset_if_current(&ctx.state, ctx.session_id);
                break;
            }
        };
        debug!(transcript = %transcript, "wake listener: got transcript");

        if !matches_wake_phrase(&transcript, &ctx.phrase) {
            continue;
        }
        if last_signal.is_some_and(|t| t.elapsed() < ctx.settings.cooldown) {
            debug!("wake listener: detection within cooldown, ignored");
            continue;
        }
        if ctx.cancel.is_cancelled() {
            break;
        }

        last_signal = Some(Instant::now());
        ctx.detections.fetch_add(1, Ordering::SeqCst);
        info!(transcript = %transcript, phrase = %ctx.phrase, "wake phrase detected");
        // No subscribers is fine; the signal is simply dropped.
        let _ = ctx.events.send(WakeEvent {
            transcript,
            phrase: ctx.phrase.clone(),
            session_id: ctx.session_id,
            timestamp: Utc::now(),
        });
    }

    debug!(session = ctx.session_id, "wake loop exited");
}

fn reset_if_current(state: &Mutex<State>, session_id: u64) {
    if let Ok(mut state) = state.lock() {
        if matches!(&*state, State::Listening(s) if s.id == session_id) {
            *state = State::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{silent_clip, voiced_clip, ScriptedAudio, ScriptedStt};

    fn settings() -> WakeSettings {
        WakeSettings {
            default_phrase: "jarvis".into(),
            listen_window: Duration::from_millis(20),
            cooldown: Duration::from_millis(2000),
            vad_threshold: 0.02,
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<WakeEvent>) -> Option<WakeEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .and_then(Result::ok)
    }

    async fn wait_until_idle(listener: &WakeListener) {
        for _ in 0..200 {
            if !listener.status().listening {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("listener never returned to idle");
    }

    #[test]
    fn phrase_matching() {
        assert!(matches_wake_phrase("Hey  JARVIS, open files", "hey jarvis"));
        assert!(matches_wake_phrase("ok jarvis", "Jarvis"));
        assert!(!matches_wake_phrase("hey siri", "jarvis"));
        assert!(!matches_wake_phrase("jarvis", ""));
        assert!(!matches_wake_phrase("", "jarvis"));
    }

    #[tokio::test]
    async fn detection_is_published() {
        let audio = Arc::new(ScriptedAudio::new([silent_clip(), voiced_clip()]));
        let stt = Arc::new(ScriptedStt::transcripts(["Hey Jarvis what time is it"]));
        let listener = WakeListener::new(settings(), audio.clone(), stt.clone());
        let mut rx = listener.subscribe();

        let status = listener.start(Some("hey jarvis")).unwrap();
        assert!(status.listening);
        assert!(!status.already_active);

        let event = next_event(&mut rx).await.expect("wake event");
        assert_eq!(event.phrase, "hey jarvis");
        assert_eq!(event.transcript, "Hey Jarvis what time is it");
        // The silent window never reached the transcriber.
        assert_eq!(stt.calls(), 1);
        listener.stop();
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let audio = Arc::new(ScriptedAudio::new([voiced_clip()]));
        let stt = Arc::new(ScriptedStt::transcripts(["jarvis"]));
        let listener = WakeListener::new(settings(), audio, stt);
        let mut rx = listener.subscribe();

        let first = listener.start(None).unwrap();
        let second = listener.start(Some("something else")).unwrap();
        assert!(second.already_active);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.phrase.as_deref(), Some("jarvis"));

        assert!(next_event(&mut rx).await.is_some());
        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err(), "duplicate detection signal");
        assert_eq!(listener.status().detections, 1);
        listener.stop();
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeats() {
        let audio = Arc::new(ScriptedAudio::new([voiced_clip(), voiced_clip()]));
        let stt = Arc::new(ScriptedStt::transcripts(["jarvis", "jarvis again"]));
        let listener = WakeListener::new(settings(), audio, stt.clone());
        let mut rx = listener.subscribe();
        listener.start(None).unwrap();

        assert!(next_event(&mut rx).await.is_some());
        for _ in 0..100 {
            if stt.calls() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stt.calls(), 2);
        assert_eq!(listener.status().detections, 1);
        listener.stop();
    }

    #[tokio::test]
    async fn timeouts_and_noise_are_swallowed() {
        let audio = Arc::new(ScriptedAudio::new([voiced_clip(), voiced_clip(), voiced_clip()]));
        let stt = Arc::new(ScriptedStt::new([
            Err(VoiceError::Timeout),
            Ok(String::new()),
            Ok("jarvis".to_string()),
        ]));
        let listener = WakeListener::new(settings(), audio, stt);
        let mut rx = listener.subscribe();
        listener.start(None).unwrap();

        assert!(next_event(&mut rx).await.is_some());
        assert!(listener.status().listening);
        listener.stop();
    }

    #[tokio::test]
    async fn hard_stt_error_returns_to_idle() {
        let audio = Arc::new(ScriptedAudio::new([voiced_clip()]));
        let stt = Arc::new(ScriptedStt::new([Err(VoiceError::SttError("503".into()))]));
        let listener = WakeListener::new(settings(), audio, stt);
        listener.start(None).unwrap();

        wait_until_idle(&listener).await;
        let restarted = listener.start(None).unwrap();
        assert!(restarted.listening);
        assert!(!restarted.already_active);
        listener.stop();
    }

    #[tokio::test]
    async fn stop_halts_the_loop() {
        let audio = Arc::new(ScriptedAudio::new(Vec::new()));
        let stt = Arc::new(ScriptedStt::default());
        let listener = WakeListener::new(settings(), audio.clone(), stt);
        listener.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let status = listener.stop();
        assert!(!status.listening);
        tokio::time::sleep(Duration::from_millis(40)).await;
        let after_stop = audio.recordings();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(audio.recordings(), after_stop);
    }

    #[tokio::test]
    async fn unavailable_listener_reports_capture_unavailable() {
        let listener = WakeListener::unavailable(settings(), "no microphone");
        let err = listener.start(None).unwrap_err();
        assert_eq!(err.kind(), jarvis_types::ErrorKind::CaptureUnavailable);
        assert!(!listener.status().available);
        assert!(!listener.stop().listening);
    }
}
