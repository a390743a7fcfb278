//! Canned audio and transcripts.
//!
//! [`ScriptedAudio`] plays back a queue of WAV clips and then silence;
//! [`ScriptedStt`] answers with a queue of transcripts (or errors) and then
//! empty strings. Together they drive a [`WakeListener`](crate::WakeListener)
//! without a microphone or network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::capture::{samples_to_wav, AudioSource};
use crate::stt::SttProvider;
use crate::{VoiceError, VoiceResult};

const SAMPLE_RATE: u32 = 16_000;

/// One second of a loud square wave, enough to pass voice activity detection.
pub fn voiced_clip() -> Vec<u8> {
    let samples: Vec<i16> = (0..SAMPLE_RATE as usize)
        .map(|i| if (i / 40) % 2 == 0 { 8_000 } else { -8_000 })
        .collect();
    samples_to_wav(&samples, SAMPLE_RATE)
}

/// One second of silence.
pub fn silent_clip() -> Vec<u8> {
    samples_to_wav(&vec![0; SAMPLE_RATE as usize], SAMPLE_RATE)
}

#[derive(Debug, Default)]
pub struct ScriptedAudio {
    clips: Mutex<VecDeque<Vec<u8>>>,
    recordings: AtomicUsize,
}

impl ScriptedAudio {
    pub fn new(clips: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            clips: Mutex::new(clips.into_iter().collect()),
            recordings: AtomicUsize::new(0),
        }
    }

    /// Number of windows recorded so far.
    pub fn recordings(&self) -> usize {
        self.recordings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for ScriptedAudio {
    async fn record(&self, duration: Duration) -> VoiceResult<Vec<u8>> {
        self.recordings.fetch_add(1, Ordering::SeqCst);
        let next = self.clips.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(clip) => Ok(clip),
            None => {
                // Behave like a real recorder: an empty window still takes time.
                tokio::time::sleep(duration).await;
                Ok(silent_clip())
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Default)]
pub struct ScriptedStt {
    replies: Mutex<VecDeque<VoiceResult<String>>>,
    calls: AtomicUsize,
}

impl ScriptedStt {
    pub fn new(replies: impl IntoIterator<Item = VoiceResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience for a list of successful transcripts.
    pub fn transcripts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SttProvider for ScriptedStt {
    async fn transcribe(&self, _audio: &[u8]) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .map_err(|_| VoiceError::SttError("scripted replies poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
