//! Audio capture from the microphone via system commands.
//!
//! [`CommandAudioSource`] records fixed-length windows with SoX `rec` or
//! ALSA `arecord` into a temporary WAV file. Both produce 16-bit signed
//! mono PCM at the configured sample rate.
//!
//! The module also holds the RMS-energy voice activity detection used to
//! skip silent windows before they reach the speech-to-text service.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{VoiceError, VoiceResult};

/// Samples per VAD frame (30 ms at 16 kHz).
pub const VAD_FRAME: usize = 480;

/// A source of short WAV recordings.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Record one window of `duration` and return the WAV bytes.
    async fn record(&self, duration: Duration) -> VoiceResult<Vec<u8>>;

    /// Source name for logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Backend detection
// ---------------------------------------------------------------------------

/// Available audio capture tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    /// SoX `rec` command.
    Sox,
    /// Linux ALSA `arecord` command.
    Arecord,
}

impl CaptureBackend {
    fn program(self) -> &'static str {
        match self {
            CaptureBackend::Sox => "rec",
            CaptureBackend::Arecord => "arecord",
        }
    }
}

impl std::fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackend::Sox => write!(f, "sox"),
            CaptureBackend::Arecord => write!(f, "arecord"),
        }
    }
}

/// Check for `rec` first, then `arecord`.
pub async fn detect_backend() -> Option<CaptureBackend> {
    for backend in [CaptureBackend::Sox, CaptureBackend::Arecord] {
        if command_exists(backend.program()).await {
            return Some(backend);
        }
    }
    None
}

async fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// CommandAudioSource
// ---------------------------------------------------------------------------

/// Records from the default microphone through a capture tool.
#[derive(Debug)]
pub struct CommandAudioSource {
    backend: CaptureBackend,
    sample_rate: u32,
}

impl CommandAudioSource {
    pub fn new(backend: CaptureBackend, sample_rate: u32) -> Self {
        Self {
            backend,
            sample_rate,
        }
    }

    /// Auto-detect a capture tool. Fails with [`VoiceError::Unavailable`]
    /// when neither SoX nor ALSA utilities are installed.
    pub async fn detect(sample_rate: u32) -> VoiceResult<Self> {
        let backend = detect_backend().await.ok_or_else(|| {
            VoiceError::Unavailable(
                "no audio capture backend found; install SoX (rec) or ALSA (arecord)".into(),
            )
        })?;
        tracing::info!(backend = %backend, "detected audio capture backend");
        Ok(Self::new(backend, sample_rate))
    }

    pub fn backend(&self) -> CaptureBackend {
        self.backend
    }

    fn command(&self, output: &str, secs: u64) -> Command {
        let rate = self.sample_rate.to_string();
        let secs = secs.max(1).to_string();
        let mut cmd = Command::new(self.backend.program());
        match self.backend {
            CaptureBackend::Sox => {
                cmd.args(["-q", "-r", rate.as_str(), "-c", "1", "-b", "16", "-e", "signed-integer"])
                    .arg(output)
                    .args(["trim", "0", secs.as_str()]);
            }
            CaptureBackend::Arecord => {
                cmd.args(["-q", "-f", "S16_LE", "-r", rate.as_str(), "-c", "1", "-t", "wav", "-d"])
                    .arg(&secs)
                    .arg(output);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AudioSource for CommandAudioSource {
    async fn record(&self, duration: Duration) -> VoiceResult<Vec<u8>> {
        let file = tempfile::Builder::new()
            .prefix("jarvis_voice_")
            .suffix(".wav")
            .tempfile()?;
        let path = file.path().to_string_lossy().into_owned();

        tracing::debug!(
            backend = %self.backend,
            secs = duration.as_secs(),
            "recording audio window"
        );
        let output = self
            .command(&path, duration.as_secs())
            .output()
            .await
            .map_err(|e| {
                VoiceError::CaptureError(format!("failed to run {}: {e}", self.backend.program()))
            })?;

        if !output.status.success() {
            return Err(VoiceError::CaptureError(format!(
                "{} exited with {}: {}",
                self.backend.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(tokio::fs::read(file.path()).await?)
    }

    fn name(&self) -> &str {
        self.backend.program()
    }
}

// ---------------------------------------------------------------------------
// WAV and voice activity
// ---------------------------------------------------------------------------

/// Extract 16-bit little-endian PCM samples from WAV bytes.
///
/// Walks the RIFF chunks to the `data` chunk; input without a RIFF/WAVE
/// header yields no samples. A `data` size larger than the buffer (as
/// written by streaming recorders) is clamped.
pub fn wav_to_samples(wav: &[u8]) -> Vec<i16> {
    if wav.len() < 12 || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return Vec::new();
    }

    let mut pos = 12;
    while pos + 8 <= wav.len() {
        let id = &wav[pos..pos + 4];
        let size = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]])
            as usize;
        let body = pos + 8;
        if id == b"data" {
            let end = body.saturating_add(size).min(wav.len());
            return wav[body..end]
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
        }
        // Chunks are word-aligned.
        pos = body.saturating_add(size).saturating_add(size & 1);
    }
    Vec::new()
}

/// Encode mono 16-bit PCM as a canonical 44-byte-header WAV file.
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// RMS energy of the samples, normalized to `[0, 1]`. Empty input is 0.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| f64::from(s).powi(2)).sum();
    ((energy / samples.len() as f64).sqrt() / f64::from(i16::MAX)) as f32
}

/// Fraction of `frame`-sized chunks whose RMS exceeds `threshold`.
pub fn voice_activity_ratio(samples: &[i16], threshold: f32, frame: usize) -> f32 {
    if samples.is_empty() || frame == 0 {
        return 0.0;
    }
    let (active, total) = samples
        .chunks(frame)
        .fold((0usize, 0usize), |(active, total), chunk| {
            let voiced = compute_rms(chunk) > threshold;
            (active + usize::from(voiced), total + 1)
        });
    active as f32 / total as f32
}
