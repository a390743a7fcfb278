//! Jarvis screen-automation toolkit (capture/match/ocr/input/window/sequence).
//!
//! This crate provides the building blocks for "seeing" and "acting" on the
//! desktop: screen capture, template matching, OCR, input simulation and
//! window control, plus the [`sequence`] orchestrator that drives them in
//! order. Every host capability sits behind a trait with a live
//! implementation (subprocess tools) and a simulated one (in-memory), and
//! [`ScreenAutomation`] bundles one of each.
//!
//! All operations are synchronous; async callers run them on a blocking
//! thread.

pub mod automation;
pub mod capture;
mod host;
pub mod input;
pub mod matcher;
pub mod sequence;
pub mod vision;
pub mod window;

use jarvis_types::ErrorKind;
use thiserror::Error;

pub use automation::{AutomationSettings, BackendMode, ScreenAutomation, Screenshot};
pub use capture::{CapturedImage, Region, ScreenCapture};
pub use input::{InputBackend, InputSimulator, MouseButton, ScrollDirection};
pub use matcher::Match;
pub use sequence::{AutomationAction, RawAction, SequenceResult, StepResult};
pub use vision::{OcrResult, TextExtractor, Word};
pub use window::{WindowInfo, WindowManager};

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("toolkit unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("coordinates ({x}, {y}) are outside screen bounds {width}x{height}")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Timeout(String),
    #[error("unknown action type: {0}")]
    UnknownActionType(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toolkit error: {0}")]
    Other(String),
}

impl ToolkitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolkitError::Unavailable(_) => ErrorKind::CaptureUnavailable,
            ToolkitError::NotFound(_) => ErrorKind::NotFound,
            ToolkitError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            ToolkitError::InvalidArgument(_) | ToolkitError::Image(_) => {
                ErrorKind::InvalidArgument
            }
            ToolkitError::Timeout(_) => ErrorKind::Timeout,
            ToolkitError::UnknownActionType(_) => ErrorKind::UnknownActionType,
            ToolkitError::Io(_) | ToolkitError::Other(_) => ErrorKind::Backend,
        }
    }
}

pub type ToolkitResult<T> = Result<T, ToolkitError>;
