//! Text extraction (OCR).
//!
//! [`TesseractOcr`] runs the `tesseract` CLI in TSV mode and parses its
//! word table. [`SimulatedOcr`] returns configured words so sequences and
//! tests can exercise the `ocr` step without a recognizer installed.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::capture::CapturedImage;
use crate::host;
use crate::{ToolkitError, ToolkitResult};

/// Words at or below this recognizer confidence (0-100) are dropped.
pub const MIN_WORD_CONFIDENCE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized word, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Word {
    fn is_kept(&self) -> bool {
        self.confidence > MIN_WORD_CONFIDENCE && !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Every recognized token, regardless of confidence.
    pub full_text: String,
    /// Tokens above [`MIN_WORD_CONFIDENCE`], in reading order.
    pub words: Vec<Word>,
}

impl OcrResult {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &CapturedImage, language: &str) -> ToolkitResult<OcrResult>;
}

// ---------------------------------------------------------------------------
// Tesseract
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn detect() -> ToolkitResult<Self> {
        if host::command_exists("tesseract") {
            Ok(Self)
        } else {
            Err(ToolkitError::Unavailable("tesseract is not installed".into()))
        }
    }
}

impl TextExtractor for TesseractOcr {
    fn extract_text(&self, image: &CapturedImage, language: &str) -> ToolkitResult<OcrResult> {
        validate_language(language)?;
        let file = tempfile::Builder::new()
            .prefix("jarvis_ocr_")
            .suffix(".png")
            .tempfile()?;
        image.save_png(file.path())?;

        let path = file.path().to_string_lossy().into_owned();
        let tsv = host::run_tool("tesseract", [path.as_str(), "stdout", "-l", language, "tsv"])?;
        let result = parse_tsv(&tsv, image.origin());
        tracing::debug!(words = result.words.len(), language, "ocr complete");
        Ok(result)
    }
}

/// Language codes are passed to a subprocess; keep them to `eng`, `deu+eng` and the like.
fn validate_language(language: &str) -> ToolkitResult<()> {
    let ok = !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ToolkitError::InvalidArgument(format!(
            "invalid OCR language: {language}"
        )))
    }
}

/// Parse tesseract TSV output.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Only level-5 (word) rows carry text. Word boxes
/// are shifted by `origin` so they land in screen coordinates.
pub fn parse_tsv(tsv: &str, origin: (u32, u32)) -> OcrResult {
    let mut lines: Vec<Vec<&str>> = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;
    let mut words = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let key = (num(2), num(3), num(4));
        if current_line != Some(key) {
            lines.push(Vec::new());
            current_line = Some(key);
        }
        if let Some(line) = lines.last_mut() {
            line.push(text);
        }

        let word = Word {
            text: text.to_string(),
            confidence: cols[10].trim().parse::<f32>().unwrap_or(-1.0),
            bbox: BoundingBox {
                x: num(6) + origin.0,
                y: num(7) + origin.1,
                width: num(8),
                height: num(9),
            },
        };
        if word.is_kept() {
            words.push(word);
        }
    }

    OcrResult {
        full_text: lines
            .iter()
            .map(|l| l.join(" "))
            .collect::<Vec<_>>()
            .join("\n"),
        words,
    }
}

// ---------------------------------------------------------------------------
// Simulated
// ---------------------------------------------------------------------------

/// Returns a fixed set of words for every image.
#[derive(Debug, Default)]
pub struct SimulatedOcr {
    words: Mutex<Vec<Word>>,
}

impl SimulatedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw (unfiltered) words the recognizer "sees".
    pub fn set_words(&self, words: Vec<Word>) {
        if let Ok(mut guard) = self.words.lock() {
            *guard = words;
        }
    }
}

impl TextExtractor for SimulatedOcr {
    fn extract_text(&self, image: &CapturedImage, language: &str) -> ToolkitResult<OcrResult> {
        validate_language(language)?;
        let raw = self
            .words
            .lock()
            .map_err(|_| ToolkitError::Other("simulated ocr lock poisoned".into()))?
            .clone();
        let (ox, oy) = image.origin();
        let full_text = raw
            .iter()
            .map(|w| w.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let words = raw
            .into_iter()
            .filter(Word::is_kept)
            .map(|mut w| {
                w.bbox.x += ox;
                w.bbox.y += oy;
                w
            })
            .collect();
        Ok(OcrResult { full_text, words })
    }
}
