//! The screen-automation service object.
//!
//! [`ScreenAutomation`] owns one implementation of each host capability
//! (capture, input, OCR, windows) plus the per-session state the rest of the
//! system needs, such as the path of the last screenshot. It is built once
//! at startup and shared; there is no module-level state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use jarvis_types::{ToolkitBackend, ToolkitConfig};

use crate::capture::{CapturedImage, LiveCapture, Region, ScreenCapture, SimulatedScreen};
use crate::input::{InputBackend, InputSimulator, MouseButton, SimulatedInput, XdotoolInput};
use crate::matcher::{self, Match};
use crate::vision::{OcrResult, SimulatedOcr, TesseractOcr, TextExtractor};
use crate::window::{self, SimulatedWindows, WindowInfo, WindowManager, WmctrlWindows};
use crate::{ToolkitError, ToolkitResult};

/// Which family of implementations backs a [`ScreenAutomation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Live,
    Simulated,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Live => write!(f, "live"),
            BackendMode::Simulated => write!(f, "simulated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutomationSettings {
    pub screenshot_dir: PathBuf,
    /// Base for relative template paths.
    pub template_dir: PathBuf,
    /// Pause after each successful sequence step.
    pub step_delay: Duration,
    /// Poll interval for [`ScreenAutomation::wait_for_template`].
    pub poll_interval: Duration,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self::from(&ToolkitConfig::default())
    }
}

impl From<&ToolkitConfig> for AutomationSettings {
    fn from(config: &ToolkitConfig) -> Self {
        Self {
            screenshot_dir: config.screenshot_dir.clone(),
            template_dir: config.template_dir.clone(),
            step_delay: Duration::from_millis(config.step_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// A screenshot written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct Screenshot {
    pub path: PathBuf,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    /// Encoded PNG, for callers that return the image inline.
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// Reports a missing optional capability on every call.
struct Missing(&'static str);

impl TextExtractor for Missing {
    fn extract_text(&self, _image: &CapturedImage, _language: &str) -> ToolkitResult<OcrResult> {
        Err(ToolkitError::Unavailable(self.0.into()))
    }
}

impl WindowManager for Missing {
    fn list_windows(&self) -> ToolkitResult<Vec<WindowInfo>> {
        Err(ToolkitError::Unavailable(self.0.into()))
    }

    fn focus(&self, _window: &WindowInfo) -> ToolkitResult<()> {
        Err(ToolkitError::Unavailable(self.0.into()))
    }
}

pub struct ScreenAutomation {
    mode: BackendMode,
    settings: AutomationSettings,
    screen: Arc<dyn ScreenCapture>,
    input: InputSimulator,
    ocr: Arc<dyn TextExtractor>,
    windows: Arc<dyn WindowManager>,
    last_screenshot: Mutex<Option<PathBuf>>,
}

impl std::fmt::Debug for ScreenAutomation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenAutomation")
            .field("mode", &self.mode)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ScreenAutomation {
    /// Assemble from explicit parts.
    pub fn from_parts(
        mode: BackendMode,
        settings: AutomationSettings,
        screen: Arc<dyn ScreenCapture>,
        input: Arc<dyn InputBackend>,
        ocr: Arc<dyn TextExtractor>,
        windows: Arc<dyn WindowManager>,
    ) -> Self {
        let input = InputSimulator::new(input, screen.clone());
        Self {
            mode,
            settings,
            screen,
            input,
            ocr,
            windows,
            last_screenshot: Mutex::new(None),
        }
    }

    /// In-memory screen of `width`x`height` with recorded input.
    pub fn simulated(settings: AutomationSettings, width: u32, height: u32) -> Self {
        Self::from_parts(
            BackendMode::Simulated,
            settings,
            Arc::new(SimulatedScreen::new(width, height)),
            Arc::new(SimulatedInput::new()),
            Arc::new(SimulatedOcr::new()),
            Arc::new(SimulatedWindows::default()),
        )
    }

    /// Drive the real display. Capture and input are required; OCR and
    /// window control degrade to "unavailable" errors when their tools are
    /// missing.
    pub fn live(settings: AutomationSettings) -> ToolkitResult<Self> {
        let screen = LiveCapture::detect()?;
        let input = XdotoolInput::detect()?;

        let ocr: Arc<dyn TextExtractor> = match TesseractOcr::detect() {
            Ok(ocr) => Arc::new(ocr),
            Err(e) => {
                warn!(error = %e, "OCR disabled");
                Arc::new(Missing("tesseract is not installed"))
            }
        };
        let windows: Arc<dyn WindowManager> = match WmctrlWindows::detect() {
            Ok(wm) => Arc::new(wm),
            Err(e) => {
                warn!(error = %e, "window control disabled");
                Arc::new(Missing("window control requires wmctrl and a display"))
            }
        };

        Ok(Self::from_parts(
            BackendMode::Live,
            settings,
            Arc::new(screen),
            Arc::new(input),
            ocr,
            windows,
        ))
    }

    /// Build according to `config.backend`. `auto` probes the host and
    /// falls back to the simulated backend with a single warning.
    pub fn from_config(config: &ToolkitConfig) -> ToolkitResult<Self> {
        let settings = AutomationSettings::from(config);
        let simulated = |settings| {
            Self::simulated(settings, config.simulated_width, config.simulated_height)
        };
        let automation = match config.backend {
            ToolkitBackend::Live => Self::live(settings)?,
            ToolkitBackend::Simulated => simulated(settings),
            ToolkitBackend::Auto => match Self::live(settings.clone()) {
                Ok(live) => live,
                Err(e) => {
                    warn!(error = %e, "screen automation unavailable, using simulated backend");
                    simulated(settings)
                }
            },
        };
        info!(mode = %automation.mode, "screen automation ready");
        Ok(automation)
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn settings(&self) -> &AutomationSettings {
        &self.settings
    }

    pub fn input(&self) -> &InputSimulator {
        &self.input
    }

    pub fn screen_size(&self) -> ToolkitResult<(u32, u32)> {
        self.screen.screen_size()
    }

    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    pub fn capture(&self, region: Option<Region>) -> ToolkitResult<CapturedImage> {
        self.screen.capture(region)
    }

    /// Capture and save a PNG under the screenshot directory.
    pub fn screenshot(
        &self,
        region: Option<Region>,
        filename: Option<&str>,
    ) -> ToolkitResult<Screenshot> {
        let filename = match filename {
            Some(name) => screenshot_filename(name)?,
            None => format!("screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S")),
        };
        let image = self.capture(region)?;

        std::fs::create_dir_all(&self.settings.screenshot_dir)?;
        let path = self.settings.screenshot_dir.join(&filename);
        let png = image.to_png_bytes()?;
        std::fs::write(&path, &png)?;

        if let Ok(mut last) = self.last_screenshot.lock() {
            *last = Some(path.clone());
        }
        info!(path = %path.display(), "screenshot saved");

        Ok(Screenshot {
            path,
            filename,
            width: image.width(),
            height: image.height(),
            timestamp: image.captured_at(),
            png,
        })
    }

    /// Path of the most recent screenshot taken through this service.
    pub fn last_screenshot(&self) -> Option<PathBuf> {
        self.last_screenshot.lock().ok().and_then(|p| p.clone())
    }

    // -----------------------------------------------------------------------
    // Template matching
    // -----------------------------------------------------------------------

    /// Relative template paths resolve against the template directory.
    pub fn resolve_template(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() || p.exists() {
            p.to_path_buf()
        } else {
            self.settings.template_dir.join(p)
        }
    }

    /// Match `needle` against a fresh capture; results are in screen coordinates.
    pub fn locate_on_screen(
        &self,
        needle: &RgbaImage,
        min_confidence: f32,
        region: Option<Region>,
    ) -> ToolkitResult<Vec<Match>> {
        validate_confidence(min_confidence)?;
        let frame = self.capture(region)?;
        let (ox, oy) = frame.origin();
        let matches: Vec<Match> = matcher::locate(needle, frame.image(), min_confidence)
            .into_iter()
            .map(|m| m.offset(ox, oy))
            .collect();
        debug!(count = matches.len(), min_confidence, "template search");
        Ok(matches)
    }

    pub fn locate_template(
        &self,
        template: &str,
        min_confidence: f32,
        region: Option<Region>,
    ) -> ToolkitResult<Vec<Match>> {
        let needle = matcher::load_template(&self.resolve_template(template))?;
        self.locate_on_screen(&needle, min_confidence, region)
    }

    /// Click the centre of the first match of `template`.
    pub fn click_on_template(
        &self,
        template: &str,
        min_confidence: f32,
        double: bool,
    ) -> ToolkitResult<Match> {
        let first = self
            .locate_template(template, min_confidence, None)?
            .into_iter()
            .next()
            .ok_or_else(|| ToolkitError::NotFound(format!("template not found: {template}")))?;
        let (cx, cy) = first.center();
        self.input
            .click(cx as i32, cy as i32, MouseButton::Left, double)?;
        Ok(first)
    }

    /// Poll until `template` appears or `timeout_secs` elapses.
    ///
    /// Errors other than "no match yet" (unreadable template, capture
    /// failure) end the wait immediately.
    pub fn wait_for_template(
        &self,
        template: &str,
        timeout_secs: f64,
        min_confidence: f32,
    ) -> ToolkitResult<Match> {
        let timeout = crate::input::seconds("timeout", timeout_secs)?;
        let needle = matcher::load_template(&self.resolve_template(template))?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self
                .locate_on_screen(&needle, min_confidence, None)?
                .into_iter()
                .next()
            {
                return Ok(found);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ToolkitError::Timeout(format!(
                    "template not found within {timeout_secs} seconds"
                )));
            }
            std::thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn click(&self, x: i32, y: i32, button: MouseButton, double: bool) -> ToolkitResult<()> {
        self.input.click(x, y, button, double)
    }

    pub fn type_text(&self, text: &str, interval_secs: f64) -> ToolkitResult<()> {
        self.input.type_text(text, interval_secs)
    }

    pub fn press(&self, combo: &str) -> ToolkitResult<()> {
        self.input.press(combo)
    }

    pub fn scroll(
        &self,
        direction: &str,
        amount: u32,
        x: Option<i32>,
        y: Option<i32>,
    ) -> ToolkitResult<()> {
        self.input.scroll(direction, amount, x, y)
    }

    pub fn drag(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_secs: f64) -> ToolkitResult<()> {
        self.input.drag(x0, y0, x1, y1, duration_secs)
    }

    // -----------------------------------------------------------------------
    // OCR and windows
    // -----------------------------------------------------------------------

    pub fn extract_text(&self, region: Option<Region>, language: &str) -> ToolkitResult<OcrResult> {
        let image = self.capture(region)?;
        self.ocr.extract_text(&image, language)
    }

    pub fn list_windows(&self) -> ToolkitResult<Vec<WindowInfo>> {
        self.windows.list_windows()
    }

    pub fn activate_window(&self, title: &str) -> ToolkitResult<WindowInfo> {
        window::activate_window(self.windows.as_ref(), title)
    }
}

fn validate_confidence(value: f32) -> ToolkitResult<()> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ToolkitError::InvalidArgument(format!(
            "confidence must be between -1 and 1, got {value}"
        )))
    }
}

/// Caller-supplied names stay inside the screenshot directory.
fn screenshot_filename(name: &str) -> ToolkitResult<String> {
    let name = name.trim();
    let plain = Path::new(name)
        .file_name()
        .is_some_and(|f| f == std::ffi::OsStr::new(name));
    if name.is_empty() || !plain || name.starts_with('.') {
        return Err(ToolkitError::InvalidArgument(format!(
            "invalid screenshot filename: {name:?}"
        )));
    }
    if name.to_lowercase().ends_with(".png") {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.png"))
    }
}
