//! Screen capture interfaces.
//!
//! [`ScreenCapture`] produces a [`CapturedImage`] of the full screen or a
//! rectangular [`Region`]. [`LiveCapture`] shells out to the platform
//! screenshot tool; [`SimulatedScreen`] serves an in-memory canvas.

use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::host;
use crate::{ToolkitError, ToolkitResult};

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check that the region is non-empty and lies inside a `w`x`h` screen.
    pub fn validate_within(&self, w: u32, h: u32) -> ToolkitResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ToolkitError::InvalidArgument(format!(
                "region {}x{} is empty",
                self.width, self.height
            )));
        }
        let fits_x = self.x.checked_add(self.width).is_some_and(|r| r <= w);
        let fits_y = self.y.checked_add(self.height).is_some_and(|b| b <= h);
        if !fits_x || !fits_y {
            return Err(ToolkitError::InvalidArgument(format!(
                "region ({}, {}, {}x{}) exceeds screen {w}x{h}",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A still image of the screen. Never mutated after capture.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    image: RgbaImage,
    captured_at: DateTime<Utc>,
    region: Option<Region>,
}

impl CapturedImage {
    pub fn new(image: RgbaImage, region: Option<Region>) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
            region,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Screen coordinates of the image's top-left pixel.
    pub fn origin(&self) -> (u32, u32) {
        self.region.map(|r| (r.x, r.y)).unwrap_or((0, 0))
    }

    pub fn to_png_bytes(&self) -> ToolkitResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn save_png(&self, path: &Path) -> ToolkitResult<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Crop a full-screen frame to `region` (or keep it whole).
pub fn crop_to_region(full: RgbaImage, region: Option<Region>) -> ToolkitResult<CapturedImage> {
    match region {
        None => Ok(CapturedImage::new(full, None)),
        Some(r) => {
            r.validate_within(full.width(), full.height())?;
            let cropped = image::imageops::crop_imm(&full, r.x, r.y, r.width, r.height).to_image();
            Ok(CapturedImage::new(cropped, Some(r)))
        }
    }
}

pub trait ScreenCapture: Send + Sync {
    fn capture(&self, region: Option<Region>) -> ToolkitResult<CapturedImage>;

    /// Current screen dimensions. Defaults to measuring a full capture.
    fn screen_size(&self) -> ToolkitResult<(u32, u32)> {
        let frame = self.capture(None)?;
        Ok((frame.width(), frame.height()))
    }
}

// ---------------------------------------------------------------------------
// Live capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureTool {
    /// macOS `screencapture`.
    Screencapture,
    /// Wayland `grim`.
    Grim,
    /// X11 `scrot`.
    Scrot,
    /// ImageMagick `import`.
    Import,
}

impl CaptureTool {
    fn program(self) -> &'static str {
        match self {
            CaptureTool::Screencapture => "screencapture",
            CaptureTool::Grim => "grim",
            CaptureTool::Scrot => "scrot",
            CaptureTool::Import => "import",
        }
    }
}

/// Captures the real display through a screenshot tool.
#[derive(Debug)]
pub struct LiveCapture {
    tool: CaptureTool,
}

impl LiveCapture {
    /// Probe for a display and a usable screenshot tool.
    pub fn detect() -> ToolkitResult<Self> {
        if !host::display_available() {
            return Err(ToolkitError::Unavailable(
                "no display (DISPLAY/WAYLAND_DISPLAY unset)".into(),
            ));
        }

        let candidates: &[CaptureTool] = if cfg!(target_os = "macos") {
            &[CaptureTool::Screencapture]
        } else if host::is_wayland() {
            &[CaptureTool::Grim]
        } else {
            &[CaptureTool::Scrot, CaptureTool::Import]
        };

        candidates
            .iter()
            .copied()
            .find(|tool| host::command_exists(tool.program()))
            .map(|tool| {
                tracing::info!(tool = tool.program(), "detected screen capture tool");
                Self { tool }
            })
            .ok_or_else(|| {
                ToolkitError::Unavailable(
                    "no screen capture tool found (install scrot, grim or ImageMagick)".into(),
                )
            })
    }

    fn grab_full(&self) -> ToolkitResult<RgbaImage> {
        let file = tempfile::Builder::new()
            .prefix("jarvis_capture_")
            .suffix(".png")
            .tempfile()?;
        let path = file.path().to_string_lossy().into_owned();
        let path = path.as_str();

        let args: Vec<&str> = match self.tool {
            CaptureTool::Screencapture => vec!["-x", "-t", "png", path],
            CaptureTool::Grim => vec![path],
            CaptureTool::Scrot => vec!["-o", path],
            CaptureTool::Import => vec!["-window", "root", path],
        };
        host::run_tool(self.tool.program(), args)?;

        Ok(image::open(file.path())?.to_rgba8())
    }
}

impl ScreenCapture for LiveCapture {
    fn capture(&self, region: Option<Region>) -> ToolkitResult<CapturedImage> {
        crop_to_region(self.grab_full()?, region)
    }

    fn screen_size(&self) -> ToolkitResult<(u32, u32)> {
        if matches!(self.tool, CaptureTool::Scrot | CaptureTool::Import)
            && host::command_exists("xdotool")
        {
            let out = host::run_tool("xdotool", ["getdisplaygeometry"])?;
            if let Some(size) = parse_geometry(&out) {
                return Ok(size);
            }
        }
        let frame = self.capture(None)?;
        Ok((frame.width(), frame.height()))
    }
}

/// Parse `"1920 1080"` as printed by `xdotool getdisplaygeometry`.
fn parse_geometry(out: &str) -> Option<(u32, u32)> {
    let mut parts = out.split_whitespace().map(str::parse::<u32>);
    match (parts.next(), parts.next()) {
        (Some(Ok(w)), Some(Ok(h))) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Simulated screen
// ---------------------------------------------------------------------------

/// Background colour of a fresh simulated screen.
pub const SIMULATED_BACKGROUND: Rgba<u8> = Rgba([32, 32, 32, 255]);

/// In-memory screen for tests and headless hosts.
#[derive(Debug)]
pub struct SimulatedScreen {
    canvas: Mutex<RgbaImage>,
}

impl SimulatedScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, SIMULATED_BACKGROUND))
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            canvas: Mutex::new(image),
        }
    }

    /// Draw `image` with its top-left corner at `(x, y)`, clipped to the canvas.
    pub fn paint(&self, x: u32, y: u32, image: &RgbaImage) -> ToolkitResult<()> {
        let mut canvas = self.lock()?;
        image::imageops::replace(&mut *canvas, image, i64::from(x), i64::from(y));
        Ok(())
    }

    /// Replace the whole canvas.
    pub fn set_image(&self, image: RgbaImage) -> ToolkitResult<()> {
        *self.lock()? = image;
        Ok(())
    }

    fn lock(&self) -> ToolkitResult<std::sync::MutexGuard<'_, RgbaImage>> {
        self.canvas
            .lock()
            .map_err(|_| ToolkitError::Other("simulated screen lock poisoned".into()))
    }
}

impl ScreenCapture for SimulatedScreen {
    fn capture(&self, region: Option<Region>) -> ToolkitResult<CapturedImage> {
        let frame = self.lock()?.clone();
        crop_to_region(frame, region)
    }

    fn screen_size(&self) -> ToolkitResult<(u32, u32)> {
        let canvas = self.lock()?;
        Ok((canvas.width(), canvas.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_capture_full_and_region() {
        let screen = SimulatedScreen::new(64, 48);
        let marker = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        screen.paint(10, 20, &marker).unwrap();

        let full = screen.capture(None).unwrap();
        assert_eq!((full.width(), full.height()), (64, 48));
        assert_eq!(full.origin(), (0, 0));
        assert_eq!(full.image().get_pixel(11, 21), &Rgba([255, 0, 0, 255]));

        let part = screen.capture(Some(Region::new(10, 20, 8, 8))).unwrap();
        assert_eq!((part.width(), part.height()), (8, 8));
        assert_eq!(part.origin(), (10, 20));
        assert_eq!(part.image().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(part.image().get_pixel(5, 5), &SIMULATED_BACKGROUND);
    }

    #[test]
    fn region_outside_screen_is_rejected() {
        let screen = SimulatedScreen::new(32, 32);
        let err = screen.capture(Some(Region::new(30, 0, 4, 4))).unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidArgument(_)));
        let err = screen.capture(Some(Region::new(0, 0, 0, 4))).unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidArgument(_)));
    }

    #[test]
    fn png_round_trip_preserves_size() {
        let dir = tempfile::tempdir().unwrap();
        let frame = SimulatedScreen::new(16, 9).capture(None).unwrap();
        let path = dir.path().join("shot.png");
        frame.save_png(&path).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (16, 9));
        assert!(!frame.to_png_bytes().unwrap().is_empty());
    }

    #[test]
    fn display_geometry_parsing() {
        assert_eq!(parse_geometry("1920 1080\n"), Some((1920, 1080)));
        assert_eq!(parse_geometry("0 0"), None);
        assert_eq!(parse_geometry("garbage"), None);
    }

    #[test]
    fn screen_size_matches_canvas() {
        let screen = SimulatedScreen::new(1920, 1080);
        assert_eq!(screen.screen_size().unwrap(), (1920, 1080));
    }
}
