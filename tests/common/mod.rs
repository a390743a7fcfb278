//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use jarvis_control::Assistant;
use jarvis_toolkit::automation::{AutomationSettings, BackendMode, ScreenAutomation};
use jarvis_toolkit::capture::SimulatedScreen;
use jarvis_toolkit::input::{InputBackend, SimulatedInput};
use jarvis_toolkit::vision::SimulatedOcr;
use jarvis_toolkit::window::SimulatedWindows;
use jarvis_types::{JarvisConfig, Platform};

/// Unix command tables regardless of the build target.
pub fn unix_config(dir: &Path) -> JarvisConfig {
    let mut config = JarvisConfig::default();
    config.policy.platform = Some(Platform::Unix);
    config.toolkit.screenshot_dir = dir.join("shots");
    config.toolkit.template_dir = dir.join("templates");
    config.toolkit.step_delay_ms = 0;
    config.toolkit.poll_interval_ms = 10;
    config.ledger.path = dir.join("history.db");
    config
}

/// Offline assistant rooted in `dir`.
pub fn offline_assistant(dir: &Path) -> Assistant {
    Assistant::offline(unix_config(dir))
}

pub fn settings(dir: &Path) -> AutomationSettings {
    AutomationSettings {
        screenshot_dir: dir.join("shots"),
        template_dir: dir.join("templates"),
        step_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
    }
}

/// A distinctive 6x6 gradient that matches nowhere on a flat screen.
pub fn button_pattern() -> RgbaImage {
    RgbaImage::from_fn(6, 6, |x, y| {
        Rgba([(x * 40) as u8, (y * 40) as u8, ((x + y) * 20) as u8, 255])
    })
}

/// Save the button pattern as `templates/<name>` under `dir`.
pub fn write_template(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir.join("templates")).expect("create template dir");
    button_pattern()
        .save(dir.join("templates").join(name))
        .expect("save template");
}

/// Simulated automation over a 200x100 screen with the given input backend.
pub fn automation_with(
    dir: &Path,
    input: Arc<dyn InputBackend>,
) -> (ScreenAutomation, Arc<SimulatedScreen>) {
    let screen = Arc::new(SimulatedScreen::new(200, 100));
    let automation = ScreenAutomation::from_parts(
        BackendMode::Simulated,
        settings(dir),
        screen.clone(),
        input,
        Arc::new(SimulatedOcr::new()),
        Arc::new(SimulatedWindows::default()),
    );
    (automation, screen)
}

pub fn simulated_automation(dir: &Path) -> (ScreenAutomation, Arc<SimulatedScreen>, Arc<SimulatedInput>) {
    let input = Arc::new(SimulatedInput::new());
    let (automation, screen) = automation_with(dir, input.clone());
    (automation, screen, input)
}
