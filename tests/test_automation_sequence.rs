//! Screen automation sequences over the simulated backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use jarvis_toolkit::input::{InputBackend, InputEvent, MouseButton, ScrollDirection, SimulatedInput};
use jarvis_toolkit::sequence::parse_sequence;
use jarvis_toolkit::vision::{BoundingBox, SimulatedOcr, Word};
use jarvis_toolkit::{RawAction, ToolkitError, ToolkitResult};
use jarvis_types::ErrorKind;

/// Input backend whose keyboard is broken.
#[derive(Default)]
struct BrokenKeyboard {
    inner: SimulatedInput,
}

impl InputBackend for BrokenKeyboard {
    fn click(&self, x: u32, y: u32, button: MouseButton, double: bool) -> ToolkitResult<()> {
        self.inner.click(x, y, button, double)
    }

    fn type_text(&self, _text: &str, _interval: Duration) -> ToolkitResult<()> {
        Err(ToolkitError::Other("keyboard unplugged".into()))
    }

    fn press_keys(&self, keys: &[String]) -> ToolkitResult<()> {
        self.inner.press_keys(keys)
    }

    fn scroll(&self, direction: ScrollDirection, amount: u32, x: u32, y: u32) -> ToolkitResult<()> {
        self.inner.scroll(direction, amount, x, y)
    }

    fn drag(&self, from: (u32, u32), to: (u32, u32), duration: Duration) -> ToolkitResult<()> {
        self.inner.drag(from, to, duration)
    }

    fn cursor_position(&self) -> ToolkitResult<(u32, u32)> {
        self.inner.cursor_position()
    }
}

#[test]
fn failing_type_step_stops_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let keyboard = Arc::new(BrokenKeyboard::default());
    let (automation, _screen) = common::automation_with(dir.path(), keyboard.clone());

    let result = automation.run_sequence(&[
        RawAction::new("screenshot", json!({ "filename": "before.png" })),
        RawAction::new("type", json!({ "text": "hello" })),
        RawAction::new("key", json!({ "key_combination": "ctrl+s" })),
    ]);

    assert!(!result.success);
    assert_eq!(result.total, 3);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps[0].success);
    assert_eq!(result.steps[1].action_type, "type");
    assert_eq!(result.steps[1].error.as_deref(), Some("toolkit error: keyboard unplugged"));
    assert!(dir.path().join("shots/before.png").exists());
    assert!(keyboard.inner.events().is_empty(), "key step must not run");
}

#[test]
fn click_image_clicks_the_match_centre() {
    let dir = tempfile::tempdir().unwrap();
    common::write_template(dir.path(), "button.png");
    let (automation, screen, input) = common::simulated_automation(dir.path());
    screen.paint(50, 40, &common::button_pattern()).unwrap();

    let result = automation.run_sequence(&[
        RawAction::new("wait_for_image", json!({ "template_image": "button.png", "timeout": 1.0, "confidence": 0.95 })),
        RawAction::new("click_image", json!({ "template_image": "button.png", "confidence": 0.95 })),
    ]);

    assert!(result.success, "{:?}", result.steps);
    assert_eq!(
        input.events(),
        vec![InputEvent::Click {
            x: 53,
            y: 43,
            button: MouseButton::Left,
            double: false,
        }]
    );
}

#[test]
fn wait_for_missing_image_times_out() {
    let dir = tempfile::tempdir().unwrap();
    common::write_template(dir.path(), "button.png");
    let (automation, _screen, input) = common::simulated_automation(dir.path());

    let result = automation.run_sequence(&[
        RawAction::new("wait_for_image", json!({ "template_image": "button.png", "timeout": 0.2, "confidence": 0.95 })),
        RawAction::new("click", json!({ "x": 1, "y": 1 })),
    ]);

    assert!(!result.success);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].error_kind, Some(ErrorKind::Timeout));
    assert!(input.events().is_empty());
}

#[test]
fn ocr_step_drops_low_confidence_words() {
    let dir = tempfile::tempdir().unwrap();
    let screen = Arc::new(jarvis_toolkit::capture::SimulatedScreen::new(200, 100));
    let ocr = Arc::new(SimulatedOcr::new());
    let word = |text: &str, confidence: f32, x: u32| Word {
        text: text.into(),
        confidence,
        bbox: BoundingBox {
            x,
            y: 5,
            width: 20,
            height: 10,
        },
    };
    ocr.set_words(vec![word("Save", 91.0, 10), word("~", 12.0, 40), word("File", 30.0, 60)]);
    let automation = jarvis_toolkit::ScreenAutomation::from_parts(
        jarvis_toolkit::BackendMode::Simulated,
        common::settings(dir.path()),
        screen,
        Arc::new(SimulatedInput::new()),
        ocr,
        Arc::new(jarvis_toolkit::window::SimulatedWindows::default()),
    );

    let result = automation.run_sequence(&[RawAction::new(
        "ocr",
        json!({ "region": { "x": 100, "y": 50, "width": 50, "height": 20 } }),
    )]);

    assert!(result.success, "{:?}", result.steps);
    let detail = result.steps[0].detail.as_ref().unwrap();
    assert_eq!(detail["full_text"], "Save ~ File");
    assert_eq!(detail["word_count"], 1);
    assert_eq!(detail["words"][0]["text"], "Save");
    assert_eq!(detail["words"][0]["bbox"]["x"], 110);
    assert_eq!(detail["words"][0]["bbox"]["y"], 55);
}

#[test]
fn sequence_file_with_unknown_action_fails_at_that_step() {
    let dir = tempfile::tempdir().unwrap();
    let (automation, _screen, input) = common::simulated_automation(dir.path());

    let (name, steps) = parse_sequence(
        r#"{"name": "demo", "sequence": [
            {"type": "click", "params": {"x": 10, "y": 10}},
            {"type": "teleport", "params": {}},
            {"type": "click", "params": {"x": 20, "y": 20}}
        ]}"#,
    )
    .unwrap();
    assert_eq!(name.as_deref(), Some("demo"));

    let result = automation.run_sequence(&steps);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.steps[1].error_kind, Some(ErrorKind::UnknownActionType));
    assert_eq!(input.events().len(), 1);
}

#[tokio::test]
async fn assistant_records_sequence_history() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = common::offline_assistant(dir.path());

    let result = assistant
        .run_sequence(
            "bob",
            Some("save-dialog"),
            vec![
                RawAction::new("click", json!({ "x": 5, "y": 5 })),
                RawAction::new("key", json!({ "key_combination": "ctrl+s" })),
            ],
        )
        .await;
    assert!(result.success, "{:?}", result.steps);

    let history = assistant.history("bob", None, 5).data.unwrap();
    assert_eq!(history.records.len(), 1);
    assert_eq!(history.records[0].summary, "save-dialog (2/2 steps)");
    assert!(history.records[0].success);
}
