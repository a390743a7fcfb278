//! Ordered multi-step automation.
//!
//! A sequence is a list of `{type, params}` objects. Each entry is decoded
//! into an [`AutomationAction`] just before it runs, so an unknown `type`
//! fails that step (and stops the run) instead of rejecting the whole
//! sequence up front.
//!
//! Steps run strictly in order. The first failing step ends the run;
//! `steps` then holds only the steps that were attempted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use jarvis_types::ErrorKind;

use crate::automation::ScreenAutomation;
use crate::capture::Region;
use crate::input::{seconds, MouseButton};
use crate::matcher::DEFAULT_CONFIDENCE;
use crate::{ToolkitError, ToolkitResult};

/// Every tag [`AutomationAction`] accepts.
pub const ACTION_TYPES: &[&str] = &[
    "click",
    "click_image",
    "type",
    "key",
    "scroll",
    "wait",
    "screenshot",
    "ocr",
    "wait_for_image",
];

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

fn default_interval() -> f64 {
    0.01
}

fn default_scroll_amount() -> u32 {
    3
}

fn default_wait() -> f64 {
    1.0
}

fn default_language() -> String {
    "eng".into()
}

fn default_wait_timeout() -> f64 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum AutomationAction {
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        double_click: bool,
    },
    ClickImage {
        template_image: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default)]
        double_click: bool,
    },
    Type {
        text: String,
        #[serde(default = "default_interval")]
        interval: f64,
    },
    Key {
        key_combination: String,
    },
    Scroll {
        direction: String,
        #[serde(default = "default_scroll_amount")]
        amount: u32,
        #[serde(default)]
        x: Option<i32>,
        #[serde(default)]
        y: Option<i32>,
    },
    Wait {
        #[serde(default = "default_wait")]
        seconds: f64,
    },
    Screenshot {
        #[serde(default)]
        region: Option<Region>,
        #[serde(default)]
        filename: Option<String>,
    },
    Ocr {
        #[serde(default)]
        region: Option<Region>,
        #[serde(default = "default_language")]
        lang: String,
    },
    WaitForImage {
        template_image: String,
        #[serde(default = "default_wait_timeout")]
        timeout: f64,
        #[serde(default = "default_confidence")]
        confidence: f32,
    },
}

impl AutomationAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            AutomationAction::Click { .. } => "click",
            AutomationAction::ClickImage { .. } => "click_image",
            AutomationAction::Type { .. } => "type",
            AutomationAction::Key { .. } => "key",
            AutomationAction::Scroll { .. } => "scroll",
            AutomationAction::Wait { .. } => "wait",
            AutomationAction::Screenshot { .. } => "screenshot",
            AutomationAction::Ocr { .. } => "ocr",
            AutomationAction::WaitForImage { .. } => "wait_for_image",
        }
    }
}

/// An undecoded sequence entry as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

impl RawAction {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    pub fn decode(&self) -> ToolkitResult<AutomationAction> {
        if !ACTION_TYPES.contains(&self.kind.as_str()) {
            return Err(ToolkitError::UnknownActionType(self.kind.clone()));
        }
        let params = match &self.params {
            Value::Null => json!({}),
            other => other.clone(),
        };
        serde_json::from_value(json!({ "type": self.kind, "params": params })).map_err(|e| {
            ToolkitError::InvalidArgument(format!("invalid params for '{}': {e}", self.kind))
        })
    }
}

impl From<AutomationAction> for RawAction {
    fn from(action: AutomationAction) -> Self {
        let kind = action.action_type().to_string();
        let params = serde_json::to_value(&action)
            .ok()
            .and_then(|mut v| v.get_mut("params").map(Value::take))
            .unwrap_or(Value::Null);
        Self { kind, params }
    }
}

/// Accepts a bare array of actions or `{name, sequence}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SequenceDocument {
    Bare(Vec<RawAction>),
    Named {
        #[serde(default)]
        name: Option<String>,
        sequence: Vec<RawAction>,
    },
}

/// Parse a sequence document; returns its optional name and the steps.
pub fn parse_sequence(json: &str) -> ToolkitResult<(Option<String>, Vec<RawAction>)> {
    let doc: SequenceDocument = serde_json::from_str(json)
        .map_err(|e| ToolkitError::InvalidArgument(format!("invalid sequence document: {e}")))?;
    Ok(match doc {
        SequenceDocument::Bare(steps) => (None, steps),
        SequenceDocument::Named { name, sequence } => (name, sequence),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub action_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub success: bool,
    /// Number of actions supplied.
    pub total: usize,
    pub succeeded: usize,
    /// One entry per attempted step.
    pub steps: Vec<StepResult>,
    pub timestamp: DateTime<Utc>,
}

impl ScreenAutomation {
    /// Run `actions` in order, stopping at the first failure.
    pub fn run_sequence(&self, actions: &[RawAction]) -> SequenceResult {
        let mut steps = Vec::with_capacity(actions.len());
        let mut succeeded = 0;

        for (index, raw) in actions.iter().enumerate() {
            let outcome = raw.decode().and_then(|action| self.perform(&action));
            match outcome {
                Ok(detail) => {
                    succeeded += 1;
                    steps.push(StepResult {
                        index,
                        action_type: raw.kind.clone(),
                        success: true,
                        error: None,
                        error_kind: None,
                        detail: Some(detail),
                    });
                    std::thread::sleep(self.settings().step_delay);
                }
                Err(e) => {
                    warn!(index, action = %raw.kind, error = %e, "sequence step failed");
                    steps.push(StepResult {
                        index,
                        action_type: raw.kind.clone(),
                        success: false,
                        error: Some(e.to_string()),
                        error_kind: Some(e.kind()),
                        detail: None,
                    });
                    break;
                }
            }
        }

        info!(total = actions.len(), succeeded, "sequence finished");
        SequenceResult {
            success: succeeded == actions.len(),
            total: actions.len(),
            succeeded,
            steps,
            timestamp: Utc::now(),
        }
    }

    /// Execute one decoded action and describe what it did.
    pub fn perform(&self, action: &AutomationAction) -> ToolkitResult<Value> {
        match action {
            AutomationAction::Click {
                x,
                y,
                button,
                double_click,
            } => {
                self.click(*x, *y, *button, *double_click)?;
                Ok(json!({ "x": x, "y": y, "button": button }))
            }
            AutomationAction::ClickImage {
                template_image,
                confidence,
                double_click,
            } => {
                let found = self.click_on_template(template_image, *confidence, *double_click)?;
                let (cx, cy) = found.center();
                Ok(json!({ "match": found, "clicked": [cx, cy] }))
            }
            AutomationAction::Type { text, interval } => {
                self.type_text(text, *interval)?;
                Ok(json!({ "chars": text.chars().count() }))
            }
            AutomationAction::Key { key_combination } => {
                self.press(key_combination)?;
                Ok(json!({ "keys": key_combination }))
            }
            AutomationAction::Scroll {
                direction,
                amount,
                x,
                y,
            } => {
                self.scroll(direction, *amount, *x, *y)?;
                Ok(json!({ "direction": direction, "amount": amount }))
            }
            AutomationAction::Wait { seconds: secs } => {
                std::thread::sleep(seconds("seconds", *secs)?);
                Ok(json!({ "seconds": secs }))
            }
            AutomationAction::Screenshot { region, filename } => {
                let shot = self.screenshot(*region, filename.as_deref())?;
                Ok(serde_json::to_value(&shot).unwrap_or(Value::Null))
            }
            AutomationAction::Ocr { region, lang } => {
                let result = self.extract_text(*region, lang)?;
                Ok(json!({
                    "full_text": result.full_text,
                    "word_count": result.word_count(),
                    "words": result.words,
                }))
            }
            AutomationAction::WaitForImage {
                template_image,
                timeout,
                confidence,
            } => {
                let found = self.wait_for_template(template_image, *timeout, *confidence)?;
                Ok(json!({ "match": found }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{AutomationSettings, BackendMode};
    use crate::capture::SimulatedScreen;
    use crate::input::{InputBackend, InputEvent, ScrollDirection, SimulatedInput};
    use crate::vision::SimulatedOcr;
    use crate::window::SimulatedWindows;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    /// Records like [`SimulatedInput`] but refuses to type.
    struct BrokenKeyboard(SimulatedInput);

    impl InputBackend for BrokenKeyboard {
        fn click(&self, x: u32, y: u32, b: MouseButton, d: bool) -> ToolkitResult<()> {
            self.0.click(x, y, b, d)
        }
        fn type_text(&self, _text: &str, _interval: Duration) -> ToolkitResult<()> {
            Err(ToolkitError::Other("keyboard unavailable".into()))
        }
        fn press_keys(&self, keys: &[String]) -> ToolkitResult<()> {
            self.0.press_keys(keys)
        }
        fn scroll(&self, d: ScrollDirection, n: u32, x: u32, y: u32) -> ToolkitResult<()> {
            self.0.scroll(d, n, x, y)
        }
        fn drag(&self, a: (u32, u32), b: (u32, u32), t: Duration) -> ToolkitResult<()> {
            self.0.drag(a, b, t)
        }
        fn cursor_position(&self) -> ToolkitResult<(u32, u32)> {
            self.0.cursor_position()
        }
    }

    fn settings(dir: &Path) -> AutomationSettings {
        AutomationSettings {
            screenshot_dir: dir.to_path_buf(),
            template_dir: dir.to_path_buf(),
            step_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn steps(json: Value) -> Vec<RawAction> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn failing_step_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let automation = ScreenAutomation::from_parts(
            BackendMode::Simulated,
            settings(dir.path()),
            Arc::new(SimulatedScreen::new(100, 100)),
            Arc::new(BrokenKeyboard(SimulatedInput::new())),
            Arc::new(SimulatedOcr::new()),
            Arc::new(SimulatedWindows::default()),
        );
        let actions = steps(json!([
            { "type": "screenshot", "params": {} },
            { "type": "type", "params": { "text": "x" } },
            { "type": "key", "params": { "key_combination": "unknown-key!!" } },
        ]));

        let result = automation.run_sequence(&actions);
        assert!(!result.success);
        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.steps.len(), 2);
        assert!(result.steps[0].success);
        assert_eq!(result.steps[1].action_type, "type");
        assert_eq!(result.steps[1].error.as_deref(), Some("toolkit error: keyboard unavailable"));
        assert_eq!(result.steps[1].error_kind, Some(ErrorKind::Backend));
    }

    #[test]
    fn unknown_action_type_fails_its_step() {
        let dir = tempfile::tempdir().unwrap();
        let automation = ScreenAutomation::simulated(settings(dir.path()), 100, 100);
        let actions = steps(json!([
            { "type": "wait", "params": { "seconds": 0 } },
            { "type": "teleport", "params": {} },
            { "type": "wait" },
        ]));

        let result = automation.run_sequence(&actions);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].error_kind, Some(ErrorKind::UnknownActionType));
        assert_eq!(
            result.steps[1].error.as_deref(),
            Some("unknown action type: teleport")
        );
    }

    #[test]
    fn out_of_bounds_click_fails() {
        let dir = tempfile::tempdir().unwrap();
        let automation = ScreenAutomation::simulated(settings(dir.path()), 100, 50);
        let actions = steps(json!([{ "type": "click", "params": { "x": 100, "y": 10 } }]));
        let result = automation.run_sequence(&actions);
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.steps[0].error_kind, Some(ErrorKind::OutOfBounds));
    }

    #[test]
    fn successful_run_reports_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let input = Arc::new(SimulatedInput::new());
        let automation = ScreenAutomation::from_parts(
            BackendMode::Simulated,
            settings(dir.path()),
            Arc::new(SimulatedScreen::new(100, 100)),
            input.clone(),
            Arc::new(SimulatedOcr::new()),
            Arc::new(SimulatedWindows::default()),
        );
        let actions = steps(json!([
            { "type": "click", "params": { "x": 10, "y": 20, "button": "right" } },
            { "type": "type", "params": { "text": "hello", "interval": 0 } },
            { "type": "key", "params": { "key_combination": "ctrl+s" } },
            { "type": "scroll", "params": { "direction": "down" } },
            { "type": "ocr", "params": { "region": [0, 0, 50, 50] } },
        ]));

        let result = automation.run_sequence(&actions);
        assert!(result.success, "{result:?}");
        assert_eq!(result.succeeded, 5);
        assert_eq!(input.events().len(), 4);
        assert_eq!(
            input.events()[3],
            InputEvent::Scroll {
                direction: ScrollDirection::Down,
                amount: 3,
                x: 10,
                y: 20
            }
        );
    }

    #[test]
    fn bad_params_are_invalid_arguments() {
        let raw = RawAction::new("click", json!({ "x": "left" }));
        assert!(matches!(raw.decode(), Err(ToolkitError::InvalidArgument(_))));

        let raw = RawAction::new("wait", json!({ "seconds": -1.0 }));
        let dir = tempfile::tempdir().unwrap();
        let automation = ScreenAutomation::simulated(settings(dir.path()), 10, 10);
        let result = automation.run_sequence(&[raw]);
        assert_eq!(result.steps[0].error_kind, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn defaults_fill_missing_params() {
        let action = RawAction::new("click_image", json!({ "template_image": "ok.png" }))
            .decode()
            .unwrap();
        assert_eq!(
            action,
            AutomationAction::ClickImage {
                template_image: "ok.png".into(),
                confidence: 0.8,
                double_click: false
            }
        );
        let wait = RawAction::new("wait", Value::Null).decode().unwrap();
        assert_eq!(wait, AutomationAction::Wait { seconds: 1.0 });
    }

    #[test]
    fn action_round_trips_through_raw_form() {
        let action = AutomationAction::Key {
            key_combination: "alt+tab".into(),
        };
        let raw = RawAction::from(action.clone());
        assert_eq!(raw.kind, "key");
        assert_eq!(raw.decode().unwrap(), action);
    }

    #[test]
    fn sequence_documents_parse_in_both_shapes() {
        let (name, bare) = parse_sequence(r#"[{"type":"wait","params":{"seconds":0}}]"#).unwrap();
        assert!(name.is_none());
        assert_eq!(bare.len(), 1);

        let (name, named) =
            parse_sequence(r#"{"name":"demo","sequence":[{"type":"key","params":{"key_combination":"enter"}}]}"#)
                .unwrap();
        assert_eq!(name.as_deref(), Some("demo"));
        assert_eq!(named[0].kind, "key");

        assert!(parse_sequence("{}").is_err());
    }
}
