//! Mouse and keyboard simulation.
//!
//! [`InputSimulator`] validates arguments (screen bounds, key names, scroll
//! directions) and then hands off to an [`InputBackend`]. Backends only
//! perform the host action; they never see an out-of-bounds coordinate.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::ScreenCapture;
use crate::host;
use crate::{ToolkitError, ToolkitResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for ScrollDirection {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            _ => Err(ToolkitError::InvalidArgument(format!(
                "invalid scroll direction: {s} (expected up, down, left or right)"
            ))),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "up"),
            ScrollDirection::Down => write!(f, "down"),
            ScrollDirection::Left => write!(f, "left"),
            ScrollDirection::Right => write!(f, "right"),
        }
    }
}

/// Named keys accepted by `press`, besides single printable characters.
const NAMED_KEYS: &[&str] = &[
    "enter", "return", "tab", "space", "backspace", "delete", "del", "escape", "esc", "up",
    "down", "left", "right", "home", "end", "pageup", "pagedown", "insert", "ctrl", "control",
    "alt", "shift", "win", "super", "cmd", "command", "capslock", "printscreen", "f1", "f2",
    "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
];

/// Split `ctrl+shift+t` into validated, lower-cased key names.
pub fn parse_combo(combo: &str) -> ToolkitResult<Vec<String>> {
    let combo = combo.trim();
    if combo.is_empty() {
        return Err(ToolkitError::InvalidArgument("empty key combination".into()));
    }
    // A lone "+" is the plus key, not a separator.
    if combo == "+" {
        return Ok(vec!["+".into()]);
    }

    combo
        .split('+')
        .map(|part| {
            let key = part.trim().to_lowercase();
            let printable = key.chars().count() == 1 && key.chars().all(|c| c.is_ascii_graphic());
            if printable || NAMED_KEYS.contains(&key.as_str()) {
                Ok(key)
            } else {
                Err(ToolkitError::InvalidArgument(format!(
                    "unknown key: {}",
                    part.trim()
                )))
            }
        })
        .collect()
}

/// Host input primitives. Coordinates are already bounds-checked.
pub trait InputBackend: Send + Sync {
    fn click(&self, x: u32, y: u32, button: MouseButton, double: bool) -> ToolkitResult<()>;
    fn type_text(&self, text: &str, interval: Duration) -> ToolkitResult<()>;
    /// Press `keys` together (a chord) when more than one is given.
    fn press_keys(&self, keys: &[String]) -> ToolkitResult<()>;
    fn scroll(&self, direction: ScrollDirection, amount: u32, x: u32, y: u32) -> ToolkitResult<()>;
    fn drag(&self, from: (u32, u32), to: (u32, u32), duration: Duration) -> ToolkitResult<()>;
    fn cursor_position(&self) -> ToolkitResult<(u32, u32)>;
}

/// Validating front end over an [`InputBackend`].
#[derive(Clone)]
pub struct InputSimulator {
    backend: Arc<dyn InputBackend>,
    screen: Arc<dyn ScreenCapture>,
}

impl InputSimulator {
    pub fn new(backend: Arc<dyn InputBackend>, screen: Arc<dyn ScreenCapture>) -> Self {
        Self { backend, screen }
    }

    pub fn screen_size(&self) -> ToolkitResult<(u32, u32)> {
        self.screen.screen_size()
    }

    /// Require `0 <= x < width` and `0 <= y < height` for the current screen.
    pub fn check_bounds(&self, x: i32, y: i32) -> ToolkitResult<(u32, u32)> {
        let (width, height) = self.screen.screen_size()?;
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(ux), Ok(uy)) if ux < width && uy < height => Ok((ux, uy)),
            _ => Err(ToolkitError::OutOfBounds {
                x,
                y,
                width,
                height,
            }),
        }
    }

    pub fn click(&self, x: i32, y: i32, button: MouseButton, double: bool) -> ToolkitResult<()> {
        let (x, y) = self.check_bounds(x, y)?;
        self.backend.click(x, y, button, double)?;
        tracing::debug!(x, y, ?button, double, "click");
        Ok(())
    }

    /// Type `text`, pausing `interval_secs` between characters.
    pub fn type_text(&self, text: &str, interval_secs: f64) -> ToolkitResult<()> {
        let interval = seconds("interval", interval_secs)?;
        self.backend.type_text(text, interval)?;
        tracing::debug!(chars = text.chars().count(), "typed text");
        Ok(())
    }

    /// Press a single key or a `+`-separated chord.
    pub fn press(&self, combo: &str) -> ToolkitResult<()> {
        let keys = parse_combo(combo)?;
        self.backend.press_keys(&keys)?;
        tracing::debug!(keys = %keys.join("+"), "key press");
        Ok(())
    }

    /// Scroll at `(x, y)`, or at the pointer when no position is given.
    pub fn scroll(
        &self,
        direction: &str,
        amount: u32,
        x: Option<i32>,
        y: Option<i32>,
    ) -> ToolkitResult<()> {
        let direction: ScrollDirection = direction.parse()?;
        let (px, py) = match (x, y) {
            (None, None) => self.backend.cursor_position()?,
            _ => {
                let (cx, cy) = self.backend.cursor_position()?;
                let x = x.unwrap_or(cx as i32);
                let y = y.unwrap_or(cy as i32);
                self.check_bounds(x, y)?
            }
        };
        self.backend.scroll(direction, amount, px, py)?;
        tracing::debug!(%direction, amount, x = px, y = py, "scroll");
        Ok(())
    }

    pub fn drag(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_secs: f64) -> ToolkitResult<()> {
        let from = self.check_bounds(x0, y0)?;
        let to = self.check_bounds(x1, y1)?;
        let duration = seconds("duration", duration_secs)?;
        self.backend.drag(from, to, duration)?;
        tracing::debug!(?from, ?to, "drag");
        Ok(())
    }

    pub fn cursor_position(&self) -> ToolkitResult<(u32, u32)> {
        self.backend.cursor_position()
    }
}

pub(crate) fn seconds(name: &str, value: f64) -> ToolkitResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ToolkitError::InvalidArgument(format!(
            "{name} must be a non-negative number of seconds, got {value}"
        ))
    })
}

// ---------------------------------------------------------------------------
// xdotool (X11)
// ---------------------------------------------------------------------------

/// Live input through `xdotool`.
#[derive(Debug)]
pub struct XdotoolInput;

impl XdotoolInput {
    pub fn detect() -> ToolkitResult<Self> {
        if !host::display_available() || host::is_wayland() || cfg!(not(target_os = "linux")) {
            return Err(ToolkitError::Unavailable(
                "input simulation requires an X11 session".into(),
            ));
        }
        if !host::command_exists("xdotool") {
            return Err(ToolkitError::Unavailable("xdotool is not installed".into()));
        }
        Ok(Self)
    }

    fn button_number(button: MouseButton) -> &'static str {
        match button {
            MouseButton::Left => "1",
            MouseButton::Middle => "2",
            MouseButton::Right => "3",
        }
    }

    fn keysym(key: &str) -> String {
        let mapped = match key {
            "enter" | "return" => "Return",
            "tab" => "Tab",
            "space" | " " => "space",
            "backspace" => "BackSpace",
            "delete" | "del" => "Delete",
            "escape" | "esc" => "Escape",
            "up" => "Up",
            "down" => "Down",
            "left" => "Left",
            "right" => "Right",
            "home" => "Home",
            "end" => "End",
            "pageup" => "Page_Up",
            "pagedown" => "Page_Down",
            "insert" => "Insert",
            "ctrl" | "control" => "ctrl",
            "alt" => "alt",
            "shift" => "shift",
            "win" | "super" | "cmd" | "command" => "super",
            "capslock" => "Caps_Lock",
            "printscreen" => "Print",
            "+" => "plus",
            "-" => "minus",
            "." => "period",
            "," => "comma",
            "/" => "slash",
            other => {
                if let Some(n) = other.strip_prefix('f').filter(|n| n.parse::<u8>().is_ok()) {
                    return format!("F{n}");
                }
                return other.to_string();
            }
        };
        mapped.to_string()
    }
}

impl InputBackend for XdotoolInput {
    fn click(&self, x: u32, y: u32, button: MouseButton, double: bool) -> ToolkitResult<()> {
        let (x, y) = (x.to_string(), y.to_string());
        let mut args = vec!["mousemove", x.as_str(), y.as_str(), "click"];
        if double {
            args.extend(["--repeat", "2"]);
        }
        args.push(Self::button_number(button));
        host::run_tool("xdotool", args).map(|_| ())
    }

    fn type_text(&self, text: &str, interval: Duration) -> ToolkitResult<()> {
        let delay = interval.as_millis().to_string();
        host::run_tool("xdotool", ["type", "--delay", delay.as_str(), "--", text]).map(|_| ())
    }

    fn press_keys(&self, keys: &[String]) -> ToolkitResult<()> {
        let chord = keys
            .iter()
            .map(|k| Self::keysym(k))
            .collect::<Vec<_>>()
            .join("+");
        host::run_tool("xdotool", ["key", chord.as_str()]).map(|_| ())
    }

    fn scroll(&self, direction: ScrollDirection, amount: u32, x: u32, y: u32) -> ToolkitResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let wheel = match direction {
            ScrollDirection::Up => "4",
            ScrollDirection::Down => "5",
            ScrollDirection::Left => "6",
            ScrollDirection::Right => "7",
        };
        let (x, y, amount) = (x.to_string(), y.to_string(), amount.to_string());
        host::run_tool(
            "xdotool",
            [
                "mousemove",
                x.as_str(),
                y.as_str(),
                "click",
                "--repeat",
                amount.as_str(),
                wheel,
            ],
        )
        .map(|_| ())
    }

    fn drag(&self, from: (u32, u32), to: (u32, u32), duration: Duration) -> ToolkitResult<()> {
        let (x0, y0) = (from.0.to_string(), from.1.to_string());
        let (x1, y1) = (to.0.to_string(), to.1.to_string());
        let pause = format!("{:.3}", duration.as_secs_f64());
        host::run_tool(
            "xdotool",
            [
                "mousemove",
                x0.as_str(),
                y0.as_str(),
                "mousedown",
                "1",
                "sleep",
                pause.as_str(),
                "mousemove",
                x1.as_str(),
                y1.as_str(),
                "mouseup",
                "1",
            ],
        )
        .map(|_| ())
    }

    fn cursor_position(&self) -> ToolkitResult<(u32, u32)> {
        let out = host::run_tool("xdotool", ["getmouselocation", "--shell"])?;
        parse_mouse_location(&out).ok_or_else(|| {
            ToolkitError::Other(format!("unexpected xdotool output: {}", out.trim()))
        })
    }
}

/// Parse `X=..`/`Y=..` lines from `xdotool getmouselocation --shell`.
fn parse_mouse_location(out: &str) -> Option<(u32, u32)> {
    let mut x = None;
    let mut y = None;
    for line in out.lines() {
        if let Some(v) = line.strip_prefix("X=") {
            x = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("Y=") {
            y = v.trim().parse().ok();
        }
    }
    Some((x?, y?))
}

// ---------------------------------------------------------------------------
// Simulated
// ---------------------------------------------------------------------------

/// An input action recorded by [`SimulatedInput`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    Click {
        x: u32,
        y: u32,
        button: MouseButton,
        double: bool,
    },
    Type {
        text: String,
    },
    Keys {
        keys: Vec<String>,
    },
    Scroll {
        direction: ScrollDirection,
        amount: u32,
        x: u32,
        y: u32,
    },
    Drag {
        from: (u32, u32),
        to: (u32, u32),
    },
}

/// Records input instead of performing it, and tracks a virtual pointer.
#[derive(Debug, Default)]
pub struct SimulatedInput {
    events: Mutex<Vec<InputEvent>>,
    pointer: Mutex<(u32, u32)>,
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: InputEvent, pointer: Option<(u32, u32)>) -> ToolkitResult<()> {
        self.events
            .lock()
            .map_err(|_| ToolkitError::Other("simulated input lock poisoned".into()))?
            .push(event);
        if let Some(p) = pointer {
            if let Ok(mut guard) = self.pointer.lock() {
                *guard = p;
            }
        }
        Ok(())
    }
}

impl InputBackend for SimulatedInput {
    fn click(&self, x: u32, y: u32, button: MouseButton, double: bool) -> ToolkitResult<()> {
        self.record(
            InputEvent::Click {
                x,
                y,
                button,
                double,
            },
            Some((x, y)),
        )
    }

    fn type_text(&self, text: &str, _interval: Duration) -> ToolkitResult<()> {
        self.record(InputEvent::Type { text: text.into() }, None)
    }

    fn press_keys(&self, keys: &[String]) -> ToolkitResult<()> {
        self.record(InputEvent::Keys { keys: keys.to_vec() }, None)
    }

    fn scroll(&self, direction: ScrollDirection, amount: u32, x: u32, y: u32) -> ToolkitResult<()> {
        self.record(
            InputEvent::Scroll {
                direction,
                amount,
                x,
                y,
            },
            Some((x, y)),
        )
    }

    fn drag(&self, from: (u32, u32), to: (u32, u32), _duration: Duration) -> ToolkitResult<()> {
        self.record(InputEvent::Drag { from, to }, Some(to))
    }

    fn cursor_position(&self) -> ToolkitResult<(u32, u32)> {
        self.pointer
            .lock()
            .map(|p| *p)
            .map_err(|_| ToolkitError::Other("simulated input lock poisoned".into()))
    }
}
