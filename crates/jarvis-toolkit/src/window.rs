//! Window listing and focus control.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::host;
use crate::{ToolkitError, ToolkitResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: String,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub trait WindowManager: Send + Sync {
    fn list_windows(&self) -> ToolkitResult<Vec<WindowInfo>>;
    fn focus(&self, window: &WindowInfo) -> ToolkitResult<()>;
}

/// Focus the first window whose title contains `title`, ignoring case.
pub fn activate_window(manager: &dyn WindowManager, title: &str) -> ToolkitResult<WindowInfo> {
    let needle = title.trim().to_lowercase();
    if needle.is_empty() {
        return Err(ToolkitError::InvalidArgument("window title is empty".into()));
    }
    let window = manager
        .list_windows()?
        .into_iter()
        .find(|w| w.title.to_lowercase().contains(&needle))
        .ok_or_else(|| ToolkitError::NotFound(format!("window with title '{title}' not found")))?;
    manager.focus(&window)?;
    tracing::info!(id = %window.id, title = %window.title, "window activated");
    Ok(window)
}

/// X11 window control through `wmctrl`.
#[derive(Debug)]
pub struct WmctrlWindows;

impl WmctrlWindows {
    pub fn detect() -> ToolkitResult<Self> {
        if host::display_available() && host::command_exists("wmctrl") {
            Ok(Self)
        } else {
            Err(ToolkitError::Unavailable(
                "window control requires wmctrl and a display".into(),
            ))
        }
    }
}

impl WindowManager for WmctrlWindows {
    fn list_windows(&self) -> ToolkitResult<Vec<WindowInfo>> {
        let out = host::run_tool("wmctrl", ["-lG"])?;
        Ok(parse_wmctrl(&out))
    }

    fn focus(&self, window: &WindowInfo) -> ToolkitResult<()> {
        host::run_tool("wmctrl", ["-i", "-a", window.id.as_str()]).map(|_| ())
    }
}

/// Parse `wmctrl -lG`: `id desktop x y width height host title...`.
fn parse_wmctrl(out: &str) -> Vec<WindowInfo> {
    out.lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let id = cols.next()?.to_string();
            let _desktop = cols.next()?;
            let x = cols.next()?.parse().ok()?;
            let y = cols.next()?.parse().ok()?;
            let width = cols.next()?.parse().ok()?;
            let height = cols.next()?.parse().ok()?;
            let _host = cols.next()?;
            let title = cols.collect::<Vec<_>>().join(" ");
            Some(WindowInfo {
                id,
                title,
                x,
                y,
                width,
                height,
            })
        })
        .collect()
}

/// Fixed window list; remembers which one was focused last.
#[derive(Debug, Default)]
pub struct SimulatedWindows {
    windows: Mutex<Vec<WindowInfo>>,
    focused: Mutex<Option<String>>,
}

impl SimulatedWindows {
    pub fn new(windows: Vec<WindowInfo>) -> Self {
        Self {
            windows: Mutex::new(windows),
            focused: Mutex::new(None),
        }
    }

    pub fn focused(&self) -> Option<String> {
        self.focused.lock().ok().and_then(|f| f.clone())
    }
}

impl WindowManager for SimulatedWindows {
    fn list_windows(&self) -> ToolkitResult<Vec<WindowInfo>> {
        self.windows
            .lock()
            .map(|w| w.clone())
            .map_err(|_| ToolkitError::Other("simulated windows lock poisoned".into()))
    }

    fn focus(&self, window: &WindowInfo) -> ToolkitResult<()> {
        let mut focused = self
            .focused
            .lock()
            .map_err(|_| ToolkitError::Other("simulated windows lock poisoned".into()))?;
        *focused = Some(window.id.clone());
        Ok(())
    }
}
