//! Helpers for driving host command-line tools.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::{ToolkitError, ToolkitResult};

/// Check if a command exists on the system PATH.
pub(crate) fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether a graphical session is reachable from this process.
pub(crate) fn display_available() -> bool {
    if cfg!(target_os = "macos") || cfg!(windows) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

pub(crate) fn is_wayland() -> bool {
    std::env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty())
}

/// Run `program` to completion and return its stdout.
pub(crate) fn run_tool<I, S>(program: &str, args: I) -> ToolkitResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ToolkitError::Unavailable(format!("{program} is not installed"))
            }
            _ => ToolkitError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolkitError::Other(format!(
            "{program} failed: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_unavailable() {
        let err = run_tool("jarvis-no-such-tool-xyz", ["--version"]).unwrap_err();
        assert!(matches!(err, ToolkitError::Unavailable(_)));
        assert!(!command_exists("jarvis-no-such-tool-xyz"));
    }
}
