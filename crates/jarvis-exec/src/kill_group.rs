//! Process-group termination for timed-out shell commands.
//!
//! Shell commands run in their own process group, so killing the group
//! also reaps grandchildren the shell spawned.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Protected PIDs that must never be signalled.
const PROTECTED_PIDS: [i32; 2] = [0, 1];

/// Send SIGKILL to the process group led by `pgid`.
pub(crate) fn kill_process_group(pgid: u32) {
    let Ok(raw) = i32::try_from(pgid) else {
        warn!(pgid, "process group id out of range, not signalling");
        return;
    };
    if PROTECTED_PIDS.contains(&raw) {
        warn!(pgid = raw, "refusing to signal protected process group");
        return;
    }

    match signal::killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid = raw, "killed process group"),
        // already gone
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = raw, error = %e, "failed to kill process group"),
    }
}
