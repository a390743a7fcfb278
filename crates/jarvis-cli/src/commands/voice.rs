use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use jarvis_control::Assistant;

use super::{emit, print_json};

/// Start the wake listener and print detections as JSON until `count`
/// detections or Ctrl-C.
pub async fn listen(assistant: &Assistant, phrase: Option<&str>, count: Option<u64>) -> Result<ExitCode> {
    let mut events = assistant.subscribe_wake();
    let started = assistant.start_wake(phrase);
    if !started.success {
        return emit(&started);
    }
    eprintln!(
        "Listening for \"{}\" (Ctrl-C to stop)",
        started
            .data
            .as_ref()
            .and_then(|s| s.phrase.as_deref())
            .unwrap_or_default()
    );

    let mut seen = 0u64;
    let mut health = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = health.tick() => {}
            event = events.recv() => match event {
                Ok(event) => {
                    print_json(&event, true)?;
                    seen += 1;
                    if count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped wake events"),
                Err(RecvError::Closed) => break,
            },
        }
        if !assistant.wake_status().data.is_some_and(|s| s.listening) {
            warn!("wake listener stopped");
            break;
        }
    }

    emit(&assistant.stop_wake())
}
