//! The assistant facade.
//!
//! [`Assistant`] owns one instance of every component and is the only
//! thing a front end (the CLI, or any request handler) talks to. Each
//! public method returns a result value with a `success` flag and never
//! an `Err`; command execution, interpretation, batch and sequence calls
//! also leave one history record tagged with the caller's identity.
//!
//! The toolkit is synchronous and drives the host's single mouse and
//! keyboard, so automation work runs on the blocking pool. Callers that
//! issue concurrent automation requests race for the pointer; nothing
//! here serializes them.

use std::sync::Arc;

use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use jarvis_exec::{BatchResult, CommandExecutor, ExecutionResult};
use jarvis_interpret::{Interpretation, Interpreter};
use jarvis_ledger::{HistoryKind, HistoryRecord, HistorySink, HistoryStore, MemoryHistory};
use jarvis_policy::PolicyEngine;
use jarvis_toolkit::{
    AutomationSettings, OcrResult, RawAction, Region, ScreenAutomation, SequenceResult,
    ToolkitError, ToolkitResult, WindowInfo,
};
use jarvis_types::{Command, JarvisConfig, JarvisError};
use jarvis_voice::{WakeEvent, WakeListener, WakeSettings, WakeStatus};

use crate::response::{
    ActionReport, HistoryReport, MatchList, PipelineResult, Response, SafeCommandList,
    ScreenshotReport, Stage, StatusReport, TemplateList, WindowList,
};

/// Identity used when the caller does not supply one.
pub const DEFAULT_USER: &str = "default";

/// Pre-built components for [`Assistant::with_components`].
pub struct Components {
    pub interpreter: Interpreter,
    pub automation: ScreenAutomation,
    pub wake: WakeListener,
    pub history: Arc<dyn HistorySink>,
}

pub struct Assistant {
    config: JarvisConfig,
    policy: PolicyEngine,
    executor: CommandExecutor,
    interpreter: Interpreter,
    automation: Arc<ScreenAutomation>,
    wake: WakeListener,
    history: Arc<dyn HistorySink>,
}

impl Assistant {
    /// Build every component from configuration.
    ///
    /// Only an explicitly requested live toolkit that cannot start is an
    /// error. A missing translation key, audio device or unwritable ledger
    /// leaves that component degraded and is logged once.
    pub async fn from_config(config: JarvisConfig) -> Result<Self, JarvisError> {
        let policy = PolicyEngine::for_platform(config.policy.effective_platform());

        let interpreter = match Interpreter::from_config(policy, &config.interpreter) {
            Ok(interpreter) => interpreter,
            Err(e) => {
                warn!(error = %e, "translation service disabled, using fallback table only");
                Interpreter::local(policy)
            }
        };

        let automation = ScreenAutomation::from_config(&config.toolkit)
            .map_err(|e| JarvisError::Unavailable(e.to_string()))?;

        let wake = WakeListener::from_config(&config.voice).await;
        if !wake.is_available() {
            warn!("wake listener unavailable; start requests will fail");
        }

        let history: Arc<dyn HistorySink> = match HistoryStore::open(&config.ledger.path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "history ledger unavailable, keeping history in memory");
                Arc::new(MemoryHistory::new())
            }
        };

        Ok(Self::with_components(
            config,
            Components {
                interpreter,
                automation,
                wake,
                history,
            },
        ))
    }

    pub fn with_components(config: JarvisConfig, components: Components) -> Self {
        let policy = PolicyEngine::for_platform(config.policy.effective_platform());
        let executor = CommandExecutor::new(policy, &config.executor);
        Self {
            config,
            policy,
            executor,
            interpreter: components.interpreter,
            automation: Arc::new(components.automation),
            wake: components.wake,
            history: components.history,
        }
    }

    /// Fully offline assistant: fallback interpretation, simulated screen,
    /// no audio and in-memory history.
    pub fn offline(config: JarvisConfig) -> Self {
        let policy = PolicyEngine::for_platform(config.policy.effective_platform());
        let automation = ScreenAutomation::simulated(
            AutomationSettings::from(&config.toolkit),
            config.toolkit.simulated_width,
            config.toolkit.simulated_height,
        );
        let wake = WakeListener::unavailable(
            WakeSettings::from(&config.voice),
            "voice input disabled in offline mode",
        );
        Self::with_components(
            config,
            Components {
                interpreter: Interpreter::local(policy),
                automation,
                wake,
                history: Arc::new(MemoryHistory::new()),
            },
        )
    }

    pub fn config(&self) -> &JarvisConfig {
        &self.config
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn automation(&self) -> &Arc<ScreenAutomation> {
        &self.automation
    }

    pub fn wake(&self) -> &WakeListener {
        &self.wake
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub async fn execute_command(&self, user: &str, command: &str) -> ExecutionResult {
        let result = self.executor.execute(command).await;
        self.record(user, HistoryKind::Command, result.success, command, &result)
            .await;
        result
    }

    pub async fn interpret(&self, user: &str, request: &str) -> Interpretation {
        let result = self.interpreter.interpret(request).await;
        self.record(user, HistoryKind::Interpretation, result.success, request, &result)
            .await;
        result
    }

    /// Interpret `request`, then run the command it produced.
    pub async fn run_natural_language(&self, user: &str, request: &str) -> PipelineResult {
        let interpretation = self.interpret(user, request).await;
        if !interpretation.success {
            return PipelineResult {
                success: false,
                stage: Stage::Interpretation,
                error: interpretation.error.clone(),
                interpretation,
                execution: None,
                timestamp: Utc::now(),
            };
        }

        let command = Command::interpreted(interpretation.command.as_str());
        let execution = self.executor.run(&command).await;
        self.record(
            user,
            HistoryKind::Command,
            execution.success,
            command.text(),
            &execution,
        )
        .await;
        PipelineResult {
            success: execution.success,
            stage: Stage::Execution,
            error: execution.error.clone(),
            interpretation,
            execution: Some(execution),
            timestamp: Utc::now(),
        }
    }

    pub async fn execute_batch<S: AsRef<str>>(
        &self,
        user: &str,
        name: &str,
        commands: &[S],
    ) -> Response<BatchResult> {
        let batch = self.executor.execute_batch(name, commands).await;
        self.record_batch(user, &batch).await;
        Response::ok(batch)
    }

    pub async fn execute_template(&self, user: &str, name: &str) -> Response<BatchResult> {
        match self.executor.execute_template(name).await {
            Ok(batch) => {
                self.record_batch(user, &batch).await;
                Response::ok(batch)
            }
            Err(e) => Response::fail(e.to_string(), e.kind()),
        }
    }

    pub fn list_templates(&self) -> Response<TemplateList> {
        Response::ok(TemplateList {
            platform: self.policy.platform(),
            templates: self.executor.list_templates(),
        })
    }

    /// Allowed verbs and their aliases. Denylist patterns are never listed.
    pub fn safe_commands(&self) -> Response<SafeCommandList> {
        Response::ok(SafeCommandList {
            platform: self.policy.platform(),
            commands: self.policy.safe_commands(),
        })
    }

    // -----------------------------------------------------------------------
    // Screen automation
    // -----------------------------------------------------------------------

    pub async fn run_sequence(
        &self,
        user: &str,
        name: Option<&str>,
        actions: Vec<RawAction>,
    ) -> SequenceResult {
        let total = actions.len();
        let result = self
            .blocking(move |automation| Ok(automation.run_sequence(&actions)))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "sequence task failed");
                SequenceResult {
                    success: false,
                    total,
                    succeeded: 0,
                    steps: Vec::new(),
                    timestamp: Utc::now(),
                }
            });

        let summary = format!(
            "{} ({}/{} steps)",
            name.unwrap_or("sequence"),
            result.succeeded,
            result.total
        );
        self.record(user, HistoryKind::Sequence, result.success, &summary, &result)
            .await;
        result
    }

    /// Decode and run one action outside a sequence.
    pub async fn perform_action(&self, action: RawAction) -> Response<ActionReport> {
        let action_type = action.kind.clone();
        let outcome = self
            .blocking(move |automation| automation.perform(&action.decode()?))
            .await
            .map(|detail| ActionReport {
                action_type,
                detail,
            });
        respond(outcome)
    }

    pub async fn screenshot(
        &self,
        region: Option<Region>,
        filename: Option<String>,
        include_image: bool,
    ) -> Response<ScreenshotReport> {
        let outcome = self
            .blocking(move |automation| automation.screenshot(region, filename.as_deref()))
            .await
            .map(|shot| ScreenshotReport {
                image_base64: include_image
                    .then(|| base64::engine::general_purpose::STANDARD.encode(&shot.png)),
                path: shot.path,
                filename: shot.filename,
                width: shot.width,
                height: shot.height,
            });
        respond(outcome)
    }

    pub async fn locate(
        &self,
        template: &str,
        min_confidence: f32,
        region: Option<Region>,
    ) -> Response<MatchList> {
        let template = template.to_string();
        let name = template.clone();
        let outcome = self
            .blocking(move |automation| {
                automation.locate_template(&template, min_confidence, region)
            })
            .await
            .map(|matches| MatchList {
                template: name,
                matches,
            });
        respond(outcome)
    }

    pub async fn extract_text(&self, region: Option<Region>, language: &str) -> Response<OcrResult> {
        let language = language.to_string();
        respond(
            self.blocking(move |automation| automation.extract_text(region, &language))
                .await,
        )
    }

    pub async fn list_windows(&self) -> Response<WindowList> {
        let outcome = self
            .blocking(|automation| automation.list_windows())
            .await
            .map(|windows| WindowList { windows });
        respond(outcome)
    }

    pub async fn activate_window(&self, title: &str) -> Response<WindowInfo> {
        let title = title.to_string();
        respond(
            self.blocking(move |automation| automation.activate_window(&title))
                .await,
        )
    }

    async fn blocking<T, F>(&self, f: F) -> ToolkitResult<T>
    where
        F: FnOnce(&ScreenAutomation) -> ToolkitResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let automation = Arc::clone(&self.automation);
        tokio::task::spawn_blocking(move || f(&automation))
            .await
            .map_err(|e| ToolkitError::Other(format!("automation task failed: {e}")))?
    }

    // -----------------------------------------------------------------------
    // Wake listener
    // -----------------------------------------------------------------------

    pub fn start_wake(&self, phrase: Option<&str>) -> Response<WakeStatus> {
        match self.wake.start(phrase) {
            Ok(status) => Response::ok(status),
            Err(e) => Response::fail(e.to_string(), e.kind()),
        }
    }

    pub fn stop_wake(&self) -> Response<WakeStatus> {
        Response::ok(self.wake.stop())
    }

    pub fn wake_status(&self) -> Response<WakeStatus> {
        Response::ok(self.wake.status())
    }

    pub fn subscribe_wake(&self) -> broadcast::Receiver<WakeEvent> {
        self.wake.subscribe()
    }

    // -----------------------------------------------------------------------
    // History and status
    // -----------------------------------------------------------------------

    pub fn history(
        &self,
        user: &str,
        kind: Option<HistoryKind>,
        limit: usize,
    ) -> Response<HistoryReport> {
        match self.history.recent(user, kind, limit) {
            Ok(records) => Response::ok(HistoryReport {
                user_id: user.to_string(),
                records,
            }),
            Err(e) => Response::fail(e.to_string(), e.kind()),
        }
    }

    pub async fn status(&self) -> Response<StatusReport> {
        let screen = self
            .blocking(|automation| automation.screen_size())
            .await
            .ok();
        Response::ok(StatusReport {
            version: env!("CARGO_PKG_VERSION"),
            platform: self.policy.platform(),
            toolkit_backend: self.automation.mode().to_string(),
            screen_width: screen.map(|(w, _)| w),
            screen_height: screen.map(|(_, h)| h),
            interpreter: if self.interpreter.has_translator() {
                "translator"
            } else {
                "fallback"
            },
            wake: self.wake.status(),
        })
    }

    async fn record_batch(&self, user: &str, batch: &BatchResult) {
        self.record(
            user,
            HistoryKind::Batch,
            batch.all_succeeded(),
            &batch.batch_name,
            batch,
        )
        .await;
    }

    /// History failures are logged and never fail the operation. The sink
    /// may be a blocking SQLite store, so the write runs on the blocking pool.
    async fn record<T: Serialize>(
        &self,
        user: &str,
        kind: HistoryKind,
        success: bool,
        summary: &str,
        payload: &T,
    ) {
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            warn!(error = %e, "failed to encode history payload");
            serde_json::Value::Null
        });
        let record = HistoryRecord::new(user, kind, success, summary, payload);
        let history = Arc::clone(&self.history);
        let id = record.id;
        let written = tokio::task::spawn_blocking(move || history.record(&record)).await;
        match written {
            Ok(Ok(())) => info!(%id, %kind, user, success, "invocation recorded"),
            Ok(Err(e)) => warn!(error = %e, %kind, "failed to record history"),
            Err(e) => warn!(error = %e, %kind, "history write task failed"),
        }
    }
}

fn respond<T>(outcome: ToolkitResult<T>) -> Response<T> {
    match outcome {
        Ok(data) => Response::ok(data),
        Err(e) => Response::fail(e.to_string(), e.kind()),
    }
}
