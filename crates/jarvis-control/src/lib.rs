//! Wiring for jarvis.
//!
//! [`Assistant`] builds the policy classifier, executor, interpreter,
//! screen automation, wake listener and history ledger from one
//! [`JarvisConfig`](jarvis_types::JarvisConfig) and exposes every
//! operation behind a uniform `{success, timestamp, error?}` envelope.

pub mod assistant;
pub mod response;

pub use assistant::{Assistant, Components, DEFAULT_USER};
pub use response::{
    ActionReport, HistoryReport, MatchList, PipelineResult, Response, SafeCommandList,
    ScreenshotReport, Stage, StatusReport, TemplateList, WindowList,
};
