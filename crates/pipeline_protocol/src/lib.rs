//! Wire contract shared between the pipeline monitor and its backend.
//!
//! This crate only defines data: step events, terminal results, the tagged
//! streaming frame union, and request/response bodies. It performs no I/O and
//! holds no connection or cycle state.

pub mod frame;
pub mod rest;
pub mod result;
pub mod step;

pub use frame::{InboundFrame, OutboundFrame, UNKNOWN_ERROR};
pub use rest::{DatabaseHealth, HealthStatus, ResetRequest, ResetResponse, Scenario};
pub use result::{ChatResult, ToolOutput, ToolResult};
pub use step::{
    CheckStatus, SelectedTool, StepEvent, StepName, StepStatus, ValidationCheck,
    ValidationReport, PIPELINE_STEPS,
};

/// Outbound body of the one-shot `POST /api/chat` endpoint; same shape as the
/// streaming frame.
pub type ChatRequest = OutboundFrame;
