//! Realtime monitor for an agent pipeline backend.
//!
//! The backend streams step events (intent, tool selection, schema
//! validation, execution, response, plus out-of-band retries) for each user
//! message, then a terminal result or error. This crate turns that stream
//! into state a presentation layer can draw directly.
//!
//! # Public API Overview
//! - [`StreamController`] drives request cycles over any [`pipeline_api::ChannelOps`]
//!   and decides which frames belong to the cycle the user is waiting on.
//! - [`EventAggregator`] keeps the per-cycle event log; [`fold_pipeline`] derives the
//!   pipeline view from it.
//! - [`validation_panel`] projects the latest schema-validation report.
//! - [`PipelineRuntime`] wires a live [`pipeline_api::StreamChannel`], the REST client,
//!   and session persistence together, publishing [`ControllerSnapshot`]s.

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod logging;
pub mod runtime;
pub mod transcript;
pub mod validation;

pub use crate::aggregator::{
    fold_pipeline, EventAggregator, PipelineView, RetryStage, StageView, RETRY_FALLBACK_DETAIL,
};
pub use crate::config::EnvConfig;
pub use crate::controller::{
    ControllerError, ControllerSnapshot, CycleId, CycleState, FrameOutcome, StreamController,
};
pub use crate::logging::init_logging;
pub use crate::runtime::{PipelineRuntime, RuntimeError};
pub use crate::transcript::{ChatMessage, Role, ERROR_MESSAGE_PREFIX};
pub use crate::validation::{
    truncate_display, validation_panel, CheckView, ToolValidationView, ValidationPanel,
    VALUE_DISPLAY_LIMIT,
};
