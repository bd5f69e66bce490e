//! Folding of the per-cycle step-event log into pipeline display state.
//!
//! The log is the only stored state. Everything a presentation layer shows is
//! recomputed from it by [`fold_pipeline`] after each append, so there is no
//! incremental bookkeeping to fall out of sync.

use pipeline_protocol::{StepEvent, StepName, StepStatus, PIPELINE_STEPS};

/// Detail shown on the retry stage when the latest retry event carries none.
pub const RETRY_FALLBACK_DETAIL: &str = "Retrying with corrected parameters…";

/// Display state of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView {
    pub step: StepName,
    pub status: StepStatus,
    pub detail: String,
    /// Tool names announced by the latest `tool_selection` event.
    pub tools: Vec<String>,
}

impl StageView {
    fn pending(step: StepName) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            detail: String::new(),
            tools: Vec::new(),
        }
    }

    fn from_event(step: StepName, event: &StepEvent) -> Self {
        let tools = if step == StepName::ToolSelection {
            event
                .selected_tools()
                .into_iter()
                .map(|tool| tool.name)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            step,
            status: event.status,
            detail: event.detail.clone(),
            tools,
        }
    }

    pub fn label(&self) -> &str {
        self.step.label()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStage {
    /// Number of retry events seen this cycle.
    pub count: usize,
    pub detail: String,
}

/// Derived pipeline record: the five fixed stages plus the optional retry
/// excursion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineView {
    pub steps: Vec<StageView>,
    pub retry: Option<RetryStage>,
}

impl Default for PipelineView {
    fn default() -> Self {
        fold_pipeline(&[])
    }
}

impl PipelineView {
    pub fn step(&self, step: &StepName) -> Option<&StageView> {
        self.steps.iter().find(|stage| &stage.step == step)
    }

    /// Status of a fixed stage; `Pending` for anything not in the pipeline.
    pub fn status(&self, step: &StepName) -> StepStatus {
        self.step(step)
            .map(|stage| stage.status)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn had_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Stages in display order, with the retry stage inserted right after
    /// schema validation when any retry occurred.
    pub fn stages(&self) -> Vec<StageView> {
        let mut stages = Vec::with_capacity(self.steps.len() + 1);
        for stage in &self.steps {
            stages.push(stage.clone());
            if stage.step == StepName::SchemaValidation {
                if let Some(retry) = &self.retry {
                    stages.push(StageView {
                        step: StepName::Retry,
                        status: StepStatus::Retry,
                        detail: retry.detail.clone(),
                        tools: Vec::new(),
                    });
                }
            }
        }
        stages
    }
}

/// Derives the pipeline view from an ordered event log. Later events for a
/// step fully supersede earlier ones.
pub fn fold_pipeline(events: &[StepEvent]) -> PipelineView {
    let steps = PIPELINE_STEPS
        .iter()
        .map(|step| {
            match events.iter().rev().find(|event| &event.step_name == step) {
                Some(event) => StageView::from_event(step.clone(), event),
                None => StageView::pending(step.clone()),
            }
        })
        .collect();

    let mut retry_count = 0;
    let mut latest_retry = None;
    for event in events.iter().filter(|event| event.step_name == StepName::Retry) {
        retry_count += 1;
        latest_retry = Some(event);
    }
    let retry = latest_retry.map(|event| RetryStage {
        count: retry_count,
        detail: if event.detail.trim().is_empty() {
            RETRY_FALLBACK_DETAIL.to_owned()
        } else {
            event.detail.clone()
        },
    });

    PipelineView { steps, retry }
}

/// Step-event log for the current cycle.
///
/// Equality compares the log only; the view is derived from it and the
/// revision counter is change-detection bookkeeping, so a reset aggregator
/// equals a fresh one.
#[derive(Debug, Clone, Default)]
pub struct EventAggregator {
    events: Vec<StepEvent>,
    view: PipelineView,
    revision: u64,
}

impl PartialEq for EventAggregator {
    fn eq(&self, other: &Self) -> bool {
        self.events == other.events
    }
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.view = PipelineView::default();
        self.revision += 1;
    }

    pub fn append(&mut self, event: StepEvent) {
        self.events.push(event);
        self.view = fold_pipeline(&self.events);
        self.revision += 1;
    }

    pub fn latest(&self, step: &StepName) -> Option<&StepEvent> {
        self.events.iter().rev().find(|event| &event.step_name == step)
    }

    pub fn retries(&self) -> Vec<&StepEvent> {
        self.events
            .iter()
            .filter(|event| event.step_name == StepName::Retry)
            .collect()
    }

    /// Full chronological log.
    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    pub fn view(&self) -> &PipelineView {
        &self.view
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bumped on every change, resets included, for cheap "did anything
    /// happen" checks. Not part of the aggregator's compared state.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
