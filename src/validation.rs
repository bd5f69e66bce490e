use pipeline_protocol::{CheckStatus, StepEvent, StepName, ValidationReport};
use unicode_segmentation::UnicodeSegmentation;

/// Observed parameter values are cut to this many grapheme clusters.
pub const VALUE_DISPLAY_LIMIT: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPanel {
    pub tools: Vec<ToolValidationView>,
}

impl ValidationPanel {
    #[must_use]
    pub fn all_valid(&self) -> bool {
        self.tools.iter().all(|tool| tool.valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolValidationView {
    pub tool_name: String,
    pub valid: bool,
    pub checks: Vec<CheckView>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckView {
    pub parameter: String,
    pub value: String,
    pub outcome: CheckStatus,
    pub detail: String,
}

/// Projects the most recent `schema_validation` event that carries a
/// validation report. Earlier reports in the same log are never shown.
pub fn validation_panel(events: &[StepEvent]) -> Option<ValidationPanel> {
    let reports = events
        .iter()
        .rev()
        .filter(|event| event.step_name == StepName::SchemaValidation)
        .find_map(StepEvent::validation_reports)?;

    Some(ValidationPanel {
        tools: reports.into_iter().map(tool_view).collect(),
    })
}

fn tool_view(report: ValidationReport) -> ToolValidationView {
    ToolValidationView {
        tool_name: report.tool_name,
        valid: report.valid,
        checks: report
            .checks
            .into_iter()
            .map(|check| CheckView {
                value: truncate_display(&check.value, VALUE_DISPLAY_LIMIT),
                parameter: check.parameter,
                outcome: check.status,
                detail: check.detail,
            })
            .collect(),
        errors: report.errors,
    }
}

/// Cuts `value` to at most `limit` grapheme clusters, appending `…` when
/// anything was removed.
pub fn truncate_display(value: &str, limit: usize) -> String {
    match value.grapheme_indices(true).nth(limit) {
        Some((index, _)) => format!("{}…", &value[..index]),
        None => value.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use pipeline_protocol::{CheckStatus, StepEvent, StepName, StepStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{truncate_display, validation_panel, VALUE_DISPLAY_LIMIT};

    fn validation_event(valid: bool, value: &str) -> StepEvent {
        let (status, errors) = if valid {
            ("passed", json!([]))
        } else {
            ("failed", json!(["limit out of range"]))
        };
        StepEvent::new(StepName::SchemaValidation, StepStatus::Success, "").with_data(json!({
            "validation": [{
                "tool_name": "query_database",
                "valid": valid,
                "checks": [{"parameter": "limit", "value": value, "status": status, "detail": "range"}],
                "errors": errors,
            }]
        }))
    }

    #[test]
    fn latest_report_wins() {
        let events = vec![
            validation_event(false, "-5"),
            StepEvent::new(StepName::Retry, StepStatus::Retry, "retrying"),
            validation_event(true, "5"),
        ];

        let panel = validation_panel(&events).expect("panel");
        assert!(panel.all_valid());
        assert_eq!(panel.tools[0].checks[0].value, "5");
        assert_eq!(panel.tools[0].checks[0].outcome, CheckStatus::Passed);
        assert!(panel.tools[0].errors.is_empty());
    }

    #[test]
    fn events_without_reports_are_skipped() {
        let events = vec![
            validation_event(false, "-5"),
            StepEvent::new(StepName::SchemaValidation, StepStatus::Processing, "checking"),
        ];

        let panel = validation_panel(&events).expect("panel from earlier report");
        assert!(!panel.all_valid());
        assert_eq!(panel.tools[0].errors, vec!["limit out of range".to_string()]);
        assert_eq!(validation_panel(&events[1..]), None);
    }

    #[test]
    fn truncation_counts_grapheme_clusters() {
        let short = "x".repeat(VALUE_DISPLAY_LIMIT);
        assert_eq!(truncate_display(&short, VALUE_DISPLAY_LIMIT), short);

        let long = "y".repeat(VALUE_DISPLAY_LIMIT + 3);
        let truncated = truncate_display(&long, VALUE_DISPLAY_LIMIT);
        assert_eq!(truncated, format!("{}…", "y".repeat(VALUE_DISPLAY_LIMIT)));

        let accented = "e\u{301}".repeat(4);
        assert_eq!(
            truncate_display(&accented, 3),
            format!("{}…", "e\u{301}".repeat(3))
        );
    }
}
