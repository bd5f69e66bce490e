use pipeline_protocol::{InboundFrame, StepName, StepStatus};
use pretty_assertions::assert_eq;
use serde_json::json;

fn result_frame() -> serde_json::Value {
    json!({
        "type": "result",
        "session_id": "abc",
        "agent_response": "Here are the 5 most recent escalated cases.",
        "sql_used": "SELECT * FROM cases WHERE status = 'Escalated' LIMIT 5",
        "intent": "query",
        "had_retry": false,
        "events": [
            {"step_name": "intent", "status": "success", "detail": "query", "data": {}},
            {"step_name": "response", "status": "success", "detail": "Response generated", "data": null},
        ],
        "tool_results": [{
            "tool": "query_database",
            "result": {
                "success": true,
                "sql": "SELECT * FROM cases WHERE status = 'Escalated' LIMIT 5",
                "columns": ["id", "status"],
                "rows": [{"id": "C-1", "status": "Escalated"}],
                "row_count": 1,
                "elapsed_ms": 12,
            },
        }],
    })
}

#[test]
fn result_frame_parses_into_chat_result() {
    let frame = InboundFrame::parse(&result_frame().to_string()).expect("result frame");
    let InboundFrame::Result(result) = frame else {
        panic!("expected a result frame");
    };

    assert_eq!(result.session_id, "abc");
    assert_eq!(result.intent(), Some("query"));
    assert!(result.sql().is_some());
    assert!(!result.had_retry);
    assert_eq!(result.events.len(), 2);
    assert_eq!(result.events[1].step_name, StepName::Response);
    assert_eq!(result.events[1].status, StepStatus::Success);

    let output = &result.tool_results[0].result;
    assert!(output.success);
    assert_eq!(output.display_columns(), vec!["id", "status"]);
    assert_eq!(output.row_count(), 1);
    assert_eq!(output.extra.get("elapsed_ms"), Some(&json!(12)));
}

#[test]
fn failed_tool_output_keeps_error_text() {
    let frame = json!({
        "type": "result",
        "session_id": "abc",
        "agent_response": "The query failed.",
        "tool_results": [{
            "tool": "query_database",
            "result": {"success": false, "error": "no such column: agent_id"},
        }],
    });

    let Some(InboundFrame::Result(result)) = InboundFrame::parse(&frame.to_string()) else {
        panic!("expected a result frame");
    };

    let output = &result.tool_results[0].result;
    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("no such column: agent_id"));
    assert_eq!(result.sql(), None);
    assert!(output.display_columns().is_empty());
}

#[test]
fn session_frame_ignores_unrelated_fields() {
    let frame = InboundFrame::parse(r#"{"type":"session","session_id":"abc","server":"demo"}"#);
    assert_eq!(
        frame,
        Some(InboundFrame::Session {
            session_id: "abc".to_string(),
        })
    );
}
