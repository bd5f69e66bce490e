mod support;

use pipeline_api::{ChannelError, ChannelEvent, ChannelState};
use pipeline_monitor::{
    ControllerError, CycleState, FrameOutcome, Role, StreamController, ERROR_MESSAGE_PREFIX,
};
use pipeline_protocol::{StepName, StepStatus, UNKNOWN_ERROR};
use pretty_assertions::assert_eq;
use support::{error, event, result, session, ChannelSpy};

const FIXED_STEPS: [StepName; 5] = [
    StepName::Intent,
    StepName::ToolSelection,
    StepName::SchemaValidation,
    StepName::Execution,
    StepName::Response,
];

#[test]
fn start_fails_fast_when_channel_is_not_open() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::disconnected();
    let revision = controller.aggregator().revision();

    let error = controller
        .start(&mut channel, "hello", None)
        .expect_err("start must fail while disconnected");

    assert!(matches!(error, ControllerError::NotConnected));
    assert!(!controller.is_busy());
    assert_eq!(controller.aggregator().revision(), revision);
    assert!(controller.transcript().is_empty());
    assert!(channel.sent.is_empty());
}

#[test]
fn send_failure_leaves_controller_untouched() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    channel.fail_send = Some(ChannelError::Closed);

    let error = controller
        .start(&mut channel, "hello", None)
        .expect_err("send failure must surface");

    assert!(matches!(error, ControllerError::Send(ChannelError::Closed)));
    assert_eq!(controller.state(), CycleState::Idle);
    assert!(controller.transcript().is_empty());
    assert_eq!(controller.pending_cycles(), 0);
}

#[test]
fn blank_messages_are_rejected() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    let error = controller
        .start(&mut channel, "   ", None)
        .expect_err("blank message");
    assert!(matches!(error, ControllerError::EmptyMessage));
    assert!(channel.sent.is_empty());
}

#[test]
fn first_request_learns_session_and_finishes_on_result() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    let cycle = controller
        .start(&mut channel, "list 5 escalated cases", None)
        .expect("start");
    assert_eq!(controller.state(), CycleState::Busy { cycle });
    assert_eq!(channel.sent.len(), 1);
    assert_eq!(channel.sent[0].message, "list 5 escalated cases");
    assert_eq!(channel.sent[0].session_id, None);
    assert_eq!(
        channel.sent[0].to_json().expect("json"),
        r#"{"message":"list 5 escalated cases","session_id":null}"#
    );

    let mut frames = vec![session("abc")];
    frames.extend(
        FIXED_STEPS
            .iter()
            .map(|step| event(step.clone(), StepStatus::Success, "done")),
    );
    frames.push(result("abc", "Here are 5 escalated cases."));

    for frame in frames {
        let delivery = channel.deliver(frame);
        assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    }

    assert!(!controller.is_busy());
    assert_eq!(controller.session_id(), Some("abc"));
    assert_eq!(controller.aggregator().events().len(), 5);

    let agent_messages: Vec<_> = controller
        .transcript()
        .iter()
        .filter(|message| message.role == Role::Agent)
        .collect();
    assert_eq!(agent_messages.len(), 1);
    assert_eq!(agent_messages[0].content, "Here are 5 escalated cases.");
    assert!(agent_messages[0].latency.is_some());
    assert!(agent_messages[0].result.is_some());
    assert_eq!(
        controller.result().map(|result| result.session_id.as_str()),
        Some("abc")
    );
    assert!(controller.last_latency().is_some());

    let second = controller
        .start(&mut channel, "and the next 5", None)
        .expect("second start");
    assert!(second > cycle);
    assert_eq!(channel.sent[1].session_id.as_deref(), Some("abc"));
}

#[test]
fn explicit_session_id_wins_over_stored_one() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    controller.start(&mut channel, "hi", None).expect("start");
    let delivery = channel.deliver(session("stored"));
    controller.on_delivery(delivery);

    controller
        .start(&mut channel, "again", Some("explicit"))
        .expect("start with explicit session");
    assert_eq!(channel.sent[1].session_id.as_deref(), Some("explicit"));
}

#[test]
fn later_step_events_supersede_earlier_ones() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.start(&mut channel, "hi", None).expect("start");

    for frame in [
        event(StepName::Intent, StepStatus::Success, "first"),
        event(StepName::Intent, StepStatus::Processing, "second"),
    ] {
        let delivery = channel.deliver(frame);
        controller.on_delivery(delivery);
    }

    let intent = controller
        .view()
        .step(&StepName::Intent)
        .expect("intent stage");
    assert_eq!(intent.status, StepStatus::Processing);
    assert_eq!(intent.detail, "second");
    assert_eq!(controller.aggregator().events().len(), 2);
}

#[test]
fn error_frame_ends_cycle_with_prefixed_agent_message() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.start(&mut channel, "hi", None).expect("start");

    let delivery = channel.deliver(error(Some("database offline")));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);

    assert!(!controller.is_busy());
    assert_eq!(controller.error(), Some("database offline"));
    let last = controller.transcript().last().expect("agent message");
    assert_eq!(last.role, Role::Agent);
    assert!(last.is_error);
    assert_eq!(
        last.content,
        format!("{ERROR_MESSAGE_PREFIX}database offline")
    );
}

#[test]
fn error_frame_without_message_reads_unknown_error() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.start(&mut channel, "hi", None).expect("start");

    let delivery = channel.deliver(error(None));
    controller.on_delivery(delivery);

    assert_eq!(controller.error(), Some(UNKNOWN_ERROR));
    assert_eq!(
        controller.transcript().last().map(|message| message.content.clone()),
        Some(format!("{ERROR_MESSAGE_PREFIX}{UNKNOWN_ERROR}"))
    );
}

#[test]
fn reconnect_mid_cycle_keeps_cycle_busy_until_late_result() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.apply(ChannelEvent::StateChanged(ChannelState::Open));
    controller.start(&mut channel, "hi", None).expect("start");
    let delivery = channel.deliver(event(StepName::Intent, StepStatus::Processing, ""));
    controller.on_delivery(delivery);

    channel.drop_connection();
    controller.apply(ChannelEvent::StateChanged(ChannelState::Disconnected));
    assert!(!controller.snapshot().connected);
    assert!(controller.is_busy());

    channel.reconnect();
    controller.apply(ChannelEvent::StateChanged(ChannelState::Open));
    assert!(controller.snapshot().connected);
    assert!(controller.is_busy());
    assert!(controller.result().is_none());

    let delivery = channel.deliver(result("abc", "late but fine"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    assert!(!controller.is_busy());
    assert_eq!(
        controller.result().map(|result| result.agent_response.as_str()),
        Some("late but fine")
    );
}

#[test]
fn redelivered_frame_identity_is_ignored() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.start(&mut channel, "hi", None).expect("start");

    let delivery = channel.deliver(result("abc", "done"));
    assert_eq!(controller.on_delivery(delivery.clone()), FrameOutcome::Applied);
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Duplicate);

    assert_eq!(controller.transcript().len(), 2);
}

#[test]
fn identical_extra_result_is_not_deduplicated_by_content() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();
    controller.start(&mut channel, "hi", None).expect("start");

    let first = channel.deliver(result("abc", "done"));
    let second = channel.deliver(result("abc", "done"));
    assert_eq!(controller.on_delivery(first), FrameOutcome::Applied);
    assert_eq!(controller.on_delivery(second), FrameOutcome::Applied);

    assert!(!controller.is_busy());
    let agent_turns = controller
        .transcript()
        .iter()
        .filter(|message| message.role == Role::Agent)
        .count();
    assert_eq!(agent_turns, 2);
}

#[test]
fn superseded_cycle_frames_are_dropped() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    let first = controller.start(&mut channel, "first", None).expect("first");
    let second = controller
        .start(&mut channel, "second", None)
        .expect("second");
    assert_eq!(controller.state(), CycleState::Busy { cycle: second });
    assert!(second > first);
    assert_eq!(controller.pending_cycles(), 2);

    let stale_event = channel.deliver(event(StepName::Intent, StepStatus::Success, "old"));
    assert_eq!(controller.on_delivery(stale_event), FrameOutcome::Stale);
    let stale_result = channel.deliver(result("abc", "answer to first"));
    assert_eq!(controller.on_delivery(stale_result), FrameOutcome::Stale);

    assert!(controller.is_busy());
    assert!(controller.aggregator().is_empty());
    assert!(controller.result().is_none());

    let live_event = channel.deliver(event(StepName::Intent, StepStatus::Success, "new"));
    assert_eq!(controller.on_delivery(live_event), FrameOutcome::Applied);
    let live_result = channel.deliver(result("abc", "answer to second"));
    assert_eq!(controller.on_delivery(live_result), FrameOutcome::Applied);

    assert!(!controller.is_busy());
    assert_eq!(
        controller.transcript().last().map(|message| message.content.as_str()),
        Some("answer to second")
    );
}

#[test]
fn superseded_cycle_from_older_connection_is_pruned() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    controller.start(&mut channel, "lost", None).expect("first");
    channel.drop_connection();
    channel.reconnect();
    controller.start(&mut channel, "fresh", None).expect("second");
    assert_eq!(controller.pending_cycles(), 2);

    let delivery = channel.deliver(event(StepName::Intent, StepStatus::Processing, ""));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    assert_eq!(controller.pending_cycles(), 1);

    let delivery = channel.deliver(result("abc", "fresh answer"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    assert!(!controller.is_busy());
}

#[test]
fn reset_clears_everything_and_drops_late_frames_of_the_abandoned_cycle() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    controller.start(&mut channel, "hi", None).expect("start");
    let delivery = channel.deliver(session("abc"));
    controller.on_delivery(delivery);
    let delivery = channel.deliver(event(StepName::Intent, StepStatus::Processing, ""));
    controller.on_delivery(delivery);

    controller.reset();
    assert_eq!(controller.state(), CycleState::Idle);
    assert!(controller.transcript().is_empty());
    assert!(controller.aggregator().is_empty());
    assert_eq!(controller.session_id(), None);
    assert_eq!(controller.pending_cycles(), 0);
    assert_eq!(controller.abandoned_cycles(), 1);

    let late_session = channel.deliver(session("abc"));
    assert_eq!(controller.on_delivery(late_session), FrameOutcome::Stale);
    let late_event = channel.deliver(event(StepName::Response, StepStatus::Success, ""));
    assert_eq!(controller.on_delivery(late_event), FrameOutcome::Stale);
    let late_result = channel.deliver(result("abc", "too late"));
    assert_eq!(controller.on_delivery(late_result), FrameOutcome::Stale);
    assert_eq!(controller.abandoned_cycles(), 0);

    let extra_result = channel.deliver(result("abc", "even later"));
    assert_eq!(controller.on_delivery(extra_result), FrameOutcome::Orphaned);

    assert!(controller.transcript().is_empty());
    assert_eq!(controller.session_id(), None);

    controller.reset();
    assert_eq!(controller.state(), CycleState::Idle);
}

#[test]
fn delayed_answer_from_reset_cycle_does_not_leak_into_next_cycle() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    controller.start(&mut channel, "old question", None).expect("old");
    let delivery = channel.deliver(session("old-session"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);

    controller.reset();
    controller
        .start(&mut channel, "new question", None)
        .expect("new");
    assert_eq!(channel.sent[1].session_id, None);
    assert_eq!(controller.pending_cycles(), 1);
    assert_eq!(controller.abandoned_cycles(), 1);

    let outcomes: Vec<FrameOutcome> = [
        session("old-session"),
        event(StepName::Intent, StepStatus::Success, "old intent"),
        result("old-session", "answer to old"),
        session("new-session"),
        event(StepName::Intent, StepStatus::Success, "new intent"),
        result("new-session", "answer to new"),
    ]
    .into_iter()
    .map(|frame| {
        let delivery = channel.deliver(frame);
        controller.on_delivery(delivery)
    })
    .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Stale,
            FrameOutcome::Stale,
            FrameOutcome::Stale,
            FrameOutcome::Applied,
            FrameOutcome::Applied,
            FrameOutcome::Applied,
        ]
    );
    assert_eq!(controller.state(), CycleState::Idle);
    assert_eq!(controller.session_id(), Some("new-session"));
    assert_eq!(controller.aggregator().events().len(), 1);
    assert_eq!(
        controller.view().step(&StepName::Intent).map(|stage| stage.detail.as_str()),
        Some("new intent")
    );

    let transcript: Vec<(Role, &str)> = controller
        .transcript()
        .iter()
        .map(|message| (message.role, message.content.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![(Role::User, "new question"), (Role::Agent, "answer to new")]
    );
}

#[test]
fn abandoned_cycle_from_older_connection_is_pruned_after_reset() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    controller.start(&mut channel, "lost", None).expect("old");
    controller.reset();
    channel.drop_connection();
    channel.reconnect();
    controller.start(&mut channel, "fresh", None).expect("new");

    let delivery = channel.deliver(session("fresh-session"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    assert_eq!(controller.abandoned_cycles(), 0);
    assert_eq!(controller.session_id(), Some("fresh-session"));

    let delivery = channel.deliver(result("fresh-session", "fresh answer"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Applied);
    assert!(!controller.is_busy());
}

#[test]
fn frames_before_any_cycle_are_orphaned() {
    let mut controller = StreamController::default();
    let mut channel = ChannelSpy::open();

    let delivery = channel.deliver(session("abc"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Orphaned);
    let delivery = channel.deliver(result("abc", "unprompted"));
    assert_eq!(controller.on_delivery(delivery), FrameOutcome::Orphaned);

    assert_eq!(controller.session_id(), None);
    assert!(controller.transcript().is_empty());
}
