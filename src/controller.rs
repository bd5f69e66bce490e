//! Request lifecycle state machine.
//!
//! One cycle is active at a time. Every dispatched cycle is queued until its
//! terminal frame arrives, so a late `result`/`error` for a superseded cycle
//! can be told apart from the one the user is waiting on. Frames are matched
//! to cycles by arrival order: the backend answers messages on a connection
//! in the order they were sent.
//!
//! `reset()` does not forget cycles already on the wire. They stay queued as
//! abandoned so their late frames are still recognised and dropped instead of
//! being matched to the next cycle.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use pipeline_api::{
    ChannelError, ChannelEvent, ChannelOps, ChannelState, ConnectionEpoch, Delivery, FrameSeq,
};
use pipeline_protocol::{ChatResult, InboundFrame, OutboundFrame, StepEvent, UNKNOWN_ERROR};
use session_store::SessionCorrelator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregator::{EventAggregator, PipelineView};
use crate::transcript::ChatMessage;
use crate::validation::{validation_panel, ValidationPanel};

pub type CycleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Busy {
        cycle: CycleId,
    },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("not connected to the pipeline stream")]
    NotConnected,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("failed to send message: {0}")]
    Send(#[source] ChannelError),
}

/// What happened to one delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied,
    /// Same frame identity seen before.
    Duplicate,
    /// Belongs to a cycle that has been superseded.
    Stale,
    /// No dispatched cycle it could belong to.
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCycle {
    id: CycleId,
    epoch: ConnectionEpoch,
    /// Dispatched before a reset; its frames belong to a forgotten conversation.
    abandoned: bool,
}

enum Terminal {
    Result(ChatResult),
    Error(String),
}

/// Read-only view of the controller for presentation layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerSnapshot {
    pub connected: bool,
    pub busy: bool,
    pub pipeline: PipelineView,
    pub validation: Option<ValidationPanel>,
    pub event_count: usize,
    pub transcript_len: usize,
    pub last_latency: Option<Duration>,
    pub session_id: Option<String>,
}

#[derive(Debug)]
pub struct StreamController {
    state: CycleState,
    connection: ChannelState,
    next_cycle: CycleId,
    pending: VecDeque<PendingCycle>,
    last_seq: Option<FrameSeq>,
    last_finished: Option<CycleId>,
    started_at: Option<Instant>,
    aggregator: EventAggregator,
    transcript: Vec<ChatMessage>,
    result: Option<ChatResult>,
    error: Option<String>,
    last_latency: Option<Duration>,
    correlator: SessionCorrelator,
}

impl Default for StreamController {
    fn default() -> Self {
        Self::new(SessionCorrelator::in_memory())
    }
}

impl StreamController {
    pub fn new(correlator: SessionCorrelator) -> Self {
        Self {
            state: CycleState::Idle,
            connection: ChannelState::Disconnected,
            next_cycle: 1,
            pending: VecDeque::new(),
            last_seq: None,
            last_finished: None,
            started_at: None,
            aggregator: EventAggregator::new(),
            transcript: Vec::new(),
            result: None,
            error: None,
            last_latency: None,
            correlator,
        }
    }

    /// Dispatch `message` as a new cycle.
    ///
    /// Nothing is mutated unless the frame was handed to the channel.
    pub fn start(
        &mut self,
        channel: &mut dyn ChannelOps,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<CycleId, ControllerError> {
        if channel.state() != ChannelState::Open {
            return Err(ControllerError::NotConnected);
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let frame = OutboundFrame::new(message, self.correlator.resolve(session_id));
        channel.send(&frame).map_err(|error| match error {
            ChannelError::NotConnected => ControllerError::NotConnected,
            other => ControllerError::Send(other),
        })?;

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        if let CycleState::Busy { cycle: previous } = self.state {
            debug!(previous, cycle, "superseding busy cycle");
        }

        self.aggregator.reset();
        self.result = None;
        self.error = None;
        self.state = CycleState::Busy { cycle };
        self.started_at = Some(Instant::now());
        self.pending.push_back(PendingCycle {
            id: cycle,
            epoch: channel.epoch(),
            abandoned: false,
        });
        self.transcript.push(ChatMessage::user(message));
        info!(cycle, session_id = ?frame.session_id, "cycle dispatched");

        Ok(cycle)
    }

    /// Feed one channel event. Returns the frame outcome for frames, `None`
    /// for connectivity changes.
    pub fn apply(&mut self, event: ChannelEvent) -> Option<FrameOutcome> {
        match event {
            ChannelEvent::StateChanged(state) => {
                self.on_channel_state(state);
                None
            }
            ChannelEvent::Frame(delivery) => Some(self.on_delivery(delivery)),
        }
    }

    pub fn on_channel_state(&mut self, state: ChannelState) {
        if self.connection != state {
            debug!(from = self.connection.as_str(), to = state.as_str(), "connection state");
            self.connection = state;
        }
    }

    pub fn on_delivery(&mut self, delivery: Delivery) -> FrameOutcome {
        if self.last_seq.is_some_and(|last| delivery.seq <= last) {
            debug!(seq = delivery.seq, "ignoring re-delivered frame");
            return FrameOutcome::Duplicate;
        }
        self.last_seq = Some(delivery.seq);
        self.prune_superseded(delivery.epoch);

        match delivery.frame {
            InboundFrame::Session { session_id } => self.on_session(&session_id),
            InboundFrame::Event(event) => self.on_step_event(event),
            InboundFrame::Result(result) => self.on_terminal(Terminal::Result(result)),
            InboundFrame::Error { error, detail } => {
                if let Some(detail) = detail.as_deref() {
                    debug!(detail, "backend error detail");
                }
                let message = error
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_owned());
                self.on_terminal(Terminal::Error(message))
            }
        }
    }

    /// End any open cycle and forget the conversation. Always safe to call.
    pub fn reset(&mut self) {
        if let CycleState::Busy { cycle } = self.state {
            info!(cycle, "abandoning busy cycle on reset");
        }

        self.state = CycleState::Idle;
        for pending in &mut self.pending {
            pending.abandoned = true;
        }
        self.last_finished = None;
        self.started_at = None;
        self.aggregator.reset();
        self.transcript.clear();
        self.result = None;
        self.error = None;
        self.last_latency = None;
        if let Err(error) = self.correlator.clear() {
            warn!(%error, "failed to clear persisted session id");
        }
    }

    fn active_cycle(&self) -> Option<CycleId> {
        match self.state {
            CycleState::Busy { cycle } => Some(cycle),
            CycleState::Idle => None,
        }
    }

    /// Superseded cycles sent on an older connection will never be answered.
    fn prune_superseded(&mut self, epoch: ConnectionEpoch) {
        let active = self.active_cycle();
        while let Some(head) = self.pending.front().copied() {
            if Some(head.id) == active || head.epoch >= epoch {
                break;
            }
            debug!(cycle = head.id, "pruning unanswerable superseded cycle");
            self.pending.pop_front();
        }
    }

    fn on_session(&mut self, session_id: &str) -> FrameOutcome {
        match self.pending.front() {
            None => {
                debug!(session_id, "ignoring session frame with no pending cycle");
                return FrameOutcome::Orphaned;
            }
            Some(head) if head.abandoned => {
                debug!(cycle = head.id, session_id, "ignoring session from before reset");
                return FrameOutcome::Stale;
            }
            Some(_) => {}
        }
        if let Err(error) = self.correlator.set(session_id) {
            warn!(%error, "failed to store session id");
        }
        FrameOutcome::Applied
    }

    fn on_step_event(&mut self, event: StepEvent) -> FrameOutcome {
        match self.pending.front() {
            Some(head) if !head.abandoned && Some(head.id) == self.active_cycle() => {
                self.aggregator.append(event);
                FrameOutcome::Applied
            }
            Some(head) => {
                debug!(cycle = head.id, step = %event.step_name, "dropping stale step event");
                FrameOutcome::Stale
            }
            None => FrameOutcome::Orphaned,
        }
    }

    fn on_terminal(&mut self, terminal: Terminal) -> FrameOutcome {
        match self.pending.front().copied() {
            Some(head) if !head.abandoned && Some(head.id) == self.active_cycle() => {
                self.pending.pop_front();
                self.finish(head.id, terminal);
                FrameOutcome::Applied
            }
            Some(head) => {
                self.pending.pop_front();
                debug!(
                    cycle = head.id,
                    abandoned = head.abandoned,
                    "dropping stale terminal frame"
                );
                FrameOutcome::Stale
            }
            None if self.last_finished.is_some() => {
                debug!("extra terminal frame after finished cycle");
                self.record_terminal(terminal, None);
                FrameOutcome::Applied
            }
            None => {
                debug!("ignoring terminal frame with no dispatched cycle");
                FrameOutcome::Orphaned
            }
        }
    }

    fn finish(&mut self, cycle: CycleId, terminal: Terminal) {
        let latency = self.started_at.take().map(|started| started.elapsed());
        self.state = CycleState::Idle;
        self.last_finished = Some(cycle);
        self.last_latency = latency;
        info!(
            cycle,
            latency_ms = latency.map(|latency| latency.as_millis() as u64),
            "cycle finished"
        );
        self.record_terminal(terminal, latency);
    }

    fn record_terminal(&mut self, terminal: Terminal, latency: Option<Duration>) {
        match terminal {
            Terminal::Result(result) => {
                self.transcript
                    .push(ChatMessage::agent(result.clone(), latency));
                self.result = Some(result);
                self.error = None;
            }
            Terminal::Error(message) => {
                self.transcript
                    .push(ChatMessage::agent_error(&message, latency));
                self.error = Some(message);
            }
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, CycleState::Busy { .. })
    }

    pub fn connection(&self) -> ChannelState {
        self.connection
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection == ChannelState::Open
    }

    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    pub fn view(&self) -> &PipelineView {
        self.aggregator.view()
    }

    pub fn validation(&self) -> Option<ValidationPanel> {
        validation_panel(self.aggregator.events())
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn result(&self) -> Option<&ChatResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.last_latency
    }

    pub fn session_id(&self) -> Option<&str> {
        self.correlator.get()
    }

    /// Cycles dispatched since the last reset and still waiting for a
    /// terminal frame.
    pub fn pending_cycles(&self) -> usize {
        self.pending.iter().filter(|pending| !pending.abandoned).count()
    }

    /// Cycles dispatched before a reset whose terminal frame has not arrived.
    pub fn abandoned_cycles(&self) -> usize {
        self.pending.iter().filter(|pending| pending.abandoned).count()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            connected: self.is_connected(),
            busy: self.is_busy(),
            pipeline: self.view().clone(),
            validation: self.validation(),
            event_count: self.aggregator.events().len(),
            transcript_len: self.transcript.len(),
            last_latency: self.last_latency,
            session_id: self.session_id().map(ToOwned::to_owned),
        }
    }
}
