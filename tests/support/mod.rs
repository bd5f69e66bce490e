#![allow(dead_code)]

use pipeline_api::{ChannelError, ChannelOps, ChannelState, ConnectionEpoch, Delivery, FrameSeq};
use pipeline_protocol::{ChatResult, InboundFrame, OutboundFrame, StepEvent, StepName, StepStatus};

/// Channel stand-in that records sends and numbers deliveries the way the
/// real channel does.
pub struct ChannelSpy {
    pub state: ChannelState,
    pub epoch: ConnectionEpoch,
    pub sent: Vec<OutboundFrame>,
    pub fail_send: Option<ChannelError>,
    next_seq: FrameSeq,
}

impl ChannelSpy {
    pub fn open() -> Self {
        Self {
            state: ChannelState::Open,
            epoch: 1,
            sent: Vec::new(),
            fail_send: None,
            next_seq: 0,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            state: ChannelState::Disconnected,
            epoch: 0,
            ..Self::open()
        }
    }

    pub fn drop_connection(&mut self) {
        self.state = ChannelState::Disconnected;
    }

    pub fn reconnect(&mut self) {
        self.epoch += 1;
        self.state = ChannelState::Open;
    }

    /// Wraps `frame` as the next delivery on the current connection.
    pub fn deliver(&mut self, frame: InboundFrame) -> Delivery {
        self.next_seq += 1;
        Delivery {
            seq: self.next_seq,
            epoch: self.epoch,
            frame,
        }
    }
}

impl ChannelOps for ChannelSpy {
    fn state(&self) -> ChannelState {
        self.state
    }

    fn epoch(&self) -> ConnectionEpoch {
        self.epoch
    }

    fn send(&mut self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        if self.state != ChannelState::Open {
            return Err(ChannelError::NotConnected);
        }
        if let Some(error) = self.fail_send.clone() {
            return Err(error);
        }
        self.sent.push(frame.clone());
        Ok(())
    }
}

pub fn session(session_id: &str) -> InboundFrame {
    InboundFrame::Session {
        session_id: session_id.to_string(),
    }
}

pub fn event(step: StepName, status: StepStatus, detail: &str) -> InboundFrame {
    InboundFrame::Event(StepEvent::new(step, status, detail))
}

pub fn result(session_id: &str, response: &str) -> InboundFrame {
    InboundFrame::Result(chat_result(session_id, response))
}

pub fn chat_result(session_id: &str, response: &str) -> ChatResult {
    ChatResult {
        session_id: session_id.to_string(),
        agent_response: response.to_string(),
        sql_used: String::new(),
        intent: String::new(),
        events: Vec::new(),
        tool_results: Vec::new(),
        had_retry: false,
    }
}

pub fn error(message: Option<&str>) -> InboundFrame {
    InboundFrame::Error {
        error: message.map(ToString::to_string),
        detail: None,
    }
}
