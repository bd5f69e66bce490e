use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pipeline_protocol::{InboundFrame, OutboundFrame};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::PipelineApiConfig;
use crate::error::{ChannelError, PipelineApiError};
use crate::frames::FrameDecoder;
use crate::retry::ReconnectPolicy;
use crate::url::stream_endpoint;

/// Increments each time the channel reaches `Open`.
pub type ConnectionEpoch = u64;
/// Monotonic identity of a delivered frame. The first frame is `1`.
pub type FrameSeq = u64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Open,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub epoch: ConnectionEpoch,
}

/// A decoded inbound frame tagged with its identity and the connection it
/// arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub seq: FrameSeq,
    pub epoch: ConnectionEpoch,
    pub frame: InboundFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ChannelState),
    Frame(Delivery),
}

/// Operations the stream controller needs from a channel.
pub trait ChannelOps {
    fn state(&self) -> ChannelState;
    fn epoch(&self) -> ConnectionEpoch;
    fn send(&mut self, frame: &OutboundFrame) -> Result<(), ChannelError>;
}

/// Persistent, self-reconnecting message channel to the streaming endpoint.
///
/// State changes and frames are reported on the receiver returned from
/// [`StreamChannel::new`], in the order they happen. A closed connection is
/// retried forever after the configured fixed delay until [`StreamChannel::close`]
/// is called or the channel is dropped.
#[derive(Debug)]
pub struct StreamChannel {
    endpoint: String,
    reconnect: ReconnectPolicy,
    status: Arc<watch::Sender<ChannelStatus>>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    next_seq: Arc<AtomicU64>,
}

impl StreamChannel {
    pub fn new(
        config: &PipelineApiConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>), PipelineApiError> {
        let endpoint = stream_endpoint(&config.api_base_url, config.stream_base_url.as_deref())?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ChannelStatus::default());

        Ok((
            Self {
                endpoint,
                reconnect: ReconnectPolicy::fixed(config.reconnect_delay),
                status: Arc::new(status),
                events_tx,
                outbound_tx: None,
                shutdown_tx: None,
                task: None,
                next_seq: Arc::new(AtomicU64::new(0)),
            },
            events_rx,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start the connection task. Calling this while the task is running is a
    /// no-op. Must be called from within a tokio runtime.
    pub fn connect(&mut self) {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = ConnectionWorker {
            endpoint: self.endpoint.clone(),
            reconnect: self.reconnect,
            status: Arc::clone(&self.status),
            events_tx: self.events_tx.clone(),
            outbound_rx,
            shutdown_rx,
            next_seq: Arc::clone(&self.next_seq),
            decoder: FrameDecoder::default(),
        };

        info!(endpoint = %self.endpoint, "starting stream channel");
        self.outbound_tx = Some(outbound_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(tokio::spawn(worker.run()));
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ChannelState {
        self.status().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Queue a frame for transmission. Fails unless the channel is `Open`.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        if self.state() != ChannelState::Open {
            return Err(ChannelError::NotConnected);
        }
        let text = frame
            .to_json()
            .map_err(|error| ChannelError::Encode(error.to_string()))?;
        let outbound = self.outbound_tx.as_ref().ok_or(ChannelError::Closed)?;
        outbound.send(text).map_err(|_| ChannelError::Closed)
    }

    /// Stop reconnecting and close the current connection, if any.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
        self.outbound_tx = None;
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(%error, "stream channel task ended abnormally");
            }
        }
        publish_state(&self.status, &self.events_tx, ChannelState::Disconnected);
    }
}

impl ChannelOps for StreamChannel {
    fn state(&self) -> ChannelState {
        StreamChannel::state(self)
    }

    fn epoch(&self) -> ConnectionEpoch {
        self.status().epoch
    }

    fn send(&mut self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        StreamChannel::send(self, frame)
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
    }
}

enum PumpExit {
    Closed,
    Shutdown,
}

struct ConnectionWorker {
    endpoint: String,
    reconnect: ReconnectPolicy,
    status: Arc<watch::Sender<ChannelStatus>>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: watch::Receiver<bool>,
    next_seq: Arc<AtomicU64>,
    decoder: FrameDecoder,
}

impl ConnectionWorker {
    async fn run(mut self) {
        let mut attempt: u64 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            publish_state(&self.status, &self.events_tx, ChannelState::Connecting);
            let connected = tokio::select! {
                result = connect_async(self.endpoint.as_str()) => Some(result),
                _ = wait_for_shutdown(&mut self.shutdown_rx) => None,
            };

            let exit = match connected {
                None => PumpExit::Shutdown,
                Some(Ok((socket, _response))) => {
                    attempt = 0;
                    let epoch = self.mark_open();
                    info!(endpoint = %self.endpoint, epoch, "stream channel open");
                    self.pump(socket, epoch).await
                }
                Some(Err(error)) => {
                    attempt += 1;
                    warn!(endpoint = %self.endpoint, attempt, %error, "stream connect failed");
                    PumpExit::Closed
                }
            };

            publish_state(&self.status, &self.events_tx, ChannelState::Disconnected);
            self.discard_outbound();

            if matches!(exit, PumpExit::Shutdown) {
                break;
            }

            let delay = self.reconnect.delay_for(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "scheduling stream reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut self.shutdown_rx) => break,
            }
        }

        publish_state(&self.status, &self.events_tx, ChannelState::Disconnected);
        debug!(
            dropped_frames = self.decoder.dropped(),
            "stream channel task stopped"
        );
    }

    async fn pump(&mut self, socket: Socket, epoch: ConnectionEpoch) -> PumpExit {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frames = self.decoder.decode(&text);
                        self.deliver(epoch, frames);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let frames = self.decoder.decode_bytes(&bytes);
                        self.deliver(epoch, frames);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "stream closed by peer");
                        return PumpExit::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "stream read failed");
                        return PumpExit::Closed;
                    }
                    None => return PumpExit::Closed,
                },
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(text) => {
                        if let Err(error) = sink.send(Message::Text(text)).await {
                            warn!(%error, "stream write failed");
                            return PumpExit::Closed;
                        }
                    }
                    None => return PumpExit::Shutdown,
                },
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Shutdown;
                }
            }
        }
    }

    fn mark_open(&self) -> ConnectionEpoch {
        let mut epoch = 0;
        self.status.send_modify(|current| {
            current.epoch += 1;
            current.state = ChannelState::Open;
            epoch = current.epoch;
        });
        let _ = self
            .events_tx
            .send(ChannelEvent::StateChanged(ChannelState::Open));
        epoch
    }

    fn deliver(&self, epoch: ConnectionEpoch, frames: Vec<InboundFrame>) {
        for frame in frames {
            let seq = self.next_seq.fetch_add(1, Ordering::AcqRel) + 1;
            if self
                .events_tx
                .send(ChannelEvent::Frame(Delivery { seq, epoch, frame }))
                .is_err()
            {
                debug!(seq, "no stream event receiver; frame dropped");
            }
        }
    }

    /// Messages queued for a connection that is gone are never sent.
    fn discard_outbound(&mut self) {
        let mut discarded = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "discarded unsent stream messages");
        }
    }
}

fn publish_state(
    status: &watch::Sender<ChannelStatus>,
    events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    state: ChannelState,
) {
    let changed = status.send_if_modified(|current| {
        if current.state == state {
            false
        } else {
            current.state = state;
            true
        }
    });
    if changed {
        let _ = events_tx.send(ChannelEvent::StateChanged(state));
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
