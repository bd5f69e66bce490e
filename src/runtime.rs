use pipeline_api::{ChannelEvent, PipelineApiClient, PipelineApiError, StreamChannel};
use session_store::{FileSessionStorage, SessionCorrelator, SessionStoreError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::EnvConfig;
use crate::controller::{
    ControllerError, ControllerSnapshot, CycleId, FrameOutcome, StreamController,
};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Api(#[from] PipelineApiError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
}

/// Owns the channel, the controller, and the REST client, and republishes a
/// [`ControllerSnapshot`] after every change.
///
/// All state changes happen on the caller's task: channel events are pulled
/// with [`PipelineRuntime::next_event`] and fed back through
/// [`PipelineRuntime::apply`].
#[derive(Debug)]
pub struct PipelineRuntime {
    channel: StreamChannel,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    controller: StreamController,
    api: PipelineApiClient,
    snapshots: watch::Sender<ControllerSnapshot>,
}

impl PipelineRuntime {
    pub fn new(config: &EnvConfig) -> Result<Self, RuntimeError> {
        let api_config = config.api_config();
        let (channel, events) = StreamChannel::new(&api_config)?;
        let api = PipelineApiClient::new(api_config)?;
        let correlator = match config.session_file.as_deref() {
            Some(path) => SessionCorrelator::open(FileSessionStorage::new(path))?,
            None => SessionCorrelator::in_memory(),
        };
        let controller = StreamController::new(correlator);
        let (snapshots, _) = watch::channel(controller.snapshot());

        Ok(Self {
            channel,
            events,
            controller,
            api,
            snapshots,
        })
    }

    /// Start the channel's connection task. Requires a tokio runtime.
    pub fn connect(&mut self) {
        self.channel.connect();
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    pub fn api(&self) -> &PipelineApiClient {
        &self.api
    }

    pub fn endpoint(&self) -> &str {
        self.channel.endpoint()
    }

    /// Next channel event, or `None` once the channel is gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn apply(&mut self, event: ChannelEvent) -> Option<FrameOutcome> {
        let outcome = self.controller.apply(event);
        self.publish();
        outcome
    }

    pub fn submit(&mut self, message: &str) -> Result<CycleId, ControllerError> {
        let started = self.controller.start(&mut self.channel, message, None);
        self.publish();
        started
    }

    /// Reset local state, then ask the backend to drop the session. The
    /// backend call is best-effort: local state is already clear when it runs.
    pub async fn reset(&mut self) {
        let session_id = self.controller.session_id().map(ToOwned::to_owned);
        self.controller.reset();
        self.publish();

        let Some(session_id) = session_id else {
            return;
        };
        match self.api.reset_session(&session_id).await {
            Ok(response) => debug!(
                session_id = %response.session_id,
                success = response.success,
                "backend session reset"
            ),
            Err(error) => warn!(%error, "backend session reset failed; local state already cleared"),
        }
    }

    /// Close the channel and apply whatever it reported on the way down.
    pub async fn shutdown(&mut self) {
        self.channel.close().await;
        while let Ok(event) = self.events.try_recv() {
            self.controller.apply(event);
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.controller.snapshot());
    }
}
