//! Transport for the agent pipeline backend.
//!
//! Two surfaces are covered: the persistent streaming channel that carries
//! request messages out and pipeline frames back, and the plain REST endpoints
//! (scenarios, health, one-shot chat, session reset). Nothing here knows about
//! request cycles or rendering; callers consume [`ChannelEvent`]s in order and
//! decide what each frame means.
//!
//! Reconnects are unbounded with a fixed delay. REST reads retry with
//! exponential backoff, REST writes never retry.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod frames;
pub mod retry;
pub mod url;

pub use channel::{
    ChannelEvent, ChannelOps, ChannelState, ChannelStatus, ConnectionEpoch, Delivery, FrameSeq,
    StreamChannel,
};
pub use client::PipelineApiClient;
pub use config::PipelineApiConfig;
pub use error::{parse_error_message, ChannelError, PipelineApiError};
pub use frames::FrameDecoder;
pub use retry::ReconnectPolicy;
pub use url::{api_endpoint, normalize_api_base, stream_endpoint};
