//! # LAN Audio Receiver
//!
//! Resilient low-latency receiver for a continuous UDP audio stream.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 UDP datagrams (port 4051, any sender)
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     Stream Loop (stream::StreamLoop)                  │
//! │                       dedicated "stream-loop" thread                  │
//! │                                                                      │
//! │  ┌────────────────┐   ┌──────────────────┐   ┌────────────────────┐  │
//! │  │ Socket Manager │──▶│  Frame Receiver  │──▶│   Sender Tracker   │──┼──▶ SenderEvent
//! │  │ (bind + retry) │   │ (silence filter) │   │ (last writer wins) │  │    channel / UI
//! │  └───────▲────────┘   └────────┬─────────┘   └────────────────────┘  │
//! │          │ recreate            │ non-silent frame                    │
//! │          │ on fault            ▼                                     │
//! │          │            ┌──────────────────┐                           │
//! │          │            │  Codec Adapter   │ (compressed mode only)    │
//! │          │            └────────┬─────────┘                           │
//! │          │                     ▼                                     │
//! │          │            ┌──────────────────┐                           │
//! │          └────────────│  Playback Sink   │ opened once, never reopened│
//! │                       └──────────────────┘                           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod stream;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Fixed UDP port the sender streams to
    pub const DEFAULT_UDP_PORT: u16 = 4051;

    /// Receive timeout; bounds shutdown latency and silent-sender detection
    pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bind attempts before giving up
    pub const DEFAULT_BIND_ATTEMPTS: u32 = 10;

    /// Delay between bind attempts and codec init polls
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Default sample rate for playback
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// PCM sample width
    pub const DEFAULT_BIT_DEPTH: u16 = 16;

    /// Raw PCM datagram size in bytes
    pub const PCM_FRAME_BYTES: usize = 2048;

    /// Compressed frames are a quarter of the raw size
    pub const COMPRESSION_RATIO: usize = 4;

    /// Compressed datagram size in bytes
    pub const COMPRESSED_FRAME_BYTES: usize = PCM_FRAME_BYTES / COMPRESSION_RATIO;

    /// Default Opus frame duration in milliseconds
    pub const DEFAULT_OPUS_FRAME_MS: f32 = 10.0;

    /// Frames queued between the stream loop and the audio callback
    pub const DEFAULT_SINK_QUEUE_FRAMES: usize = 4;

    /// Floor for how long a sink write may wait on a full queue
    pub const MIN_SINK_WRITE_TIMEOUT: Duration = Duration::from_millis(50);

    /// Pending sender-change events before new ones are dropped
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}
