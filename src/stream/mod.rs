//! Stream loop
//!
//! Composes socket manager, frame receiver, sender tracker, codec adapter and
//! playback sink into one continuously running loop:
//!
//! ```text
//! INITIALIZING ──▶ STREAMING ──(receive fault)──▶ RECOVERING ──▶ STREAMING ──▶ … ──▶ STOPPED
//! ```
//!
//! Receive faults close and rebind the socket in place. Timeouts, silence
//! and decode faults never touch the socket. Bind exhaustion and sink
//! failures end the loop and propagate to its owner.

pub mod handle;
pub mod stats;

pub use handle::StreamHandle;
pub use stats::{StatsSnapshot, StreamStats};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::PlaybackSink;
use crate::codec::{CodecAdapter, CodecMode, CodecModeSwitch, CodecStats, FrameDecoder};
use crate::config::{ReceiverConfig, RetryPolicy};
use crate::error::{CodecError, NetworkError, Result};
use crate::network::{
    EndpointBinder, EventPublisher, FrameReceiver, SenderHandle, SenderTracker, SocketManager,
};

type BoxedDecoder = Box<dyn FrameDecoder>;

/// Lifecycle of a stream loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Initializing,
    Streaming,
    Recovering,
    Stopped,
}

/// What one iteration did with its datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Played,
    Silent,
    Skipped,
    TimedOut,
}

/// The receive → filter → decode → play loop.
///
/// Sole owner of the endpoint, the frame buffers, the decoder and the sink.
pub struct StreamLoop<B: EndpointBinder, S> {
    port: u16,
    sockets: SocketManager<B>,
    receiver: FrameReceiver,
    tracker: SenderTracker,
    events: EventPublisher,
    codec: Option<CodecAdapter<BoxedDecoder>>,
    compressed_frame_bytes: usize,
    init_retry: RetryPolicy,
    mode: CodecModeSwitch,
    sink: S,
    running: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
    state: StreamState,
}

impl<B: EndpointBinder, S: PlaybackSink> StreamLoop<B, S> {
    /// Build a loop for an already opened sink
    pub fn new(config: &ReceiverConfig, binder: B, sink: S) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let sockets = SocketManager::new(binder, config.network.clone())
            .with_running_flag(running.clone());

        Self {
            port: config.network.port,
            sockets,
            receiver: FrameReceiver::new(config.sink.buffer_size, config.codec.compressed_frame_bytes),
            tracker: SenderTracker::new(),
            events: EventPublisher::disabled(),
            codec: None,
            compressed_frame_bytes: config.codec.compressed_frame_bytes,
            init_retry: config.codec.init_retry,
            mode: CodecModeSwitch::new(config.codec.mode),
            sink,
            running,
            stats: Arc::new(StreamStats::new()),
            state: StreamState::Initializing,
        }
    }

    /// Decoder used in compressed mode
    pub fn with_decoder<D: FrameDecoder + 'static>(mut self, decoder: D) -> Self {
        let decoder: BoxedDecoder = Box::new(decoder);
        self.codec = Some(CodecAdapter::new(decoder, self.compressed_frame_bytes));
        self
    }

    /// Where sender-change events go
    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = events;
        self
    }

    /// Share an externally owned mode toggle
    pub fn with_mode_switch(mut self, mode: CodecModeSwitch) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode_switch(&self) -> CodecModeSwitch {
        self.mode.clone()
    }

    pub fn sender_handle(&self) -> SenderHandle {
        self.tracker.handle()
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        self.stats.clone()
    }

    /// Clearing this flag stops the loop within one receive timeout
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Decoder counters, `None` without a decoder
    pub fn codec_stats(&self) -> Option<CodecStats> {
        self.codec.as_ref().map(CodecAdapter::stats)
    }

    /// Run until stopped or a fatal error occurs.
    ///
    /// The sink is stopped before this returns, whatever the outcome.
    pub fn run(mut self) -> Result<()> {
        let result = self.stream();
        if let Err(e) = &result {
            tracing::error!("Stream loop failed: {}", e);
        }
        self.shutdown();
        result
    }

    fn stream(&mut self) -> Result<()> {
        self.set_state(StreamState::Initializing);
        self.sink.start()?;

        if self.mode.get() == CodecMode::Compressed {
            let codec = self.codec.as_mut().ok_or(CodecError::Unavailable)?;
            if !codec.initialize(&self.init_retry, &self.running)? {
                return Ok(());
            }
        }

        let mut endpoint = match self.sockets.acquire_endpoint(self.port) {
            Ok(endpoint) => endpoint,
            Err(NetworkError::Cancelled) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.set_state(StreamState::Streaming);

        while self.running.load(Ordering::SeqCst) {
            match self.step(&mut endpoint) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("{}, recreating socket", e);
                    endpoint = match self.recover(endpoint) {
                        Ok(endpoint) => endpoint,
                        Err(NetworkError::Cancelled) => break,
                        Err(e) => return Err(e.into()),
                    };
                }
            }
        }

        Ok(())
    }

    /// One datagram through the pipeline
    fn step(&mut self, endpoint: &mut B::Endpoint) -> Result<Step> {
        let mode = self.mode.get();

        let frame = match self.receiver.receive_into(endpoint, mode) {
            Ok(frame) => frame,
            Err(NetworkError::ReceiveTimeout) => {
                self.stats.record_timeout();
                if self.tracker.current().is_some() {
                    tracing::info!("No audio within the receive timeout, sender considered gone");
                    self.events.publish(self.tracker.disconnect());
                }
                return Ok(Step::TimedOut);
            }
            Err(e) => return Err(e.into()),
        };

        self.stats.record_datagram(frame.len());
        if let Some(event) = self.tracker.observe(frame.origin.ip()) {
            tracing::info!("Streaming from {}", frame.origin.ip());
            self.events.publish(event);
        }

        // Silence is checked before decoding in both modes
        if frame.is_silent() {
            self.stats.record_silent();
            return Ok(Step::Silent);
        }

        let pcm = match mode {
            CodecMode::Raw => frame.payload,
            CodecMode::Compressed => {
                match decode_frame(&mut self.codec, frame.payload) {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        tracing::warn!("Skipping frame from {}: {}", frame.origin, e);
                        self.stats.record_decode_fault();
                        return Ok(Step::Skipped);
                    }
                }
            }
        };

        let written = self.sink.write(pcm)?;
        if written != pcm.len() {
            tracing::debug!("Sink accepted {} of {} bytes", written, pcm.len());
        }
        self.stats.record_played();
        Ok(Step::Played)
    }

    /// Close the broken endpoint and bind a fresh one
    fn recover(&mut self, endpoint: B::Endpoint) -> std::result::Result<B::Endpoint, NetworkError> {
        self.set_state(StreamState::Recovering);
        drop(endpoint);

        self.events.publish(self.tracker.disconnect());
        self.stats.record_reconnect();

        let endpoint = self.sockets.acquire_endpoint(self.port)?;
        self.set_state(StreamState::Streaming);
        Ok(endpoint)
    }

    fn shutdown(&mut self) {
        self.set_state(StreamState::Stopped);
        self.sink.stop();
        self.events.publish(self.tracker.disconnect());

        let stats = self.stats.snapshot();
        tracing::info!(
            "Stream loop stopped: {} datagrams, {} played, {} silent, {} decode faults, {} reconnects",
            stats.datagrams,
            stats.frames_played,
            stats.silent_frames,
            stats.decode_faults,
            stats.reconnects
        );
        if let Some(codec) = self.codec_stats() {
            tracing::info!(
                "Decoder: {} frames decoded, {} failures, {} init attempts",
                codec.frames_decoded,
                codec.decode_failures,
                codec.init_attempts
            );
        }
    }

    fn set_state(&mut self, state: StreamState) {
        if self.state != state {
            tracing::debug!("Stream state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

/// Decode one compressed payload.
///
/// A decoder that is not ready yet gets one init attempt per frame; until it
/// succeeds frames fail with `NotInitialized` and the loop keeps receiving.
fn decode_frame<'a>(
    codec: &'a mut Option<CodecAdapter<BoxedDecoder>>,
    payload: &[u8],
) -> std::result::Result<&'a [u8], CodecError> {
    let codec = codec.as_mut().ok_or(CodecError::Unavailable)?;
    codec.try_initialize();
    codec.decode(payload)
}
