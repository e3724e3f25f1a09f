//! Error types for the audio receiver

use std::io;
use thiserror::Error;

/// Main error type for the receiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Stream loop thread panicked")]
    Panicked,
}

impl Error {
    /// Whether the error must terminate the stream loop.
    ///
    /// Transient network conditions and per-frame decode faults are handled
    /// inside the loop; everything else propagates to its owner.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_transient() && !matches!(e, NetworkError::ReceiveFault(_)),
            Error::Codec(_) => false,
            _ => true,
        }
    }
}

/// Playback sink errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Sink is closed")]
    SinkClosed,

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Codec adapter errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Decoder used before initialization")]
    NotInitialized,

    #[error("No decoder configured for compressed mode")]
    Unavailable,

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid frame size: expected {expected} bytes, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to bind port {port} after {attempts} attempts: {last_error}")]
    BindExhausted {
        port: u16,
        attempts: u32,
        last_error: String,
    },

    #[error("Receive timed out")]
    ReceiveTimeout,

    #[error("Receive failed: {0}")]
    ReceiveFault(#[source] io::Error),

    #[error("Shutdown requested")]
    Cancelled,
}

impl NetworkError {
    /// Classify a raw receive error.
    ///
    /// A socket read timeout surfaces as `WouldBlock` on Unix and `TimedOut`
    /// on Windows; both mean "no datagram within the timeout".
    pub fn from_receive(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => NetworkError::ReceiveTimeout,
            _ => NetworkError::ReceiveFault(err),
        }
    }

    /// Expected conditions that need no socket recreation
    pub fn is_transient(&self) -> bool {
        matches!(self, NetworkError::ReceiveTimeout | NetworkError::Cancelled)
    }
}

/// Result type alias for the receiver
pub type Result<T> = std::result::Result<T, Error>;
