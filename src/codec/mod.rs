//! Codec layer
//!
//! The receiver treats the lossy codec as an opaque fixed-size transform:
//! a [`FrameDecoder`] turns one compressed datagram into one PCM frame. The
//! [`CodecAdapter`] owns the init handshake and enforces the size contract.

pub mod adapter;
pub mod decoder;

pub use adapter::{CodecAdapter, CodecStats};
pub use decoder::OpusFrameDecoder;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::CodecError;

/// Payload format, known out-of-band (there is no in-band header)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// Little-endian 16-bit interleaved PCM
    #[default]
    Raw,
    /// Codec frames that must be decoded before playback
    Compressed,
}

impl CodecMode {
    fn to_u8(self) -> u8 {
        match self {
            CodecMode::Raw => 0,
            CodecMode::Compressed => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CodecMode::Compressed,
            _ => CodecMode::Raw,
        }
    }
}

/// Shared, externally toggled codec mode.
///
/// Written by a UI/control context, read once per iteration by the stream loop.
#[derive(Debug, Clone)]
pub struct CodecModeSwitch {
    mode: Arc<AtomicU8>,
}

impl CodecModeSwitch {
    pub fn new(mode: CodecMode) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(mode.to_u8())),
        }
    }

    pub fn get(&self) -> CodecMode {
        CodecMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: CodecMode) {
        self.mode.store(mode.to_u8(), Ordering::Release);
    }
}

impl Default for CodecModeSwitch {
    fn default() -> Self {
        Self::new(CodecMode::Raw)
    }
}

/// An external decode routine with a fixed-size output contract.
///
/// `init` is polled until it reports readiness; `decode` is never called
/// before that. Implementations that are not reentrant need no locking here:
/// only the stream loop thread ever calls them.
pub trait FrameDecoder: Send {
    /// One-time initialization handshake; `true` once ready
    fn init(&mut self) -> bool;

    /// Size in bytes of every decoded PCM frame
    fn pcm_frame_bytes(&self) -> usize;

    /// Decode one compressed frame into `output`, returning bytes written
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn init(&mut self) -> bool {
        (**self).init()
    }

    fn pcm_frame_bytes(&self) -> usize {
        (**self).pcm_frame_bytes()
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        (**self).decode(input, output)
    }
}
