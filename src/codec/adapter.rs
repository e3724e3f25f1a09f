//! Codec adapter
//!
//! Wraps a [`FrameDecoder`] behind the receiver's contract: a one-time init
//! handshake polled with backoff, then fixed-size compressed in, fixed-size
//! PCM out. Any deviation is reported as a [`CodecError`] so the stream loop
//! can skip the frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::FrameDecoder;
use crate::config::RetryPolicy;
use crate::error::CodecError;

/// Adapter around an external decoder
pub struct CodecAdapter<D> {
    decoder: D,
    ready: bool,
    max_input_bytes: usize,
    /// Decoded PCM (reused to avoid allocations)
    output: Vec<u8>,
    frames_decoded: u64,
    decode_failures: u64,
    init_attempts: u32,
}

impl<D: FrameDecoder> CodecAdapter<D> {
    /// `max_input_bytes` is the compressed frame capacity for this mode
    pub fn new(decoder: D, max_input_bytes: usize) -> Self {
        let output = vec![0u8; decoder.pcm_frame_bytes()];
        Self {
            decoder,
            ready: false,
            max_input_bytes,
            output,
            frames_decoded: 0,
            decode_failures: 0,
            init_attempts: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Poll the decoder's init handshake until it is ready.
    ///
    /// Returns `Ok(false)` if `running` is cleared before the decoder became
    /// ready, and `DecoderInit` if a bounded policy runs out of attempts.
    pub fn initialize(&mut self, policy: &RetryPolicy, running: &AtomicBool) -> Result<bool, CodecError> {
        let mut attempts = 0;
        while !self.ready {
            if !running.load(Ordering::SeqCst) {
                return Ok(false);
            }
            if !policy.allows(attempts) {
                return Err(CodecError::DecoderInit(format!(
                    "decoder not ready after {} attempts",
                    attempts
                )));
            }

            attempts += 1;
            self.init_attempts += 1;
            if self.decoder.init() {
                self.ready = true;
                tracing::info!("Decoder ready after {} attempt(s)", attempts);
            } else {
                tracing::debug!("Decoder not ready (attempt {}), retrying", attempts);
                thread::sleep(policy.delay());
            }
        }
        Ok(true)
    }

    /// One init attempt without waiting, for use while streaming.
    ///
    /// Returns whether the decoder is ready afterwards.
    pub fn try_initialize(&mut self) -> bool {
        if !self.ready {
            self.init_attempts += 1;
            self.ready = self.decoder.init();
            if self.ready {
                tracing::info!("Decoder ready after {} attempt(s)", self.init_attempts);
            }
        }
        self.ready
    }

    /// Decode one compressed frame into the fixed-size PCM frame
    pub fn decode(&mut self, input: &[u8]) -> Result<&[u8], CodecError> {
        match self.decode_inner(input) {
            Ok(()) => {
                self.frames_decoded += 1;
                Ok(&self.output)
            }
            Err(e) => {
                self.decode_failures += 1;
                Err(e)
            }
        }
    }

    fn decode_inner(&mut self, input: &[u8]) -> Result<(), CodecError> {
        if !self.ready {
            return Err(CodecError::NotInitialized);
        }
        if input.is_empty() || input.len() > self.max_input_bytes {
            return Err(CodecError::InvalidFrameSize {
                expected: self.max_input_bytes,
                actual: input.len(),
            });
        }

        let written = self.decoder.decode(input, &mut self.output)?;
        if written != self.output.len() {
            return Err(CodecError::InvalidFrameSize {
                expected: self.output.len(),
                actual: written,
            });
        }
        Ok(())
    }

    pub fn pcm_frame_bytes(&self) -> usize {
        self.output.len()
    }

    pub fn stats(&self) -> CodecStats {
        CodecStats {
            frames_decoded: self.frames_decoded,
            decode_failures: self.decode_failures,
            init_attempts: self.init_attempts,
        }
    }
}

/// Codec adapter statistics
#[derive(Debug, Clone, Default)]
pub struct CodecStats {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub init_attempts: u32,
}
