//! Opus frame decoder
//!
//! Decodes one Opus packet per datagram into little-endian 16-bit PCM of a
//! fixed frame duration.

use opus::{Channels, Decoder};

use super::FrameDecoder;
use crate::error::CodecError;

/// Opus-backed [`FrameDecoder`]
pub struct OpusFrameDecoder {
    decoder: Option<Decoder>,
    sample_rate: u32,
    channels: u16,
    /// Samples per channel in one frame
    frame_size: usize,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<i16>,
}

impl OpusFrameDecoder {
    /// Create a decoder for frames of `frame_ms` milliseconds.
    ///
    /// The Opus state itself is created lazily by [`FrameDecoder::init`].
    pub fn new(sample_rate: u32, channels: u16, frame_ms: f32) -> Result<Self, CodecError> {
        if channels != 1 && channels != 2 {
            return Err(CodecError::DecoderInit(format!(
                "Unsupported channel count: {}",
                channels
            )));
        }

        let frame_size = (sample_rate as f32 * frame_ms / 1000.0) as usize;
        if frame_size == 0 {
            return Err(CodecError::DecoderInit(format!(
                "Frame of {}ms is empty at {}Hz",
                frame_ms, sample_rate
            )));
        }

        Ok(Self {
            decoder: None,
            sample_rate,
            channels,
            frame_size,
            decode_buffer: vec![0i16; frame_size * channels as usize],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get frame size in samples (per channel)
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn opus_channels(&self) -> Channels {
        if self.channels == 1 {
            Channels::Mono
        } else {
            Channels::Stereo
        }
    }
}

impl FrameDecoder for OpusFrameDecoder {
    fn init(&mut self) -> bool {
        if self.decoder.is_some() {
            return true;
        }
        match Decoder::new(self.sample_rate, self.opus_channels()) {
            Ok(decoder) => {
                self.decoder = Some(decoder);
                true
            }
            Err(e) => {
                tracing::warn!("Opus decoder init failed: {}", e);
                false
            }
        }
    }

    fn pcm_frame_bytes(&self) -> usize {
        self.decode_buffer.len() * 2
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        let decoder = self.decoder.as_mut().ok_or(CodecError::NotInitialized)?;

        let samples = decoder
            .decode(input, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.channels as usize;
        if total_samples * 2 > output.len() {
            return Err(CodecError::InvalidFrameSize {
                expected: output.len(),
                actual: total_samples * 2,
            });
        }

        for (chunk, sample) in output
            .chunks_exact_mut(2)
            .zip(&self.decode_buffer[..total_samples])
        {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        Ok(total_samples * 2)
    }
}
