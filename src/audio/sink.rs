//! Playback sink abstraction
//!
//! A real-time output with a fixed sample format. The stream loop opens and
//! starts it once and never reopens it: only the network is unreliable.

use crate::error::AudioError;

pub use crate::config::SinkConfig;

/// Real-time audio output accepting little-endian 16-bit PCM
pub trait PlaybackSink: Send {
    /// Begin playback; called once before the first write
    fn start(&mut self) -> Result<(), AudioError>;

    /// Queue one PCM frame, blocking under device backpressure.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError>;

    /// Stop playback; no writes follow
    fn stop(&mut self);
}

impl<S: PlaybackSink + ?Sized> PlaybackSink for Box<S> {
    fn start(&mut self) -> Result<(), AudioError> {
        (**self).start()
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError> {
        (**self).write(pcm)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Convert little-endian 16-bit PCM to normalized f32, appending to `out`
pub fn pcm_to_f32(pcm: &[u8], out: &mut Vec<f32>) {
    out.extend(
        pcm.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0),
    );
}
