//! Stream loop counters, readable from any thread

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StreamStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    frames_played: AtomicU64,
    silent_frames: AtomicU64,
    decode_faults: AtomicU64,
    timeouts: AtomicU64,
    reconnects: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_played(&self) {
        self.frames_played.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_silent(&self) {
        self.silent_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_fault(&self) {
        self.decode_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            silent_frames: self.silent_frames.load(Ordering::Relaxed),
            decode_faults: self.decode_faults.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub bytes: u64,
    pub frames_played: u64,
    pub silent_frames: u64,
    pub decode_faults: u64,
    pub timeouts: u64,
    pub reconnects: u64,
}

impl StatsSnapshot {
    /// Fraction of datagrams that were silence
    pub fn silence_rate(&self) -> f32 {
        if self.datagrams == 0 {
            0.0
        } else {
            self.silent_frames as f32 / self.datagrams as f32
        }
    }
}
