//! Receiver configuration
//!
//! Loaded from TOML, every section falls back to the defaults in
//! [`crate::constants`] when omitted.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::CodecMode;
use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level receiver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiverConfig {
    pub network: NetworkConfig,
    pub codec: CodecConfig,
    pub sink: SinkConfig,
}

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// 0 retries until success or shutdown
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: 0,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// No delay between attempts, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay_ms: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(DEFAULT_BIND_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Network endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub port: u16,
    pub recv_timeout_ms: u64,
    pub broadcast: bool,
    pub reuse_address: bool,
    pub bind_retry: RetryPolicy,
}

impl NetworkConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_UDP_PORT,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT.as_millis() as u64,
            broadcast: true,
            reuse_address: true,
            bind_retry: RetryPolicy::default(),
        }
    }
}

/// Codec configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    /// Mode at startup; can be switched live afterwards
    pub mode: CodecMode,
    pub compressed_frame_bytes: usize,
    pub init_retry: RetryPolicy,
    pub opus_frame_ms: f32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mode: CodecMode::Raw,
            compressed_frame_bytes: COMPRESSED_FRAME_BYTES,
            init_retry: RetryPolicy::unbounded(DEFAULT_RETRY_DELAY),
            opus_frame_ms: DEFAULT_OPUS_FRAME_MS,
        }
    }
}

/// Playback sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Bytes per raw PCM frame, also the device buffer hint
    pub buffer_size: usize,
    pub low_latency: bool,
    pub queue_frames: usize,
    /// Output device id as reported by `list_output_devices`; default device when empty
    pub device_id: String,
}

impl SinkConfig {
    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth as usize / 8
    }

    /// Device buffer size in frames (one sample per channel)
    pub fn buffer_frames(&self) -> u32 {
        (self.buffer_size / (self.bytes_per_sample() * self.channels as usize)) as u32
    }

    /// Playback time of one PCM frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_frames() as f64 / self.sample_rate as f64)
    }

    /// Longest a write may block on a full queue before the device counts as stalled
    pub fn write_timeout(&self) -> Duration {
        (self.frame_duration() * self.queue_frames as u32).max(MIN_SINK_WRITE_TIMEOUT)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bit_depth: DEFAULT_BIT_DEPTH,
            buffer_size: PCM_FRAME_BYTES,
            low_latency: true,
            queue_frames: DEFAULT_SINK_QUEUE_FRAMES,
            device_id: String::new(),
        }
    }
}

impl ReceiverConfig {
    /// Platform config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lan-audio-receiver")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the platform config file, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.recv_timeout_ms == 0 {
            return Err(Error::Config("recv_timeout_ms must be non-zero".into()));
        }
        if self.sink.bit_depth != 16 {
            return Err(Error::Config(format!(
                "unsupported bit depth {}, only 16-bit PCM is streamed",
                self.sink.bit_depth
            )));
        }
        if self.sink.channels == 0 {
            return Err(Error::Config("channels must be non-zero".into()));
        }
        if self.sink.buffer_size == 0 || self.codec.compressed_frame_bytes == 0 {
            return Err(Error::Config("frame sizes must be non-zero".into()));
        }
        if self.codec.compressed_frame_bytes > self.sink.buffer_size {
            return Err(Error::Config(format!(
                "compressed frame ({} bytes) larger than PCM frame ({} bytes)",
                self.codec.compressed_frame_bytes, self.sink.buffer_size
            )));
        }
        if self.network.bind_retry.max_attempts == 0 {
            return Err(Error::Config("bind_retry.max_attempts must be non-zero".into()));
        }
        if self.sink.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".into()));
        }
        if self.sink.queue_frames == 0 {
            return Err(Error::Config("queue_frames must be non-zero".into()));
        }
        Ok(())
    }
}
