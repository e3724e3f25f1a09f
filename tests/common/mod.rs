//! Scripted network endpoints, recording sinks and test decoders

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lan_audio_receiver::audio::PlaybackSink;
use lan_audio_receiver::codec::{CodecMode, CodecModeSwitch, FrameDecoder};
use lan_audio_receiver::config::{NetworkConfig, ReceiverConfig, RetryPolicy};
use lan_audio_receiver::error::{AudioError, CodecError, NetworkError};
use lan_audio_receiver::network::{DatagramEndpoint, EndpointBinder};

/// One scripted receive result
#[derive(Debug, Clone)]
pub enum Recv {
    Datagram(SocketAddr, Vec<u8>),
    Timeout,
    Fault,
    /// Flip the codec mode, then report a timeout
    SwitchMode(CodecMode),
}

#[derive(Default)]
struct ScriptState {
    receives: VecDeque<Recv>,
    /// Results of successive bind calls; binds succeed once exhausted
    binds: VecDeque<bool>,
    bind_calls: usize,
    running: Option<Arc<AtomicBool>>,
    mode: Option<CodecModeSwitch>,
}

/// Shared script driving [`ScriptedBinder`] and its endpoints.
///
/// When the receive script runs out the loop's running flag is cleared, so
/// `StreamLoop::run` returns once everything has been replayed.
#[derive(Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    pub fn new(receives: impl IntoIterator<Item = Recv>) -> Self {
        let script = Self::default();
        script.state.lock().receives.extend(receives);
        script
    }

    pub fn with_binds(self, binds: impl IntoIterator<Item = bool>) -> Self {
        self.state.lock().binds.extend(binds);
        self
    }

    pub fn attach(&self, running: Arc<AtomicBool>, mode: CodecModeSwitch) {
        let mut state = self.state.lock();
        state.running = Some(running);
        state.mode = Some(mode);
    }

    pub fn binder(&self) -> ScriptedBinder {
        ScriptedBinder {
            script: self.clone(),
        }
    }

    pub fn bind_calls(&self) -> usize {
        self.state.lock().bind_calls
    }
}

pub struct ScriptedBinder {
    script: Script,
}

impl EndpointBinder for ScriptedBinder {
    type Endpoint = ScriptedEndpoint;

    fn bind(&mut self, _port: u16, _config: &NetworkConfig) -> io::Result<ScriptedEndpoint> {
        let mut state = self.script.state.lock();
        state.bind_calls += 1;
        if state.binds.pop_front().unwrap_or(true) {
            Ok(ScriptedEndpoint {
                script: self.script.clone(),
            })
        } else {
            Err(io::Error::from(io::ErrorKind::AddrInUse))
        }
    }
}

pub struct ScriptedEndpoint {
    script: Script,
}

impl DatagramEndpoint for ScriptedEndpoint {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
        let mut state = self.script.state.lock();
        match state.receives.pop_front() {
            Some(Recv::Datagram(origin, payload)) => {
                let n = payload.len().min(buf.len());
                buf[..n].copy_from_slice(&payload[..n]);
                Ok((n, origin))
            }
            Some(Recv::Timeout) => Err(NetworkError::ReceiveTimeout),
            Some(Recv::Fault) => Err(NetworkError::ReceiveFault(io::Error::from(
                io::ErrorKind::ConnectionReset,
            ))),
            Some(Recv::SwitchMode(mode)) => {
                if let Some(switch) = &state.mode {
                    switch.set(mode);
                }
                Err(NetworkError::ReceiveTimeout)
            }
            None => {
                if let Some(running) = &state.running {
                    running.store(false, Ordering::SeqCst);
                }
                Err(NetworkError::ReceiveTimeout)
            }
        }
    }
}

/// Endpoint that blocks for `timeout` and never receives anything
pub struct IdleBinder {
    pub timeout: Duration,
}

pub struct IdleEndpoint {
    timeout: Duration,
}

impl EndpointBinder for IdleBinder {
    type Endpoint = IdleEndpoint;

    fn bind(&mut self, _port: u16, _config: &NetworkConfig) -> io::Result<IdleEndpoint> {
        Ok(IdleEndpoint {
            timeout: self.timeout,
        })
    }
}

impl DatagramEndpoint for IdleEndpoint {
    fn recv_from(&mut self, _buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
        std::thread::sleep(self.timeout);
        Err(NetworkError::ReceiveTimeout)
    }
}

/// Endpoint that returns the same datagram on every receive
pub struct FloodBinder {
    pub origin: SocketAddr,
    pub payload: Vec<u8>,
}

pub struct FloodEndpoint {
    origin: SocketAddr,
    payload: Vec<u8>,
}

impl EndpointBinder for FloodBinder {
    type Endpoint = FloodEndpoint;

    fn bind(&mut self, _port: u16, _config: &NetworkConfig) -> io::Result<FloodEndpoint> {
        Ok(FloodEndpoint {
            origin: self.origin,
            payload: self.payload.clone(),
        })
    }
}

impl DatagramEndpoint for FloodEndpoint {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
        let n = self.payload.len().min(buf.len());
        buf[..n].copy_from_slice(&self.payload[..n]);
        Ok((n, self.origin))
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub starts: usize,
    pub stopped: bool,
    pub writes: Vec<Vec<u8>>,
    pub writes_after_stop: usize,
}

/// Sink that records every call
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub log: Arc<Mutex<SinkLog>>,
    /// Fail the nth write (1-based)
    pub fail_on_write: Option<usize>,
}

impl RecordingSink {
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on_write: Some(n),
            ..Default::default()
        }
    }

    pub fn write_lengths(&self) -> Vec<usize> {
        self.log.lock().writes.iter().map(Vec::len).collect()
    }
}

impl PlaybackSink for RecordingSink {
    fn start(&mut self) -> Result<(), AudioError> {
        self.log.lock().starts += 1;
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError> {
        let mut log = self.log.lock();
        if log.stopped {
            log.writes_after_stop += 1;
        }
        if self.fail_on_write == Some(log.writes.len() + 1) {
            return Err(AudioError::StreamError("device unplugged".into()));
        }
        log.writes.push(pcm.to_vec());
        Ok(pcm.len())
    }

    fn stop(&mut self) {
        self.log.lock().stopped = true;
    }
}

/// Expands each compressed byte into four PCM bytes.
///
/// Payloads starting with `0xFF` fail to decode.
#[derive(Clone, Default)]
pub struct ExpandingDecoder {
    pub decode_calls: Arc<AtomicUsize>,
    pub init_calls: Arc<AtomicUsize>,
    pub not_ready_polls: usize,
}

impl FrameDecoder for ExpandingDecoder {
    fn init(&mut self) -> bool {
        let calls = self.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
        calls > self.not_ready_polls
    }

    fn pcm_frame_bytes(&self) -> usize {
        2048
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        if input.first() == Some(&0xFF) {
            return Err(CodecError::DecodingFailed("corrupt frame".into()));
        }
        let mut written = 0;
        for b in input {
            output[written..written + 4].fill(*b);
            written += 4;
        }
        Ok(written)
    }
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Defaults with instant retries
pub fn test_config() -> ReceiverConfig {
    let mut config = ReceiverConfig::default();
    config.network.bind_retry = RetryPolicy::immediate(3);
    config.network.recv_timeout_ms = 50;
    config.codec.init_retry = RetryPolicy::immediate(5);
    config
}

pub fn loud(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    payload[0] = 1;
    payload
}
