//! cpal-backed playback sink
//!
//! The cpal stream lives on its own thread (streams are not `Send` on every
//! platform). Frames reach the audio callback through a small bounded queue,
//! so `write` blocks once the device is `queue_frames` behind. A device that
//! stops consuming for longer than the queue's playback time, or reports
//! itself gone, fails the write.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::get_output_device;
use super::sink::{pcm_to_f32, PlaybackSink, SinkConfig};
use crate::error::AudioError;

/// Low-latency output on a cpal device
pub struct CpalSink {
    config: SinkConfig,
    stream_config: StreamConfig,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    queue: Option<FrameQueue>,
    frames_written: u64,
}

impl CpalSink {
    /// Validate the format and resolve the device; nothing plays until `start`
    pub fn open(config: &SinkConfig) -> Result<Self, AudioError> {
        if config.bit_depth != 16 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{}-bit PCM",
                config.bit_depth
            )));
        }
        if config.channels == 0 {
            return Err(AudioError::UnsupportedFormat("zero channels".into()));
        }

        // Fail early on a bad device id
        get_output_device(&config.device_id)?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: if config.low_latency {
                cpal::BufferSize::Fixed(config.buffer_frames())
            } else {
                cpal::BufferSize::Default
            },
        };

        Ok(Self {
            config: config.clone(),
            stream_config,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            queue: None,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_stream_thread(
        &self,
        frame_rx: Receiver<Vec<f32>>,
        recycle_tx: Sender<Vec<f32>>,
        error_tx: Sender<cpal::StreamError>,
        ready_tx: Sender<Result<(), AudioError>>,
    ) -> Result<JoinHandle<()>, AudioError> {
        let device_id = self.config.device_id.clone();
        let stream_config = self.stream_config.clone();
        let running = self.running.clone();

        thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let device = match get_output_device(&device_id) {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let stream = match build_stream(&device, &stream_config, frame_rx, recycle_tx, error_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, stopping playback
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }
}

/// Build the output stream, falling back to the default buffer size when the
/// device rejects the fixed low-latency one.
fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    frame_rx: Receiver<Vec<f32>>,
    recycle_tx: Sender<Vec<f32>>,
    error_tx: Sender<cpal::StreamError>,
) -> Result<cpal::Stream, AudioError> {
    let attempt = |config: &StreamConfig| {
        let frame_rx = frame_rx.clone();
        let recycle_tx = recycle_tx.clone();
        let error_tx = error_tx.clone();
        let mut feeder = CallbackFeeder::new(frame_rx, recycle_tx);

        device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feeder.fill(data),
            move |err| {
                let _ = error_tx.try_send(err);
            },
            None,
        )
    };

    match attempt(config) {
        Ok(stream) => Ok(stream),
        Err(e) if matches!(config.buffer_size, cpal::BufferSize::Fixed(_)) => {
            tracing::warn!("Low-latency buffer rejected ({}), using device default", e);
            let fallback = StreamConfig {
                buffer_size: cpal::BufferSize::Default,
                ..config.clone()
            };
            attempt(&fallback).map_err(|e| AudioError::StreamError(e.to_string()))
        }
        Err(e) => Err(AudioError::StreamError(e.to_string())),
    }
}

/// Audio-callback side of the frame queue
struct CallbackFeeder {
    frame_rx: Receiver<Vec<f32>>,
    recycle_tx: Sender<Vec<f32>>,
    pending: Vec<f32>,
    pos: usize,
}

impl CallbackFeeder {
    fn new(frame_rx: Receiver<Vec<f32>>, recycle_tx: Sender<Vec<f32>>) -> Self {
        Self {
            frame_rx,
            recycle_tx,
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// Fill the device buffer, padding with silence on underrun
    fn fill(&mut self, data: &mut [f32]) {
        let mut written = 0;
        while written < data.len() {
            if self.pos >= self.pending.len() {
                match self.frame_rx.try_recv() {
                    Ok(next) => {
                        let used = std::mem::replace(&mut self.pending, next);
                        let _ = self.recycle_tx.try_send(used);
                        self.pos = 0;
                        continue;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        data[written..].fill(0.0);
                        return;
                    }
                }
            }

            let n = (self.pending.len() - self.pos).min(data.len() - written);
            data[written..written + n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
    }
}

/// Writer side of the frame queue
struct FrameQueue {
    frame_tx: Sender<Vec<f32>>,
    /// Consumed frame buffers handed back by the callback
    recycle_rx: Receiver<Vec<f32>>,
    error_rx: Receiver<cpal::StreamError>,
    write_timeout: Duration,
}

impl FrameQueue {
    fn push(&self, pcm: &[u8]) -> Result<usize, AudioError> {
        while let Ok(e) = self.error_rx.try_recv() {
            match e {
                cpal::StreamError::DeviceNotAvailable => {
                    return Err(AudioError::CpalError(e.to_string()));
                }
                other => tracing::warn!("Playback stream reported: {}", other),
            }
        }

        let mut samples = self.recycle_rx.try_recv().unwrap_or_default();
        samples.clear();
        pcm_to_f32(pcm, &mut samples);

        match self.frame_tx.send_timeout(samples, self.write_timeout) {
            Ok(()) => Ok(pcm.len() - pcm.len() % 2),
            Err(SendTimeoutError::Timeout(_)) => Err(AudioError::StreamError(format!(
                "device stopped consuming audio for {:?}",
                self.write_timeout
            ))),
            Err(SendTimeoutError::Disconnected(_)) => Err(AudioError::SinkClosed),
        }
    }
}

impl PlaybackSink for CpalSink {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (frame_tx, frame_rx) = bounded::<Vec<f32>>(self.config.queue_frames);
        let (recycle_tx, recycle_rx) = bounded::<Vec<f32>>(self.config.queue_frames + 2);
        let (error_tx, error_rx) = bounded::<cpal::StreamError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        self.running.store(true, Ordering::SeqCst);
        let handle = match self.spawn_stream_thread(frame_rx, recycle_tx, error_tx, ready_tx) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.thread_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stop();
                return Err(e);
            }
            Err(_) => {
                self.stop();
                return Err(AudioError::StreamError("playback thread exited".into()));
            }
        }

        self.queue = Some(FrameQueue {
            frame_tx,
            recycle_rx,
            error_rx,
            write_timeout: self.config.write_timeout(),
        });

        tracing::info!(
            "Playback started: {}Hz, {} channels, {} byte buffer{}",
            self.config.sample_rate,
            self.config.channels,
            self.config.buffer_size,
            if self.config.low_latency { ", low latency" } else { "" }
        );
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError> {
        let queue = self.queue.as_ref().ok_or(AudioError::SinkClosed)?;
        let written = queue.push(pcm)?;
        self.frames_written += 1;
        Ok(written)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue = None;

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!("Playback stopped after {} frames", self.frames_written);
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder() -> (CallbackFeeder, Sender<Vec<f32>>, Receiver<Vec<f32>>) {
        let (frame_tx, frame_rx) = bounded(4);
        let (recycle_tx, recycle_rx) = bounded(8);
        (CallbackFeeder::new(frame_rx, recycle_tx), frame_tx, recycle_rx)
    }

    #[test]
    fn test_feeder_spans_frames() {
        let (mut feeder, tx, recycle) = feeder();
        tx.send(vec![0.1; 3]).unwrap();
        tx.send(vec![0.2; 3]).unwrap();

        let mut out = [9.0f32; 4];
        feeder.fill(&mut out);
        assert_eq!(out, [0.1, 0.1, 0.1, 0.2]);

        let mut out = [9.0f32; 4];
        feeder.fill(&mut out);
        assert_eq!(out, [0.2, 0.2, 0.0, 0.0]);

        // Initial empty buffer plus the first frame came back
        assert_eq!(recycle.len(), 2);
    }

    #[test]
    fn test_feeder_underrun_is_silence() {
        let (mut feeder, _tx, _recycle) = feeder();
        let mut out = [1.0f32; 8];
        feeder.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_feeder_skips_empty_frames() {
        let (mut feeder, tx, _recycle) = feeder();
        tx.send(Vec::new()).unwrap();
        tx.send(vec![0.5; 2]).unwrap();

        let mut out = [0.0f32; 2];
        feeder.fill(&mut out);
        assert_eq!(out, [0.5, 0.5]);
    }

    fn queue(
        depth: usize,
    ) -> (
        FrameQueue,
        Receiver<Vec<f32>>,
        Sender<Vec<f32>>,
        Sender<cpal::StreamError>,
    ) {
        let (frame_tx, frame_rx) = bounded(depth);
        let (recycle_tx, recycle_rx) = bounded(depth + 2);
        let (error_tx, error_rx) = bounded(4);
        let queue = FrameQueue {
            frame_tx,
            recycle_rx,
            error_rx,
            write_timeout: Duration::from_millis(20),
        };
        (queue, frame_rx, recycle_tx, error_tx)
    }

    #[test]
    fn test_queue_converts_and_reuses_buffers() {
        let (queue, frame_rx, recycle_tx, _errors) = queue(2);
        recycle_tx.send(vec![9.0; 64]).unwrap();

        assert_eq!(queue.push(&[0x00, 0x40, 0x00, 0xC0, 0x01]).unwrap(), 4);
        assert_eq!(frame_rx.try_recv().unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_stalled_device_fails_the_write() {
        let (queue, _frame_rx, _recycle, _errors) = queue(1);
        queue.push(&[1, 0]).unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(queue.push(&[1, 0]), Err(AudioError::StreamError(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_closed_callback_side_fails_the_write() {
        let (queue, frame_rx, _recycle, _errors) = queue(1);
        drop(frame_rx);
        assert!(matches!(queue.push(&[1, 0]), Err(AudioError::SinkClosed)));
    }

    #[test]
    fn test_lost_device_fails_the_write() {
        let (queue, frame_rx, _recycle, errors) = queue(4);
        errors
            .send(cpal::StreamError::BackendSpecific {
                err: cpal::BackendSpecificError {
                    description: "underrun".into(),
                },
            })
            .unwrap();
        // Backend hiccups are only logged
        assert!(queue.push(&[1, 0]).is_ok());

        errors.send(cpal::StreamError::DeviceNotAvailable).unwrap();
        assert!(matches!(queue.push(&[1, 0]), Err(AudioError::CpalError(_))));
        assert_eq!(frame_rx.len(), 1);
    }

    #[test]
    fn test_rejects_non_16_bit() {
        let config = SinkConfig {
            bit_depth: 24,
            ..Default::default()
        };
        assert!(matches!(
            CpalSink::open(&config),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_playback_start_stop() {
        // This may fail on CI/systems without audio devices
        let Ok(mut sink) = CpalSink::open(&SinkConfig::default()) else {
            return;
        };
        if sink.start().is_err() {
            return;
        }
        assert!(sink.is_running());
        assert_eq!(sink.write(&[0u8; 2048]).unwrap(), 2048);
        sink.stop();
        assert!(!sink.is_running());
        assert!(matches!(sink.write(&[1u8; 4]), Err(AudioError::SinkClosed)));
    }
}
