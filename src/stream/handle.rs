//! Dedicated thread for a [`StreamLoop`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{StreamLoop, StreamStats};
use crate::audio::PlaybackSink;
use crate::codec::CodecModeSwitch;
use crate::error::{Error, Result};
use crate::network::{EndpointBinder, SenderHandle};

/// Owner side of a running stream loop.
///
/// Stopping is cooperative: the flag is checked once per iteration, so the
/// loop exits within one receive timeout. The sink is stopped on the loop
/// thread before it exits, so joining guarantees no write after stop.
pub struct StreamHandle {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<Result<()>>>,
    sender: SenderHandle,
    mode: CodecModeSwitch,
    stats: Arc<StreamStats>,
}

impl StreamHandle {
    /// Start `stream` on its own thread
    pub fn spawn<B, S>(stream: StreamLoop<B, S>) -> Result<Self>
    where
        B: EndpointBinder + 'static,
        S: PlaybackSink + 'static,
    {
        let running = stream.running_flag();
        let sender = stream.sender_handle();
        let mode = stream.mode_switch();
        let stats = stream.stats();

        let handle = thread::Builder::new()
            .name("stream-loop".to_string())
            .spawn(move || stream.run())?;

        Ok(Self {
            running,
            thread_handle: Some(handle),
            sender,
            mode,
            stats,
        })
    }

    /// Ask the loop to stop without waiting
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the loop and wait for its thread
    pub fn stop(mut self) -> Result<()> {
        self.request_stop();
        self.join_thread()
    }

    /// Wait for the loop to end on its own (fatal error or external stop)
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    /// `true` once the loop thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    pub fn sender(&self) -> &SenderHandle {
        &self.sender
    }

    pub fn mode(&self) -> &CodecModeSwitch {
        &self.mode
    }

    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    fn join_thread(&mut self) -> Result<()> {
        match self.thread_handle.take() {
            Some(handle) => handle.join().map_err(|_| Error::Panicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.request_stop();
        let _ = self.join_thread();
    }
}
