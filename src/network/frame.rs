//! Frame receiver and silence filter
//!
//! One datagram is read per iteration into a preallocated buffer sized for
//! the active [`CodecMode`]. A payload whose bytes are all zero is silence
//! (or garbage) and is never forwarded to playback.

use std::net::SocketAddr;

use super::socket::DatagramEndpoint;
use crate::codec::CodecMode;
use crate::error::NetworkError;

/// Fixed-capacity receive buffer, reused across iterations
#[derive(Debug)]
pub struct FrameBuffer {
    data: Box<[u8]>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// `true` when every byte is zero (bitwise-OR reduction)
pub fn is_silent(payload: &[u8]) -> bool {
    payload.iter().fold(0u8, |acc, &b| acc | b) == 0
}

/// A datagram sitting in the receiver's buffer
#[derive(Debug)]
pub struct Frame<'a> {
    pub origin: SocketAddr,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_silent(&self) -> bool {
        is_silent(self.payload)
    }
}

/// Receives datagrams into one buffer per codec mode.
///
/// Switching mode switches buffers; neither buffer is ever resized.
#[derive(Debug)]
pub struct FrameReceiver {
    raw: FrameBuffer,
    compressed: FrameBuffer,
}

impl FrameReceiver {
    pub fn new(raw_frame_bytes: usize, compressed_frame_bytes: usize) -> Self {
        Self {
            raw: FrameBuffer::new(raw_frame_bytes),
            compressed: FrameBuffer::new(compressed_frame_bytes),
        }
    }

    pub fn buffer(&self, mode: CodecMode) -> &FrameBuffer {
        match mode {
            CodecMode::Raw => &self.raw,
            CodecMode::Compressed => &self.compressed,
        }
    }

    fn buffer_mut(&mut self, mode: CodecMode) -> &mut FrameBuffer {
        match mode {
            CodecMode::Raw => &mut self.raw,
            CodecMode::Compressed => &mut self.compressed,
        }
    }

    /// Block for one datagram on `endpoint`.
    ///
    /// Datagrams longer than the mode's buffer are truncated by the socket.
    pub fn receive_into<E: DatagramEndpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        mode: CodecMode,
    ) -> Result<Frame<'_>, NetworkError> {
        let buffer = self.buffer_mut(mode);
        let (len, origin) = endpoint.recv_from(&mut buffer.data)?;
        let len = len.min(buffer.data.len());

        Ok(Frame {
            origin,
            payload: &buffer.data[..len],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct OneShot {
        payload: Vec<u8>,
        origin: SocketAddr,
    }

    impl DatagramEndpoint for OneShot {
        fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
            let n = self.payload.len().min(buf.len());
            buf[..n].copy_from_slice(&self.payload[..n]);
            Ok((n, self.origin))
        }
    }

    fn origin() -> SocketAddr {
        "192.168.1.20:50000".parse().unwrap()
    }

    #[test]
    fn test_empty_payload_is_silent() {
        assert!(is_silent(&[]));
        assert!(is_silent(&[0; 2048]));
        assert!(!is_silent(&[0, 0, 0x80, 0]));
    }

    #[test]
    fn test_buffer_per_mode() {
        let receiver = FrameReceiver::new(2048, 512);
        assert_eq!(receiver.buffer(CodecMode::Raw).capacity(), 2048);
        assert_eq!(receiver.buffer(CodecMode::Compressed).capacity(), 512);
    }

    #[test]
    fn test_receive_into_mode_buffer() {
        let mut receiver = FrameReceiver::new(2048, 512);
        let mut endpoint = OneShot {
            payload: vec![3; 2048],
            origin: origin(),
        };

        let frame = receiver.receive_into(&mut endpoint, CodecMode::Raw).unwrap();
        assert_eq!(frame.len(), 2048);
        assert_eq!(frame.origin, origin());

        // Compressed mode reads into the quarter-size buffer
        let frame = receiver.receive_into(&mut endpoint, CodecMode::Compressed).unwrap();
        assert_eq!(frame.len(), 512);
        assert!(!frame.is_silent());
    }

    #[test]
    fn test_stale_bytes_do_not_mask_silence() {
        let mut receiver = FrameReceiver::new(2048, 512);
        let mut loud = OneShot {
            payload: vec![9; 2048],
            origin: origin(),
        };
        receiver.receive_into(&mut loud, CodecMode::Raw).unwrap();

        let mut quiet = OneShot {
            payload: vec![0; 16],
            origin: origin(),
        };
        let frame = receiver.receive_into(&mut quiet, CodecMode::Raw).unwrap();
        assert!(frame.is_silent());
    }

    proptest! {
        #[test]
        fn prop_all_zero_is_silent(len in 0usize..4096) {
            prop_assert!(is_silent(&vec![0u8; len]));
        }

        #[test]
        fn prop_any_nonzero_byte_is_audible(
            len in 1usize..4096,
            pos in any::<prop::sample::Index>(),
            value in 1u8..=255,
        ) {
            let mut payload = vec![0u8; len];
            payload[pos.index(len)] = value;
            prop_assert!(!is_silent(&payload));
        }
    }
}
