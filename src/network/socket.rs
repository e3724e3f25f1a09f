//! Socket manager
//!
//! Owns creation of the UDP receive endpoint. Binding is retried under a
//! [`RetryPolicy`]; running out of attempts is fatal to the caller.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// A bound receive handle
pub trait DatagramEndpoint: Send {
    /// Block until a datagram arrives or the receive timeout elapses
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError>;
}

/// Creates endpoints; one bind attempt per call
pub trait EndpointBinder: Send {
    type Endpoint: DatagramEndpoint;

    fn bind(&mut self, port: u16, config: &NetworkConfig) -> io::Result<Self::Endpoint>;
}

/// UDP endpoint backed by an OS socket
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
}

impl UdpEndpoint {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramEndpoint for UdpEndpoint {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
        self.socket.recv_from(buf).map_err(NetworkError::from_receive)
    }
}

/// Binds real UDP sockets with broadcast and address reuse
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpBinder;

impl EndpointBinder for UdpBinder {
    type Endpoint = UdpEndpoint;

    fn bind(&mut self, port: u16, config: &NetworkConfig) -> io::Result<UdpEndpoint> {
        let ip: IpAddr = config.bind_address.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad bind address {:?}: {}", config.bind_address, e),
            )
        })?;
        let addr = SocketAddr::new(ip, port);

        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(config.reuse_address)?;
        socket.set_broadcast(config.broadcast)?;
        socket.set_read_timeout(Some(config.recv_timeout()))?;
        socket.bind(&addr.into())?;

        Ok(UdpEndpoint {
            socket: socket.into(),
        })
    }
}

/// Creates endpoints with bounded retries and fixed backoff
pub struct SocketManager<B> {
    binder: B,
    config: NetworkConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<B: EndpointBinder> SocketManager<B> {
    pub fn new(binder: B, config: NetworkConfig) -> Self {
        Self {
            binder,
            config,
            cancel: None,
        }
    }

    /// Abort retries once `running` is cleared
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.cancel = Some(running);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Bind a new endpoint on `port`.
    ///
    /// Each call yields an independent endpoint; the caller must drop the
    /// previous one first when rebinding the same port.
    pub fn acquire_endpoint(&mut self, port: u16) -> Result<B::Endpoint, NetworkError> {
        let policy = self.config.bind_retry;
        let mut attempts = 0;
        let mut last_error = String::from("no bind attempted");

        while policy.allows(attempts) {
            if self.cancelled() {
                return Err(NetworkError::Cancelled);
            }
            if attempts > 0 {
                thread::sleep(policy.delay());
            }
            attempts += 1;

            match self.binder.bind(port, &self.config) {
                Ok(endpoint) => {
                    tracing::info!("Socket bound on port {} (attempt {})", port, attempts);
                    return Ok(endpoint);
                }
                Err(e) => {
                    tracing::debug!("Bind attempt {} on port {} failed: {}", attempts, port, e);
                    last_error = e.to_string();
                }
            }
        }

        tracing::error!("Giving up binding port {} after {} attempts", port, attempts);
        Err(NetworkError::BindExhausted {
            port,
            attempts,
            last_error,
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |running| !running.load(Ordering::SeqCst))
    }
}
