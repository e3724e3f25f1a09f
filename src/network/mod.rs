//! Network subsystem for UDP audio reception

pub mod frame;
pub mod socket;
pub mod tracker;

pub use frame::{is_silent, Frame, FrameBuffer, FrameReceiver};
pub use socket::{DatagramEndpoint, EndpointBinder, SocketManager, UdpBinder, UdpEndpoint};
pub use tracker::{EventPublisher, SenderEvent, SenderHandle, SenderTracker};
