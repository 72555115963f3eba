//! Art-Net node protocol engine.
//!
//! One [`Node`] speaks the Art-Net node protocol over a pluggable
//! [`Transport`]: discovery (ArtPoll/ArtPollReply), remote address
//! programming (ArtAddress), and DMX with two-source HTP/LTP merging
//! and timeout-based source eviction. The engine is single-threaded
//! and synchronous; the only blocking point is the transport's
//! receive-with-timeout.

mod address;
mod discovery;
mod dmx;
pub mod error;
pub mod hooks;
pub mod node;
pub mod nodes;
pub mod peering;
pub mod ports;
pub mod transport;

pub use error::{Error, Result};
pub use hooks::Event;
pub use node::{Mode, Node, NodeConfig, NodeOptions, NodeType};
pub use peering::PeerGroup;
pub use ports::{universe_address, MergeMode, PortDirection};
pub use transport::{MemoryTransport, Transport, UdpTransport};
