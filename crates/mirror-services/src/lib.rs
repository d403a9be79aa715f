//! mirror-services — peer directory, the transport-host boundary, and the
//! TCP transport that implements it.

pub mod directory;
pub mod tcp;
pub mod transport;

pub use directory::{ConnectionStatus, DiscoveryEvent, PeerDirectory, PeerRecord};
pub use tcp::TcpTransport;
pub use transport::{ConnectError, TransportHost};
