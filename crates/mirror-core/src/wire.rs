//! MirrorNet wire format — on-wire types for discovery and connection setup.
//!
//! Two datagram/frame types exist: the multicast presence announcement and
//! the signed hello exchanged when a TCP connection opens. Every field and
//! every reserved byte is part of the wire format; changing anything here
//! is a breaking change between nodes.
//!
//! All types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization.

use std::net::Ipv4Addr;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// IPv4 administratively-scoped multicast group for presence announcements.
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 70, 77);

/// UDP port on which presence announcements are sent and received.
pub const ANNOUNCE_PORT: u16 = 7700;

/// Current wire format version. A receiver seeing an unknown version
/// silently drops the datagram.
pub const WIRE_VERSION: u8 = 1;

/// Magic prefix of a presence announcement.
pub const ANNOUNCE_MAGIC: [u8; 4] = *b"MNP1";

/// Magic prefix of a connection hello frame.
pub const HELLO_MAGIC: [u8; 4] = *b"MNH1";

// ── Service tag ───────────────────────────────────────────────────────────────

/// Hash of a service tag string, carried in every announcement.
///
/// Instances announcing different tags never see each other: a receiver
/// compares this hash before anything else and drops mismatches.
pub type TagHash = [u8; 32];

/// Compute the TagHash for a service tag string.
pub fn tag_hash(tag: &str) -> TagHash {
    *blake3::hash(tag.as_bytes()).as_bytes()
}

// ── Presence announcement ─────────────────────────────────────────────────────

/// Multicast datagram advertising a node's presence on the local link.
///
/// The receiver learns the sender's address from the UDP source address;
/// the announcement itself carries only the TCP port to dial. The peer id
/// is not on the wire — it is derived from `public_key` on receipt.
///
/// Wire size: 72 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PresenceAnnouncement {
    /// Must be ANNOUNCE_MAGIC.
    pub magic: [u8; 4],

    /// Must be WIRE_VERSION.
    pub version: u8,

    /// Reserved, must be zero.
    pub reserved: u8,

    /// TCP port the sender accepts peer connections on.
    pub listen_port: u16,

    /// BLAKE3 hash of the sender's service tag.
    pub tag_hash: TagHash,

    /// Sender's Ed25519 public key.
    pub public_key: [u8; 32],
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(PresenceAnnouncement, [u8; 72]);

impl PresenceAnnouncement {
    pub fn new(tag_hash: TagHash, public_key: [u8; 32], listen_port: u16) -> Self {
        Self {
            magic: ANNOUNCE_MAGIC,
            version: WIRE_VERSION,
            reserved: 0,
            listen_port,
            tag_hash,
            public_key,
        }
    }
}

// ── Hello frame ───────────────────────────────────────────────────────────────

/// First (and only) frame either side sends after a TCP connection opens.
///
/// Proves possession of the private key behind `public_key`: the signature
/// covers a fixed context string plus the public key and listen port, so a
/// frame cannot be replayed with a different port. A receiver that fails
/// to verify the signature drops the connection.
///
/// Wire size: 104 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct HelloFrame {
    /// Must be HELLO_MAGIC.
    pub magic: [u8; 4],

    /// Must be WIRE_VERSION.
    pub version: u8,

    /// Reserved, must be zero.
    pub reserved: u8,

    /// TCP port the sender accepts peer connections on. Lets the
    /// accepting side record a dialable address for the peer.
    pub listen_port: u16,

    /// Sender's Ed25519 public key.
    pub public_key: [u8; 32],

    /// Ed25519 signature over `hello_payload(public_key, listen_port)`.
    pub signature: [u8; 64],
}

assert_eq_size!(HelloFrame, [u8; 104]);

/// Domain-separation context for hello signatures.
const HELLO_CONTEXT: &[u8] = b"mirrornet-hello-v1";

/// The exact bytes a hello signature covers.
pub fn hello_payload(public_key: &[u8; 32], listen_port: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HELLO_CONTEXT.len() + 32 + 2);
    payload.extend_from_slice(HELLO_CONTEXT);
    payload.extend_from_slice(public_key);
    payload.extend_from_slice(&listen_port.to_le_bytes());
    payload
}
