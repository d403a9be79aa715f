//! mirror-core — node identity, configuration, and wire format.
//! All other MirrorNet crates depend on this one.

pub mod config;
pub mod identity;
pub mod wire;

pub use identity::{Identity, IdentityError, PeerId};
