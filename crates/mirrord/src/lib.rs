//! mirrord — MirrorNet peer discovery daemon, as a library.
//!
//! The binary in main.rs is thin wiring over this crate; keeping the
//! engine here lets the workspace integration tests drive it in-process.

pub mod discovery;
