//! MirrorNet integration test harness.
//!
//! Everything here runs in-process over loopback: real identities on a
//! real filesystem, real TCP connections between two transport hosts,
//! real HTTP against the control API router. No root, no namespaces.

mod infra;

mod api;
mod discovery;
mod identity;
mod transport;
