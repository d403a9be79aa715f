//! /peer-id, /peers, /status, /health handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use mirror_core::Identity;
use mirror_services::{PeerDirectory, PeerRecord, TransportHost};

/// Shared daemon state the handlers read from. Cheap to clone; every
/// field is an Arc.
#[derive(Clone)]
pub struct ApiState {
    pub identity: Arc<Identity>,
    pub directory: Arc<PeerDirectory>,
    pub transport: Arc<dyn TransportHost>,
}

// ── /peer-id ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeerIdResponse {
    pub peer_id: String,
    pub public_key: String,
}

pub async fn handle_peer_id(State(state): State<ApiState>) -> Json<PeerIdResponse> {
    Json(PeerIdResponse {
        peer_id: state.identity.peer_id().to_string(),
        public_key: hex::encode(state.identity.public_key()),
    })
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeerInfo {
    pub id: String,
    pub addresses: Vec<String>,
    pub status: String,
    pub last_seen_secs: u64,
}

impl PeerInfo {
    fn from_record(record: &PeerRecord) -> Self {
        Self {
            id: record.peer_id.to_string(),
            addresses: record.addresses.iter().map(|a| a.to_string()).collect(),
            status: format!("{}", record.status),
            last_seen_secs: record
                .last_seen
                .elapsed()
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<Vec<PeerInfo>> {
    let peers = state
        .directory
        .snapshot(state.transport.as_ref())
        .iter()
        .map(PeerInfo::from_record)
        .collect();
    Json(peers)
}

// ── /status ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub peer_id: String,
    pub listen_addresses: Vec<String>,
    pub peers_known: usize,
    pub peers_connected: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        peer_id: state.identity.peer_id().to_string(),
        listen_addresses: state
            .transport
            .listen_addresses()
            .iter()
            .map(|a| a.to_string())
            .collect(),
        peers_known: state.directory.len(),
        peers_connected: state.transport.live_connections().len(),
    })
}

// ── /health ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
