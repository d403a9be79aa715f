//! mirrord — MirrorNet peer daemon.
//!
//! Boot order: config, identity, transport, discovery, control API.
//! Identity and transport failures are fatal; a discovery startup
//! failure downgrades the node to inbound-only and keeps running.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_core::config::MirrorConfig;
use mirror_core::{Identity, IdentityError};
use mirror_services::{PeerDirectory, TcpTransport, TransportHost};
use mirrord::discovery::{self, DiscoverySettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match MirrorConfig::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "failed to load config, using defaults");
            MirrorConfig::default()
        }
    };
    if let Err(err) = MirrorConfig::write_default_if_missing() {
        warn!(error = %err, "could not write default config file");
    }

    let identity = load_or_create_identity(&config)?;
    let identity = Arc::new(identity);
    info!(peer_id = %identity.peer_id(), "identity ready");

    let directory = Arc::new(PeerDirectory::new());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(());
            }
        });
    }

    let (transport, accept_task) = TcpTransport::bind(
        Arc::clone(&identity),
        Arc::clone(&directory),
        config.network.listen_port,
        shutdown_tx.subscribe(),
    )
    .await
    .context("failed to bind peer listener")?;
    info!(port = transport.listen_port(), "accepting peer connections");

    let transport_host: Arc<dyn TransportHost> = transport.clone();
    let discovery_handle = match discovery::start(
        Arc::clone(&identity),
        Arc::clone(&transport_host),
        Arc::clone(&directory),
        DiscoverySettings::from_config(&config.discovery),
        &shutdown_tx,
    ) {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!(error = %err, "discovery unavailable, continuing without it");
            None
        }
    };

    let api_state = mirror_api::ApiState {
        identity: Arc::clone(&identity),
        directory: Arc::clone(&directory),
        transport: Arc::clone(&transport_host),
    };
    let api_port = config.network.api_port;
    let api_task = tokio::spawn(async move {
        if let Err(err) = mirror_api::serve(api_state, api_port).await {
            error!(error = %err, "control API exited");
        }
    });

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => {}
        _ = accept_task => {
            error!("peer listener task exited unexpectedly");
        }
        _ = api_task => {
            error!("control API task exited unexpectedly");
        }
    }

    if let Some(handle) = discovery_handle {
        handle.abort();
    }
    info!("mirrord stopped");
    Ok(())
}

/// Load the on-disk identity, creating one on first run. Any error
/// other than a missing file is fatal; a corrupt key file should never
/// be silently replaced.
fn load_or_create_identity(config: &MirrorConfig) -> anyhow::Result<Identity> {
    let path = &config.identity.path;
    match Identity::load(path) {
        Ok(identity) => Ok(identity),
        Err(IdentityError::NotFound(_)) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let identity = Identity::generate().context("generating identity key")?;
            identity
                .persist(path)
                .with_context(|| format!("writing identity to {}", path.display()))?;
            info!(path = %path.display(), "generated new identity");
            Ok(identity)
        }
        Err(err) => Err(err).with_context(|| format!("loading identity from {}", path.display())),
    }
}
