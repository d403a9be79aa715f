//! mirror-ctl — command-line interface for the MirrorNet daemon.

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 7600;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    peer_id:          String,
    listen_addresses: Vec<String>,
    peers_known:      usize,
    peers_connected:  usize,
}

#[derive(Deserialize)]
struct PeerInfo {
    id:             String,
    addresses:      Vec<String>,
    status:         String,
    last_seen_secs: u64,
}

#[derive(Deserialize)]
struct PeerIdResponse {
    peer_id: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to mirrord at {} (is it running?)", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  MirrorNet Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Peer id         : {}", resp.peer_id);
    println!("  Listening on    : {}", resp.listen_addresses.join(", "));
    println!("  Peers known     : {}", resp.peers_known);
    println!("  Peers connected : {}", resp.peers_connected);

    Ok(())
}

async fn cmd_peers(port: u16) -> Result<()> {
    let peers: Vec<PeerInfo> = get_json(&format!("{}/peers", base_url(port))).await?;

    if peers.is_empty() {
        println!("No peers discovered yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Known Peers ({})", peers.len());
    println!("═══════════════════════════════════════");

    for p in &peers {
        println!("  ┌─ {}", &p.id[..16.min(p.id.len())]);
        println!("  │  addresses : {}", p.addresses.join(", "));
        println!("  │  status    : {}", p.status);
        println!("  └─ last seen : {}s ago", p.last_seen_secs);
    }

    Ok(())
}

async fn cmd_id(port: u16) -> Result<()> {
    let resp: PeerIdResponse = get_json(&format!("{}/peer-id", base_url(port))).await?;
    println!("{}", resp.peer_id);
    Ok(())
}

async fn cmd_health(port: u16) -> Result<()> {
    let resp: HealthResponse = get_json(&format!("{}/health", base_url(port))).await?;
    println!("{}", resp.status);
    Ok(())
}

fn print_usage() {
    println!("Usage: mirror-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status   Show daemon status (default)");
    println!("  peers    List known peers and their connection status");
    println!("  id       Print this node's peer id");
    println!("  health   Check that the daemon is responding");
    println!();
    println!("Options:");
    println!("  --port <port>   Control API port (default: {}, or $MIRROR_API_PORT)", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = match std::env::var("MIRROR_API_PORT") {
        Ok(value) => value.parse().context("$MIRROR_API_PORT must be a number")?,
        Err(_) => DEFAULT_PORT,
    };
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["peers"]                      => cmd_peers(port).await,
        ["id"]                         => cmd_id(port).await,
        ["health"]                     => cmd_health(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
