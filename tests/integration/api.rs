//! Control API surface, exercised over real HTTP.

use anyhow::Result;
use mirror_services::TransportHost;
use serde_json::Value;
use tokio::task::JoinHandle;

use mirror_api::ApiState;

use crate::infra::{spawn_node, wait_until, Node};

async fn serve_api(node: &Node) -> Result<(String, JoinHandle<()>)> {
    let state = ApiState {
        identity: node.identity.clone(),
        directory: node.directory.clone(),
        transport: node.host(),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}/api", listener.local_addr()?);
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, mirror_api::router(state)).await;
    });
    Ok((base, task))
}

async fn get(url: &str) -> Result<Value> {
    Ok(reqwest::get(url).await?.json().await?)
}

#[tokio::test]
async fn health_and_peer_id_endpoints() {
    let node = spawn_node().await.unwrap();
    let (base, _server) = serve_api(&node).await.unwrap();

    let health = get(&format!("{base}/health")).await.unwrap();
    assert_eq!(health["status"], "ok");

    let peer_id = get(&format!("{base}/peer-id")).await.unwrap();
    assert_eq!(peer_id["peer_id"], node.identity.peer_id().to_string());
    assert_eq!(peer_id["peer_id"].as_str().unwrap().len(), 64);
    assert_eq!(peer_id["public_key"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn peers_endpoint_reflects_directory_and_liveness() {
    let a = spawn_node().await.unwrap();
    let b = spawn_node().await.unwrap();
    let (base, _server) = serve_api(&a).await.unwrap();

    let empty = get(&format!("{base}/peers")).await.unwrap();
    assert_eq!(empty, serde_json::json!([]));

    a.host()
        .connect(b.identity.peer_id(), &[b.addr()])
        .await
        .unwrap();
    wait_until("connection up", || {
        a.transport.is_connected(&b.identity.peer_id())
    })
    .await
    .unwrap();

    let peers = get(&format!("{base}/peers")).await.unwrap();
    let peers = peers.as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["id"], b.identity.peer_id().to_string());
    assert_eq!(peers[0]["status"], "online");
    assert!(!peers[0]["addresses"].as_array().unwrap().is_empty());

    let status = get(&format!("{base}/status")).await.unwrap();
    assert_eq!(status["peer_id"], a.identity.peer_id().to_string());
    assert_eq!(status["peers_known"], 1);
    assert_eq!(status["peers_connected"], 1);
}
